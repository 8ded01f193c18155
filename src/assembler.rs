//! Assembler: groups atoms by category, concatenates in the configured
//! order, and runs template substitution plus optional post-processing.
//!
//! DESIGN DECISION: group-then-join, never re-sort by anything but `order`
//! WHY: generalizes `context_loader/assembler.rs::ContextAssembler::assemble`'s
//! section-header-then-`---`-separator concatenation shape; the budget
//! manager already fixed every atom's position, so the assembler's only job
//! is grouping and joining, never reordering.

use std::collections::HashMap;

use crate::atom::Category;
use crate::config::CompilerConfig;
use crate::context::Context;
use crate::resolver::OrderedAtom;
use crate::template::TemplateRegistry;

/// Groups `ordered` by category (preserving the `order` field's relative
/// sequence within each) and concatenates per `config.category_order`,
/// appending any categories present but unconfigured at the end in
/// lexicographic order. Runs template substitution per-atom and once more
/// over the finished document, then applies any configured post-processing.
pub fn assemble(
    ordered: &[OrderedAtom],
    ctx: &Context,
    config: &CompilerConfig,
    templates: &TemplateRegistry,
) -> String {
    let span = tracing::info_span!("assemble");
    let _enter = span.enter();

    let mut by_category: HashMap<Category, Vec<&OrderedAtom>> = HashMap::new();
    for atom in ordered {
        by_category.entry(atom.atom.category()).or_default().push(atom);
    }
    for atoms in by_category.values_mut() {
        atoms.sort_by_key(|a| a.order);
    }

    let mut emission_order: Vec<Category> = config
        .category_order
        .iter()
        .copied()
        .filter(|c| by_category.contains_key(c))
        .collect();

    let mut leftover: Vec<Category> = by_category
        .keys()
        .copied()
        .filter(|c| !config.category_order.contains(c))
        .collect();
    leftover.sort_by_key(|c| c.as_str());
    emission_order.extend(leftover);

    let mut sections: Vec<String> = Vec::new();
    for category in emission_order {
        let atoms = &by_category[&category];
        if atoms.is_empty() {
            continue;
        }

        let mut section = String::new();
        if config.section_headers {
            section.push_str(category.header());
            section.push_str(&config.section_separator);
        }

        let bodies: Vec<String> = atoms
            .iter()
            .map(|a| {
                let raw = a.atom.content_for(a.render_mode);
                templates.substitute(raw, ctx)
            })
            .collect();
        section.push_str(&bodies.join(&config.atom_separator));

        sections.push(section);
    }

    let document = sections.join(&config.section_separator);
    let document = templates.substitute(&document, ctx);

    let document = if config.minify_whitespace {
        minify_whitespace(&document)
    } else {
        document
    };

    match config.max_length_chars {
        Some(limit) => truncate_at_paragraph(&document, limit),
        None => document,
    }
}

/// Collapses runs of 3+ newlines to exactly two and right-trims each line.
fn minify_whitespace(text: &str) -> String {
    let trimmed_lines: Vec<&str> = text.lines().map(|l| l.trim_end()).collect();
    let rejoined = trimmed_lines.join("\n");

    let mut out = String::with_capacity(rejoined.len());
    let mut newline_run = 0usize;
    for ch in rejoined.chars() {
        if ch == '\n' {
            newline_run += 1;
            if newline_run <= 2 {
                out.push(ch);
            }
        } else {
            newline_run = 0;
            out.push(ch);
        }
    }
    out
}

/// Truncates at the last `\n\n` boundary past half of `limit`, appending a
/// truncation marker. Leaves `text` untouched if it already fits.
fn truncate_at_paragraph(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }

    let half = limit / 2;
    let marker = "\n\n[truncated]";

    // Work in byte offsets but only cut on a char boundary; find the last
    // "\n\n" whose byte offset, converted to a char count, is >= half.
    let mut best_cut: Option<usize> = None;
    let mut search_from = 0;
    while let Some(rel) = text[search_from..].find("\n\n") {
        let byte_pos = search_from + rel;
        let char_count = text[..byte_pos].chars().count();
        if char_count >= half && char_count + marker.len() <= limit.max(half) {
            best_cut = Some(byte_pos);
        }
        search_from = byte_pos + 2;
    }

    match best_cut {
        Some(byte_pos) => format!("{}{}", &text[..byte_pos], marker),
        None => {
            // No paragraph boundary past the half-way mark; hard-cut at a
            // char boundary near `limit` instead.
            let cut: String = text.chars().take(limit).collect();
            format!("{cut}{marker}")
        }
    }
}
