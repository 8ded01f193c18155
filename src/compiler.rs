//! Compiler orchestration: the single `Compile(ctx)` entry point plus the
//! rest of §6's public API surface (`SelectAtoms`, `ValidateCorpus`,
//! `RegisterTemplate`).
//!
//! DESIGN DECISION: phase-sequenced orchestration with a checked
//! cancellation token between phases
//! WHY: mirrors `context_loader.rs::ContextLoader::load_context`'s
//! sequencing (strategy -> essential -> domain -> patterns -> references ->
//! assemble), generalized with the cooperative-cancellation and per-phase
//! timing the spec's concurrency model requires but the teacher's
//! synchronous loader never needed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::assembler::assemble;
use crate::budget;
use crate::config::CompilerConfig;
use crate::context::Context;
use crate::corpus::Corpus;
use crate::error::{Error, Result, Warning};
use crate::external::SemanticSearch;
use crate::manifest::{CompilationStats, PromptManifest};
use crate::resolver::{resolve, OrderedAtom};
use crate::selector::select;
use crate::template::TemplateRegistry;

/// A cooperative cancellation signal, checked between pipeline phases and
/// before the semantic-search call. Cloning shares the same underlying
/// flag, so a caller can hold one end and cancel from another thread while
/// `Compile` itself stays single-threaded and blocking (§5).
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The result of one `Compile` call: the assembled prompt, its statistics,
/// and a purely diagnostic manifest.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub prompt: String,
    pub stats: CompilationStats,
    pub manifest: PromptManifest,
    pub warnings: Vec<Warning>,
}

/// Owns the corpus, configuration, template registry, and optional
/// semantic-search collaborator for a series of compiles. The corpus is
/// read-only after construction; multiple callers may invoke `compile`
/// concurrently (§5).
pub struct Compiler {
    corpus: Corpus,
    config: CompilerConfig,
    templates: TemplateRegistry,
    semantic: Option<Box<dyn SemanticSearch>>,
}

impl Compiler {
    pub fn new(corpus: Corpus, config: CompilerConfig) -> Self {
        Compiler {
            corpus,
            config,
            templates: TemplateRegistry::with_defaults(),
            semantic: None,
        }
    }

    pub fn with_semantic_search(mut self, semantic: Box<dyn SemanticSearch>) -> Self {
        self.semantic = Some(semantic);
        self
    }

    /// §6 `RegisterTemplate`: registers an additional `{{name}}` function.
    pub fn register_template(&mut self, name: impl Into<String>, f: impl Fn(&Context) -> String + Send + Sync + 'static) {
        self.templates.register(name, f);
    }

    /// §6 `ValidateCorpus`: every validation and missing-dependency error
    /// present in the corpus right now, without running a compile.
    pub fn validate_corpus(&self) -> Vec<Error> {
        let mut errors = self.corpus.validate_all();
        errors.extend(self.corpus.validate_dependencies());
        errors
    }

    /// §6 `SelectAtoms`: runs selection and resolution (but not budgeting
    /// or assembly) for inspection.
    pub fn select_atoms(&self, ctx: &Context) -> Result<Vec<OrderedAtom>> {
        let (scored, _dropped, _warnings) = select(&self.corpus, ctx, &self.config, self.semantic.as_deref());
        let (ordered, _dropped, _warnings) = resolve(scored, self.config.allow_missing_deps)?;
        Ok(ordered)
    }

    /// §6 `Compile`: the single entry point. Runs selection, resolution,
    /// budgeting, and assembly, checking `cancellation` between each phase.
    pub fn compile(&self, ctx: &Context, cancellation: Option<&CancellationToken>) -> Result<CompileOutput> {
        let start = Instant::now();
        let mut warnings = Vec::new();
        let mut dropped = Vec::new();

        check_cancelled(cancellation)?;
        let select_start = Instant::now();
        let (scored, select_dropped, select_warnings) = select(&self.corpus, ctx, &self.config, self.semantic.as_deref());
        let select_ms = select_start.elapsed().as_millis() as u64;
        dropped.extend(select_dropped);
        warnings.extend(select_warnings);
        let atoms_in_skeleton = scored.iter().filter(|s| s.is_mandatory).count();
        let atoms_in_flesh = scored.len() - atoms_in_skeleton;

        check_cancelled(cancellation)?;
        let resolve_start = Instant::now();
        let (resolved, resolve_dropped, resolve_warnings) = resolve(scored, self.config.allow_missing_deps)?;
        let resolve_ms = resolve_start.elapsed().as_millis() as u64;
        dropped.extend(resolve_dropped);
        warnings.extend(resolve_warnings);

        check_cancelled(cancellation)?;
        let budget_start = Instant::now();
        let available = ctx.available_tokens();
        let (budgeted, budget_dropped) = budget::allocate(resolved, available, &self.config)?;
        let budget_ms = budget_start.elapsed().as_millis() as u64;
        dropped.extend(budget_dropped);

        check_cancelled(cancellation)?;
        let assemble_start = Instant::now();
        let prompt = assemble(&budgeted, ctx, &self.config, &self.templates);
        let assemble_ms = assemble_start.elapsed().as_millis() as u64;

        let tokens_used = crate::atom::estimate_tokens(&prompt);
        let mut stats = CompilationStats {
            compile_id: uuid::Uuid::new_v4(),
            compiled_at: chrono::Utc::now(),
            wall_duration_ms: start.elapsed().as_millis() as u64,
            atoms_in_skeleton,
            atoms_in_flesh,
            atoms_selected: budgeted.len(),
            tokens_used,
            tokens_available: available,
            budget_utilization: 0.0,
            phase_timings_ms: crate::manifest::PhaseTimings {
                select_ms,
                resolve_ms,
                budget_ms,
                assemble_ms,
            },
        };
        stats.compute_utilization();

        let manifest = PromptManifest {
            admitted: PromptManifest::from_ordered(&budgeted),
            dropped,
        };

        tracing::info!(
            tokens_used,
            tokens_available = available,
            atoms_selected = budgeted.len(),
            "compile finished"
        );

        Ok(CompileOutput {
            prompt,
            stats,
            manifest,
            warnings,
        })
    }
}

fn check_cancelled(token: Option<&CancellationToken>) -> Result<()> {
    if token.map(|t| t.is_cancelled()).unwrap_or(false) {
        return Err(Error::Cancelled);
    }
    Ok(())
}
