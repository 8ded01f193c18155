//! Budget manager: allocates tokens per category by priority, then picks a
//! render form per atom, dropping optional atoms when starved.
//!
//! DESIGN DECISION: accumulate-and-break-on-overflow per category, with a
//! spare pool carried forward
//! WHY: generalizes `context_loader/assembler.rs::ContextAssembler::assemble`'s
//! token-accumulate loop (`if tokens_used + pattern_tokens > token_budget { break }`)
//! from one flat pass into per-category quotas with render-mode fallback
//! and spillover to later categories.

use std::collections::HashMap;

use crate::atom::{estimate_tokens, Category};
use crate::config::CompilerConfig;
use crate::error::{DropStage, Error, Result};
use crate::manifest::DroppedAtom;
use crate::resolver::{OrderedAtom, RenderMode};

const RENDER_ORDER: [RenderMode; 3] = [RenderMode::Standard, RenderMode::Concise, RenderMode::Min];

struct CategoryBudget {
    quota: usize,
    admitted_count: usize,
    header_charged: bool,
}

/// Allocates `available_tokens` across categories and fits atoms within
/// their category's quota (falling back to shorter render variants, then
/// spilling into the spare pool for mandatory atoms). Returns the survivors
/// (render mode set, stable input order preserved) and the atoms dropped
/// here. Errs with `BudgetExhausted` only when a mandatory atom cannot fit
/// even after exhausting the spare pool, per `mandatory_budget_failure_is_fatal`.
pub fn allocate(
    ordered: Vec<OrderedAtom>,
    available_tokens: usize,
    config: &CompilerConfig,
) -> Result<(Vec<OrderedAtom>, Vec<DroppedAtom>)> {
    let span = tracing::info_span!("budget");
    let _enter = span.enter();

    // Group atoms by category, preserving the resolver's relative order.
    let mut by_category: HashMap<Category, Vec<OrderedAtom>> = HashMap::new();
    let mut category_order_seen: Vec<Category> = Vec::new();
    for atom in ordered {
        let cat = atom.atom.category();
        if !by_category.contains_key(&cat) {
            category_order_seen.push(cat);
        }
        by_category.entry(cat).or_default().push(atom);
    }

    // §4.4 step 1: allocate per-category quotas by priority-class weight.
    let total_weight: f64 = category_order_seen
        .iter()
        .map(|c| config.priority_of(*c).weight())
        .sum();

    let mut quotas: HashMap<Category, usize> = HashMap::new();
    let mut allocated_total = 0usize;
    if total_weight > 0.0 {
        for cat in &category_order_seen {
            let weight = config.priority_of(*cat).weight();
            let quota = ((available_tokens as f64) * weight / total_weight).floor() as usize;
            quotas.insert(*cat, quota);
            allocated_total += quota;
        }
    }

    // Remainder distributed to the highest-priority categories first.
    let mut remainder = available_tokens.saturating_sub(allocated_total);
    let mut by_priority_desc = category_order_seen.clone();
    by_priority_desc.sort_by(|a, b| {
        config
            .priority_of(*b)
            .weight()
            .partial_cmp(&config.priority_of(*a).weight())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.as_str().cmp(b.as_str()))
    });
    for cat in &by_priority_desc {
        if remainder == 0 {
            break;
        }
        *quotas.get_mut(cat).unwrap() += 1;
        remainder -= 1;
    }

    // §4.4 step 2/3: fit each category independently, highest priority
    // first, spilling unused quota into a spare pool for later categories.
    let mut spare_pool: usize = 0;
    let mut survivors: Vec<OrderedAtom> = Vec::new();
    let mut dropped: Vec<DroppedAtom> = Vec::new();
    let mut tokens_used_total = 0usize;

    for cat in &by_priority_desc {
        let mut atoms = by_category.remove(cat).expect("category seen implies present");
        let quota = quotas[cat];
        let mut state = CategoryBudget {
            quota,
            admitted_count: 0,
            header_charged: false,
        };
        let mut category_tokens_used = 0usize;

        for atom in atoms.drain(..) {
            let header_cost = if !state.header_charged && config.section_headers {
                estimate_tokens(atom.atom.category().header())
            } else {
                0
            };
            let separator_cost = if state.admitted_count > 0 {
                estimate_tokens(&config.atom_separator)
            } else {
                0
            };

            // Only mandatory atoms may borrow from the spare pool (§4.4 step 2);
            // optional atoms are limited to this category's own quota.
            let allowance = if atom.is_mandatory { state.quota + spare_pool } else { state.quota };

            let mut fitted: Option<(RenderMode, usize)> = None;
            for mode in RENDER_ORDER {
                let variant_tokens = atom.atom.token_count_for(mode);
                let cost = header_cost + separator_cost + variant_tokens;
                if category_tokens_used + cost <= allowance {
                    fitted = Some((mode, cost));
                    break;
                }
            }

            match fitted {
                Some((mode, cost)) => {
                    // Spend quota first, then spare pool, for this atom's cost.
                    let remaining_quota = state.quota.saturating_sub(category_tokens_used);
                    let from_spare = cost.saturating_sub(remaining_quota);
                    if from_spare > 0 {
                        spare_pool -= from_spare;
                    }
                    category_tokens_used += cost;
                    tokens_used_total += cost;
                    state.admitted_count += 1;
                    state.header_charged = state.header_charged || header_cost > 0;

                    let mut admitted = atom;
                    admitted.render_mode = mode;
                    survivors.push(admitted);
                }
                None => {
                    if atom.is_mandatory {
                        if config.mandatory_budget_failure_is_fatal {
                            return Err(Error::BudgetExhausted(atom.atom.id().to_string()));
                        }
                        tracing::warn!(atom_id = atom.atom.id(), "mandatory atom dropped: budget exhausted");
                        dropped.push(DroppedAtom {
                            atom_id: atom.atom.id().to_string(),
                            stage: DropStage::Budget,
                            reason: "mandatory atom did not fit available budget".to_string(),
                        });
                    } else {
                        dropped.push(DroppedAtom {
                            atom_id: atom.atom.id().to_string(),
                            stage: DropStage::Budget,
                            reason: "did not fit category budget in any render form".to_string(),
                        });
                    }
                }
            }
        }

        // Unused quota in this category feeds the spare pool for the rest.
        let leftover = state.quota.saturating_sub(category_tokens_used);
        spare_pool += leftover;
    }

    debug_assert!(tokens_used_total <= available_tokens || spare_pool == 0);

    // Restore original relative ordering (we iterated in priority order for
    // fitting, but output order must match the resolver's topological order).
    survivors.sort_by_key(|a| a.order);

    Ok((survivors, dropped))
}
