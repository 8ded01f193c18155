//! Compilation context: an immutable description of who is compiling a
//! prompt and what they are doing, used to select and budget atoms.

use crate::atom::{normalize_tag, selector_intersects, selector_matches, Atom};

/// Numeric signals about the world the agent is operating in. These derive
/// the context's world-state tags (`WorldSignals::derive_world_states`);
/// they are never matched against directly.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WorldSignals {
    pub failing_tests: u32,
    pub diagnostic_count: u32,
    pub recent_churn: u32,
}

impl WorldSignals {
    /// Derives an ordered set of world-state tags from the raw signals.
    /// An empty derivation yields `["normal"]`.
    pub fn derive_world_states(&self) -> Vec<String> {
        let mut states = Vec::new();
        if self.failing_tests > 0 {
            states.push("failing_tests".to_string());
        }
        if self.diagnostic_count > 0 {
            states.push("diagnostics_present".to_string());
        }
        if self.recent_churn > 0 {
            states.push("recent_churn".to_string());
        }
        if states.is_empty() {
            states.push("normal".to_string());
        }
        states
    }
}

/// An explicit empty sentinel, rather than a nullable context:
/// `Context::nil()` matches everything (used by diagnostic helpers, never in
/// production compiles), replacing a `nil`-context convention.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Context {
    pub operational_mode: Option<String>,
    pub campaign_phase: Option<String>,
    pub build_layer: Option<String>,
    pub init_phase: Option<String>,
    pub northstar_phase: Option<String>,
    pub ouroboros_stage: Option<String>,
    pub intent_verb: Option<String>,
    pub shard_type: Option<String>,
    pub language: Option<String>,
    pub framework: Option<String>,

    pub active_frameworks: Vec<String>,

    pub total_budget: usize,
    pub reserved_for_response: usize,

    pub world_signals: WorldSignals,

    /// When true, this context matches every atom unconditionally. Used for
    /// diagnostics (`ValidateCorpus`); never set by production compiles.
    pub is_nil: bool,
}

impl Context {
    /// A nil context: matches everything, for diagnostics only.
    pub fn nil() -> Self {
        Context {
            is_nil: true,
            ..Default::default()
        }
    }

    /// `max(0, total_budget - reserved_for_response)`.
    pub fn available_tokens(&self) -> usize {
        self.total_budget.saturating_sub(self.reserved_for_response)
    }

    /// The world-state tags derived from this context's numeric signals.
    pub fn world_states(&self) -> Vec<String> {
        self.world_signals.derive_world_states()
    }

    /// Builds the semantic-search query string: non-empty context tags
    /// joined with spaces, per §6.
    pub fn search_query(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(v) = &self.intent_verb {
            parts.push(v);
        }
        if let Some(v) = &self.language {
            parts.push(v);
        }
        if let Some(v) = &self.build_layer {
            parts.push(v);
        }
        if let Some(v) = &self.shard_type {
            parts.push(v);
        }
        parts.iter().map(|t| normalize_tag(t)).collect::<Vec<_>>().join(" ")
    }
}

/// Whether `atom` applies in `ctx`. A nil context matches everything.
///
/// For each single-valued dimension: the selector is empty, or the
/// context's tag for that dimension is present in the selector (modulo the
/// `/` normalisation). For `framework` and `world_state` (multi-valued):
/// non-empty intersection with the context's active-frameworks /
/// derived-world-state lists.
pub fn matches(atom: &Atom, ctx: &Context) -> bool {
    if ctx.is_nil {
        return true;
    }
    let s = atom.selectors();

    single_matches(&s.operational_mode, ctx.operational_mode.as_deref())
        && single_matches(&s.campaign_phase, ctx.campaign_phase.as_deref())
        && single_matches(&s.build_layer, ctx.build_layer.as_deref())
        && single_matches(&s.init_phase, ctx.init_phase.as_deref())
        && single_matches(&s.northstar_phase, ctx.northstar_phase.as_deref())
        && single_matches(&s.ouroboros_stage, ctx.ouroboros_stage.as_deref())
        && single_matches(&s.intent_verb, ctx.intent_verb.as_deref())
        && single_matches(&s.shard_type, ctx.shard_type.as_deref())
        && single_matches(&s.language, ctx.language.as_deref())
        && selector_intersects(&s.framework, &ctx.active_frameworks)
        && selector_intersects(&s.world_state, &ctx.world_states())
}

fn single_matches(selector: &[String], candidate: Option<&str>) -> bool {
    if selector.is_empty() {
        return true;
    }
    match candidate {
        Some(tag) => selector_matches(selector, tag),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::{AtomBuilder, Category, SelectorSet};

    fn ctx_with_language(lang: &str) -> Context {
        Context {
            language: Some(lang.to_string()),
            total_budget: 1000,
            ..Default::default()
        }
    }

    #[test]
    fn nil_context_matches_everything() {
        let a = AtomBuilder::new()
            .id("x")
            .content("hi")
            .category(Category::Identity)
            .selectors(SelectorSet {
                language: vec!["/rust".to_string()],
                ..Default::default()
            })
            .build()
            .unwrap();
        assert!(matches(&a, &Context::nil()));
    }

    #[test]
    fn single_valued_dimension_respects_slash_normalization() {
        let a = AtomBuilder::new()
            .id("x")
            .content("hi")
            .category(Category::Language)
            .selectors(SelectorSet {
                language: vec!["/rust".to_string()],
                ..Default::default()
            })
            .build()
            .unwrap();
        assert!(matches(&a, &ctx_with_language("rust")));
        assert!(!matches(&a, &ctx_with_language("python")));
    }

    #[test]
    fn empty_selector_matches_any_context() {
        let a = AtomBuilder::new()
            .id("x")
            .content("hi")
            .category(Category::Identity)
            .build()
            .unwrap();
        assert!(matches(&a, &ctx_with_language("anything")));
        assert!(matches(&a, &Context::default()));
    }

    #[test]
    fn framework_dimension_requires_intersection_with_active_frameworks() {
        let a = AtomBuilder::new()
            .id("x")
            .content("hi")
            .category(Category::Framework)
            .selectors(SelectorSet {
                framework: vec!["react".to_string()],
                ..Default::default()
            })
            .build()
            .unwrap();
        let mut ctx = Context::default();
        assert!(!matches(&a, &ctx));
        ctx.active_frameworks = vec!["vue".to_string()];
        assert!(!matches(&a, &ctx));
        ctx.active_frameworks = vec!["/react".to_string()];
        assert!(matches(&a, &ctx));
    }

    #[test]
    fn available_tokens_floors_at_zero() {
        let ctx = Context {
            total_budget: 10,
            reserved_for_response: 50,
            ..Default::default()
        };
        assert_eq!(ctx.available_tokens(), 0);
    }

    #[test]
    fn world_states_default_to_normal() {
        assert_eq!(Context::default().world_states(), vec!["normal".to_string()]);
    }
}
