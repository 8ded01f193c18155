//! Selector: partitions context-matching atoms into skeleton (mandatory)
//! and flesh (optional, scored) sets using a hybrid of deterministic
//! tag-specificity scoring and a pluggable semantic-search score.
//!
//! DESIGN DECISION: a closed list of "structured-output-only" shard types
//! WHY: mirrors `matching.rs::score_pattern`'s shape (sum weighted
//! dimensions into one number) generalized from the teacher's fixed 10-term
//! confidence breakdown to the spec's configurable `(α, β)` mix.

use crate::atom::Atom;
use crate::config::CompilerConfig;
use crate::context::{matches, Context};
use crate::corpus::Corpus;
use crate::error::{DropStage, Warning};
use crate::external::SemanticSearch;
use crate::manifest::DroppedAtom;

/// A corpus atom with its selection-time scores. Carried through resolution
/// and budgeting so later stages never have to recompute the scores.
#[derive(Debug, Clone)]
pub struct ScoredAtom {
    pub atom: Atom,
    pub score_logic: f64,
    pub score_vector: f64,
    pub combined: f64,
    pub is_mandatory: bool,
}

/// The closed list of shard types whose prompt must omit piggyback and
/// reasoning-trace protocol atoms (§4.2 step 4).
const STRUCTURED_OUTPUT_SHARDS: [&str; 2] = ["mangle_repair", "legislator"];

fn is_structured_output_shard(shard_type: Option<&str>) -> bool {
    match shard_type {
        Some(tag) => {
            let norm = crate::atom::normalize_tag(tag);
            STRUCTURED_OUTPUT_SHARDS.contains(&norm)
        }
        None => false,
    }
}

fn is_structured_output_atom_id(id: &str) -> bool {
    id.starts_with("protocol/piggyback/") || id.starts_with("protocol/reasoning/")
}

/// Counts how many of an atom's eleven selector dimensions are non-empty
/// (i.e. the atom committed to a constraint there). Atoms that already
/// passed `matches` and are more specific rank higher — specificity is a
/// proxy for relevance the way `matching.rs`'s keyword-overlap weighting is.
fn specificity(atom: &Atom) -> usize {
    let s = atom.selectors();
    [
        &s.operational_mode,
        &s.campaign_phase,
        &s.build_layer,
        &s.init_phase,
        &s.northstar_phase,
        &s.ouroboros_stage,
        &s.intent_verb,
        &s.shard_type,
        &s.language,
        &s.framework,
        &s.world_state,
    ]
    .iter()
    .filter(|dim| !dim.is_empty())
    .count()
}

fn score_logic(atom: &Atom) -> f64 {
    let spec = specificity(atom) as f64 / 11.0;
    let priority_bonus = atom.priority() as f64 * 0.001;
    spec + priority_bonus
}

/// Runs selection: filter by context match, partition skeleton/flesh, score,
/// apply the structured-output filter. Returns the surviving scored atoms
/// plus any warnings (currently only `SemanticSearchUnavailable`).
pub fn select(
    corpus: &Corpus,
    ctx: &Context,
    config: &CompilerConfig,
    semantic: Option<&dyn SemanticSearch>,
) -> (Vec<ScoredAtom>, Vec<DroppedAtom>, Vec<Warning>) {
    let span = tracing::info_span!("select");
    let _enter = span.enter();

    let mut warnings = Vec::new();

    let (matching, mut dropped): (Vec<&Atom>, Vec<DroppedAtom>) = {
        let mut matching = Vec::new();
        let mut dropped = Vec::new();
        for atom in corpus.all() {
            if matches(atom, ctx) {
                matching.push(atom);
            } else {
                dropped.push(DroppedAtom {
                    atom_id: atom.id().to_string(),
                    stage: DropStage::Unmatched,
                    reason: "context selectors did not match".to_string(),
                });
            }
        }
        (matching, dropped)
    };

    let vector_scores: std::collections::HashMap<String, f64> = match semantic {
        Some(search) => {
            let query = ctx.search_query();
            search
                .search(&query, &matching, matching.len())
                .into_iter()
                .collect()
        }
        None => {
            warnings.push(Warning::SemanticSearchUnavailable {
                reason: "no semantic search collaborator supplied".to_string(),
            });
            tracing::warn!("semantic search unavailable, falling back to score_vector = 0");
            std::collections::HashMap::new()
        }
    };

    let structured_output_shard = is_structured_output_shard(ctx.shard_type.as_deref());
    let mut scored: Vec<ScoredAtom> = matching
        .into_iter()
        .filter(|a| {
            let drop = structured_output_shard && is_structured_output_atom_id(a.id());
            if drop {
                dropped.push(DroppedAtom {
                    atom_id: a.id().to_string(),
                    stage: DropStage::Unmatched,
                    reason: "structured-output shard omits piggyback/reasoning atoms".to_string(),
                });
            }
            !drop
        })
        .map(|atom| {
            let logic = score_logic(atom);
            let vector = vector_scores.get(atom.id()).copied().unwrap_or(0.0);
            let combined = config.alpha * logic + config.beta * vector;
            ScoredAtom {
                is_mandatory: atom.is_mandatory(),
                atom: atom.clone(),
                score_logic: logic,
                score_vector: vector,
                combined,
            }
        })
        .collect();

    // Deterministic secondary sort so selection output order never leaks
    // map/filter iteration order; resolver re-sorts again by its own key.
    scored.sort_by(|a, b| {
        b.combined
            .partial_cmp(&a.combined)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.atom.id().cmp(b.atom.id()))
    });

    (scored, dropped, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::{AtomBuilder, Category, SelectorSet};

    fn atom(id: &str, category: Category) -> Atom {
        AtomBuilder::new()
            .id(id)
            .content("hi")
            .category(category)
            .build()
            .unwrap()
    }

    #[test]
    fn mandatory_category_atoms_are_skeleton() {
        let mut corpus = Corpus::new();
        corpus.insert(atom("safety/1", Category::Safety));
        corpus.insert(atom("domain/1", Category::Domain));
        let ctx = Context::default();
        let config = CompilerConfig::default();
        let (scored, _, _) = select(&corpus, &ctx, &config, None);
        let safety = scored.iter().find(|s| s.atom.id() == "safety/1").unwrap();
        assert!(safety.is_mandatory);
        let domain = scored.iter().find(|s| s.atom.id() == "domain/1").unwrap();
        assert!(!domain.is_mandatory);
    }

    #[test]
    fn structured_output_shard_drops_piggyback_and_reasoning() {
        let mut corpus = Corpus::new();
        let piggyback = AtomBuilder::new()
            .id("protocol/piggyback/x")
            .content("hi")
            .category(Category::Protocol)
            .build()
            .unwrap();
        let identity = AtomBuilder::new()
            .id("identity/main")
            .content("hi")
            .category(Category::Identity)
            .build()
            .unwrap();
        corpus.insert(piggyback);
        corpus.insert(identity);

        let ctx = Context {
            shard_type: Some("mangle_repair".to_string()),
            ..Default::default()
        };
        let config = CompilerConfig::default();
        let (scored, _, _) = select(&corpus, &ctx, &config, None);
        assert!(scored.iter().all(|s| s.atom.id() != "protocol/piggyback/x"));
        assert!(scored.iter().any(|s| s.atom.id() == "identity/main"));
    }

    #[test]
    fn missing_semantic_search_yields_zero_vector_score_and_warning() {
        let mut corpus = Corpus::new();
        corpus.insert(atom("a", Category::Domain));
        let ctx = Context::default();
        let config = CompilerConfig::default();
        let (scored, _, warnings) = select(&corpus, &ctx, &config, None);
        assert_eq!(scored[0].score_vector, 0.0);
        assert!(matches!(warnings[0], Warning::SemanticSearchUnavailable { .. }));
    }

    #[test]
    fn non_matching_atom_never_appears_in_output() {
        let mut corpus = Corpus::new();
        let a = AtomBuilder::new()
            .id("a")
            .content("hi")
            .category(Category::Language)
            .selectors(SelectorSet {
                language: vec!["python".to_string()],
                ..Default::default()
            })
            .build()
            .unwrap();
        corpus.insert(a);
        let ctx = Context {
            language: Some("rust".to_string()),
            ..Default::default()
        };
        let config = CompilerConfig::default();
        let (scored, _, _) = select(&corpus, &ctx, &config, None);
        assert!(scored.is_empty());
    }
}
