//! Operator-tunable compiler configuration.
//!
//! DESIGN DECISION: a flat `CompilerConfig` plus a two-tier `ConfigLoader`
//! (built-in defaults, optionally overlaid from a TOML file)
//! WHY: generalizes `config/loader.rs`'s `AetherlightConfig` hierarchy
//! (System/Team/Project/User) down to what a single-process library
//! actually needs — there is no multi-user config surface to layer here,
//! just the knobs spec.md's Open Questions name as operator-tunable.

use std::path::Path;

use crate::atom::Category;
use crate::error::Result;

/// The priority class a category is assigned for budget-quota weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityClass {
    Critical,
    High,
    Medium,
    Low,
}

impl PriorityClass {
    pub fn weight(&self) -> f64 {
        match self {
            PriorityClass::Critical => 4.0,
            PriorityClass::High => 3.0,
            PriorityClass::Medium => 2.0,
            PriorityClass::Low => 1.0,
        }
    }
}

/// Every operator-tunable the compile pipeline consults. `Default` supplies
/// the spec's literal defaults (`alpha=0.6`, `beta=0.4`, two-newline
/// separators); everything else follows from the default category order
/// and a priority assignment that puts the five mandatory categories at
/// `Critical`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Weight on the deterministic tag/priority score in `combined`.
    pub alpha: f64,
    /// Weight on the semantic-search score in `combined`.
    pub beta: f64,

    /// The category concatenation order; categories present in a compile
    /// but absent here are appended afterward in lexicographic order.
    pub category_order: Vec<Category>,

    /// Per-category priority class driving budget-quota weighting.
    pub category_priority: Vec<(Category, PriorityClass)>,

    pub section_separator: String,
    pub atom_separator: String,
    pub section_headers: bool,

    /// When true, an atom with an unmet dependency is kept (with a
    /// warning) instead of being dropped.
    pub allow_missing_deps: bool,

    /// Resolves the Open Question of whether a budget-starved mandatory
    /// atom is fatal: `true` returns `BudgetExhausted`, matching the
    /// ordering path's strictness (see DESIGN.md).
    pub mandatory_budget_failure_is_fatal: bool,

    /// Optional whitespace-minify pass after assembly.
    pub minify_whitespace: bool,
    /// Optional hard cap on the final document length, in characters.
    pub max_length_chars: Option<usize>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            alpha: 0.6,
            beta: 0.4,
            category_order: vec![
                Category::Identity,
                Category::Safety,
                Category::Protocol,
                Category::Methodology,
                Category::Hallucination,
                Category::Language,
                Category::Framework,
                Category::Domain,
                Category::Campaign,
                Category::Init,
                Category::Northstar,
                Category::Ouroboros,
                Category::Context,
                Category::Exemplar,
            ],
            category_priority: vec![
                (Category::Identity, PriorityClass::Critical),
                (Category::Safety, PriorityClass::Critical),
                (Category::Protocol, PriorityClass::Critical),
                (Category::Methodology, PriorityClass::Critical),
                (Category::Hallucination, PriorityClass::Critical),
                (Category::Language, PriorityClass::High),
                (Category::Framework, PriorityClass::High),
                (Category::Domain, PriorityClass::High),
                (Category::Campaign, PriorityClass::Medium),
                (Category::Init, PriorityClass::Medium),
                (Category::Northstar, PriorityClass::Medium),
                (Category::Ouroboros, PriorityClass::Medium),
                (Category::Context, PriorityClass::Low),
                (Category::Exemplar, PriorityClass::Low),
            ],
            section_separator: "\n\n".to_string(),
            atom_separator: "\n\n".to_string(),
            section_headers: false,
            allow_missing_deps: false,
            mandatory_budget_failure_is_fatal: true,
            minify_whitespace: false,
            max_length_chars: None,
        }
    }
}

impl CompilerConfig {
    pub fn priority_of(&self, category: Category) -> PriorityClass {
        self.category_priority
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, p)| *p)
            .unwrap_or(PriorityClass::Medium)
    }
}

/// Loads a [`CompilerConfig`], starting from built-in defaults and
/// optionally overlaying a TOML file's contents. Mirrors the teacher's
/// layered-config idiom (`config/loader.rs::ConfigLevel`) collapsed to the
/// two tiers this crate actually needs.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Returns [`CompilerConfig::default`] with no file overlay.
    pub fn defaults() -> CompilerConfig {
        CompilerConfig::default()
    }

    /// Loads defaults, then overlays any fields present in the TOML file at
    /// `path`. Fields omitted from the file keep their default value
    /// (`#[serde(default)]` on `CompilerConfig`).
    pub fn load_with_overlay(path: &Path) -> Result<CompilerConfig> {
        let contents = std::fs::read_to_string(path)?;
        let config: CompilerConfig = toml::from_str(&contents)?;
        Ok(config)
    }
}
