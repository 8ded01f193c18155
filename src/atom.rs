//! The atom model: self-contained, tagged prompt fragments.
//!
//! DESIGN DECISION: closed `Category` enum with a bidirectional string mapping
//! WHY: categories form a small fixed set that drives both validation and
//! assembly order; a raw `String` field would let a typo silently create a
//! new, unordered category. Keep the `/`-normalisation rule (`normalize_tag`)
//! so on-disk tag data stays stable across legacy and current callers.

use sha2::{Digest, Sha256};
use std::collections::HashSet;

use crate::error::{Error, Result};

/// The closed set of atom categories. Five of these (`Identity`, `Safety`,
/// `Protocol`, `Methodology`, `Hallucination`) are the "mandatory categories"
/// from selection (§4.2): any matching atom in one of them is skeleton,
/// regardless of its own `is_mandatory` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Category {
    Identity,
    Safety,
    Protocol,
    Methodology,
    Hallucination,
    Language,
    Framework,
    Domain,
    Campaign,
    Init,
    Northstar,
    Ouroboros,
    Context,
    Exemplar,
}

impl Category {
    pub const MANDATORY: [Category; 5] = [
        Category::Identity,
        Category::Safety,
        Category::Protocol,
        Category::Methodology,
        Category::Hallucination,
    ];

    /// Canonical on-disk tag for this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Identity => "identity",
            Category::Safety => "safety",
            Category::Protocol => "protocol",
            Category::Methodology => "methodology",
            Category::Hallucination => "hallucination",
            Category::Language => "language",
            Category::Framework => "framework",
            Category::Domain => "domain",
            Category::Campaign => "campaign",
            Category::Init => "init",
            Category::Northstar => "northstar",
            Category::Ouroboros => "ouroboros",
            Category::Context => "context",
            Category::Exemplar => "exemplar",
        }
    }

    pub fn from_str(raw: &str) -> Option<Category> {
        match raw {
            "identity" => Some(Category::Identity),
            "safety" => Some(Category::Safety),
            "protocol" => Some(Category::Protocol),
            "methodology" => Some(Category::Methodology),
            "hallucination" => Some(Category::Hallucination),
            "language" => Some(Category::Language),
            "framework" => Some(Category::Framework),
            "domain" => Some(Category::Domain),
            "campaign" => Some(Category::Campaign),
            "init" => Some(Category::Init),
            "northstar" => Some(Category::Northstar),
            "ouroboros" => Some(Category::Ouroboros),
            "context" => Some(Category::Context),
            "exemplar" => Some(Category::Exemplar),
            _ => None,
        }
    }

    pub fn is_mandatory_category(&self) -> bool {
        Category::MANDATORY.contains(self)
    }

    /// Markdown `##` header text for this category, per §4.5's fixed table.
    pub fn header(&self) -> &'static str {
        match self {
            Category::Identity => "## Identity",
            Category::Safety => "## Safety",
            Category::Protocol => "## Protocol",
            Category::Methodology => "## Methodology",
            Category::Hallucination => "## Hallucination Avoidance",
            Category::Language => "## Language",
            Category::Framework => "## Framework",
            Category::Domain => "## Domain",
            Category::Campaign => "## Campaign",
            Category::Init => "## Initialization",
            Category::Northstar => "## North Star",
            Category::Ouroboros => "## Ouroboros",
            Category::Context => "## Context",
            Category::Exemplar => "## Exemplars",
        }
    }
}

/// Strips a single leading `/` for backward-compatible legacy tag comparison.
/// `/coder` and `coder` are the same tag everywhere a selector is matched.
pub fn normalize_tag(tag: &str) -> &str {
    tag.strip_prefix('/').unwrap_or(tag)
}

fn tags_match(selector: &[String], candidate: &str) -> bool {
    selector.is_empty() || selector.iter().any(|t| normalize_tag(t) == normalize_tag(candidate))
}

/// Non-empty-intersection rule for multi-valued dimensions (`frameworks`,
/// `world_states`): an empty candidate list with a non-empty selector is a
/// non-match, mirroring the single-valued rule's "empty selector == no
/// constraint" but requiring actual overlap rather than membership.
fn tags_intersect(selector: &[String], candidates: &[String]) -> bool {
    if selector.is_empty() {
        return true;
    }
    selector
        .iter()
        .any(|s| candidates.iter().any(|c| normalize_tag(c) == normalize_tag(s)))
}

/// The eleven selector dimensions an atom may constrain itself to. Each is
/// an ordered list of tag strings; an empty list means "no constraint".
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SelectorSet {
    #[serde(default)]
    pub operational_mode: Vec<String>,
    #[serde(default)]
    pub campaign_phase: Vec<String>,
    #[serde(default)]
    pub build_layer: Vec<String>,
    #[serde(default)]
    pub init_phase: Vec<String>,
    #[serde(default)]
    pub northstar_phase: Vec<String>,
    #[serde(default)]
    pub ouroboros_stage: Vec<String>,
    #[serde(default)]
    pub intent_verb: Vec<String>,
    #[serde(default)]
    pub shard_type: Vec<String>,
    #[serde(default)]
    pub language: Vec<String>,
    /// Multi-valued against the context's active-frameworks list (non-empty
    /// intersection), not the context's singular `framework` tier field.
    #[serde(default)]
    pub framework: Vec<String>,
    #[serde(default)]
    pub world_state: Vec<String>,
}

/// A self-contained prompt fragment.
///
/// Fields are private; construct via [`AtomBuilder`], which validates and
/// computes `content_hash`/`token_count` at `build()`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Atom {
    id: String,
    version: String,
    content_hash: String,

    content: String,
    content_concise: Option<String>,
    content_min: Option<String>,
    description: Option<String>,

    category: Category,
    subcategory: Option<String>,

    selectors: SelectorSet,

    priority: i32,
    is_mandatory: bool,
    is_exclusive: Option<String>,
    depends_on: Vec<String>,
    conflicts_with: Vec<String>,

    token_count: usize,
    semantic_vector: Option<Vec<f32>>,
}

impl Atom {
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn version(&self) -> &str {
        &self.version
    }
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }
    pub fn content(&self) -> &str {
        &self.content
    }
    pub fn content_concise(&self) -> Option<&str> {
        self.content_concise.as_deref()
    }
    pub fn content_min(&self) -> Option<&str> {
        self.content_min.as_deref()
    }
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
    pub fn category(&self) -> Category {
        self.category
    }
    pub fn subcategory(&self) -> Option<&str> {
        self.subcategory.as_deref()
    }
    pub fn selectors(&self) -> &SelectorSet {
        &self.selectors
    }
    pub fn priority(&self) -> i32 {
        self.priority
    }
    pub fn is_mandatory(&self) -> bool {
        self.is_mandatory || self.category.is_mandatory_category()
    }
    pub fn is_exclusive(&self) -> Option<&str> {
        self.is_exclusive.as_deref()
    }
    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }
    pub fn conflicts_with(&self) -> &[String] {
        &self.conflicts_with
    }
    pub fn token_count(&self) -> usize {
        self.token_count
    }
    pub fn semantic_vector(&self) -> Option<&[f32]> {
        self.semantic_vector.as_deref()
    }

    /// Returns the text for a given render mode, falling back to `content`
    /// if the requested variant is absent (§4.4 polymorphism rule).
    pub fn content_for(&self, mode: crate::resolver::RenderMode) -> &str {
        use crate::resolver::RenderMode;
        match mode {
            RenderMode::Standard => &self.content,
            RenderMode::Concise => self.content_concise.as_deref().unwrap_or(&self.content),
            RenderMode::Min => self
                .content_min
                .as_deref()
                .or(self.content_concise.as_deref())
                .unwrap_or(&self.content),
        }
    }

    /// Token estimate for the given render mode's text.
    pub fn token_count_for(&self, mode: crate::resolver::RenderMode) -> usize {
        estimate_tokens(self.content_for(mode))
    }
}

/// chars/4, rounded up — the fixed, deliberately inexact tokenisation
/// heuristic used everywhere in this crate (atoms, budget quotas, template
/// substitution cost checks).
pub fn estimate_tokens(text: &str) -> usize {
    let chars = text.chars().count();
    (chars + 3) / 4
}

fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Validates the invariants an atom must hold before it can reach the
/// resolver: non-empty `id`/`content`, a known `category`, and no
/// self-referential `depends_on`/`conflicts_with` entry.
pub fn validate(atom: &Atom) -> Result<()> {
    if atom.id.is_empty() {
        return Err(Error::InvalidAtom("empty id".into()));
    }
    if atom.content.is_empty() {
        return Err(Error::InvalidAtom(format!("atom '{}' has empty content", atom.id)));
    }
    if atom.depends_on.iter().any(|d| d == &atom.id) {
        return Err(Error::InvalidAtom(format!(
            "atom '{}' depends on itself",
            atom.id
        )));
    }
    if atom.conflicts_with.iter().any(|c| c == &atom.id) {
        return Err(Error::InvalidAtom(format!(
            "atom '{}' conflicts with itself",
            atom.id
        )));
    }
    Ok(())
}

#[derive(Debug, Default, Clone)]
pub struct AtomBuilder {
    id: Option<String>,
    version: String,
    content: Option<String>,
    content_concise: Option<String>,
    content_min: Option<String>,
    description: Option<String>,
    category: Option<Category>,
    subcategory: Option<String>,
    selectors: SelectorSet,
    priority: i32,
    is_mandatory: bool,
    is_exclusive: Option<String>,
    depends_on: Vec<String>,
    conflicts_with: Vec<String>,
    semantic_vector: Option<Vec<f32>>,
}

impl AtomBuilder {
    pub fn new() -> Self {
        Self {
            version: "1".to_string(),
            ..Default::default()
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
    pub fn content_concise(mut self, content: impl Into<String>) -> Self {
        self.content_concise = Some(content.into());
        self
    }
    pub fn content_min(mut self, content: impl Into<String>) -> Self {
        self.content_min = Some(content.into());
        self
    }
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }
    pub fn subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = Some(subcategory.into());
        self
    }
    pub fn selectors(mut self, selectors: SelectorSet) -> Self {
        self.selectors = selectors;
        self
    }
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
    pub fn mandatory(mut self, is_mandatory: bool) -> Self {
        self.is_mandatory = is_mandatory;
        self
    }
    pub fn exclusive_group(mut self, group: impl Into<String>) -> Self {
        self.is_exclusive = Some(group.into());
        self
    }
    pub fn depends_on(mut self, ids: Vec<String>) -> Self {
        self.depends_on = ids;
        self
    }
    pub fn conflicts_with(mut self, ids: Vec<String>) -> Self {
        self.conflicts_with = ids;
        self
    }
    pub fn semantic_vector(mut self, vector: Vec<f32>) -> Self {
        self.semantic_vector = Some(vector);
        self
    }

    pub fn build(self) -> Result<Atom> {
        let id = self.id.ok_or_else(|| Error::InvalidAtom("missing id".into()))?;
        let content = self
            .content
            .ok_or_else(|| Error::InvalidAtom(format!("atom '{id}' missing content")))?;
        let category = self
            .category
            .ok_or_else(|| Error::InvalidAtom(format!("atom '{id}' missing category")))?;

        if id.is_empty() {
            return Err(Error::InvalidAtom("empty id".into()));
        }
        if content.is_empty() {
            return Err(Error::InvalidAtom(format!("atom '{id}' has empty content")));
        }
        let self_dep_or_conflict: HashSet<&str> = self
            .depends_on
            .iter()
            .map(String::as_str)
            .chain(self.conflicts_with.iter().map(String::as_str))
            .collect();
        if self_dep_or_conflict.contains(id.as_str()) {
            return Err(Error::InvalidAtom(format!(
                "atom '{id}' references itself in depends_on/conflicts_with"
            )));
        }

        let content_hash = sha256_hex(&content);
        let token_count = estimate_tokens(&content);

        let atom = Atom {
            id,
            version: self.version,
            content_hash,
            content,
            content_concise: self.content_concise,
            content_min: self.content_min,
            description: self.description,
            category,
            subcategory: self.subcategory,
            selectors: self.selectors,
            priority: self.priority,
            is_mandatory: self.is_mandatory,
            is_exclusive: self.is_exclusive,
            depends_on: self.depends_on,
            conflicts_with: self.conflicts_with,
            token_count,
            semantic_vector: self.semantic_vector,
        };
        validate(&atom)?;
        Ok(atom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(id: &str, category: Category) -> Atom {
        AtomBuilder::new()
            .id(id)
            .content("hello world")
            .category(category)
            .build()
            .unwrap()
    }

    #[test]
    fn builder_computes_hash_and_tokens() {
        let a = atom("x", Category::Identity);
        assert_eq!(a.content_hash().len(), 64);
        assert_eq!(a.token_count(), estimate_tokens("hello world"));
    }

    #[test]
    fn builder_rejects_empty_content() {
        let err = AtomBuilder::new()
            .id("x")
            .content("")
            .category(Category::Identity)
            .build();
        assert!(err.is_err());
    }

    #[test]
    fn builder_rejects_self_dependency() {
        let err = AtomBuilder::new()
            .id("x")
            .content("hi")
            .category(Category::Identity)
            .depends_on(vec!["x".to_string()])
            .build();
        assert!(matches!(err, Err(Error::InvalidAtom(_))));
    }

    #[test]
    fn mandatory_category_is_mandatory_even_when_flag_false() {
        let a = atom("x", Category::Safety);
        assert!(a.is_mandatory());
    }

    #[test]
    fn normalize_tag_strips_leading_slash() {
        assert_eq!(normalize_tag("/coder"), "coder");
        assert_eq!(normalize_tag("coder"), "coder");
    }

    #[test]
    fn tags_match_empty_selector_matches_anything() {
        assert!(tags_match(&[], "anything"));
        assert!(tags_match(&["/coder".to_string()], "coder"));
        assert!(!tags_match(&["coder".to_string()], "reviewer"));
    }

    #[test]
    fn tags_intersect_requires_overlap() {
        let selector = vec!["react".to_string()];
        assert!(!tags_intersect(&selector, &[]));
        assert!(tags_intersect(&selector, &["/react".to_string()]));
        assert!(!tags_intersect(&selector, &["vue".to_string()]));
        assert!(tags_intersect(&[], &[]));
    }

    #[test]
    fn category_round_trips_through_str() {
        for c in Category::MANDATORY {
            assert_eq!(Category::from_str(c.as_str()), Some(c));
        }
    }
}

pub(crate) use tags_intersect as selector_intersects;
pub(crate) use tags_match as selector_matches;
