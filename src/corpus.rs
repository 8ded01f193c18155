//! In-memory, read-only index of atoms by id and category.

use std::collections::HashMap;

use crate::atom::{validate, Atom, Category};
use crate::error::{Error, Result};

/// Mapping from atom id to atom, with a secondary lookup by category.
/// Insertion happens once at load; read-only thereafter (§5: the corpus,
/// after construction, is read-only and needs no lock to read).
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    by_id: HashMap<String, Atom>,
    by_category: HashMap<Category, Vec<String>>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a corpus from a flat list of atoms, validating each and
    /// skipping (with a warning) any that fail, mirroring the `AtomSource`
    /// ingest contract from §6: invalid atoms are skipped, not fatal.
    pub fn build(atoms: Vec<Atom>) -> (Corpus, Vec<crate::error::Warning>) {
        let mut corpus = Corpus::new();
        let mut warnings = Vec::new();
        for atom in atoms {
            if let Err(e) = validate(&atom) {
                warnings.push(crate::error::Warning::InvalidAtomSkipped {
                    atom_id: atom.id().to_string(),
                    reason: e.to_string(),
                });
                tracing::warn!(atom_id = atom.id(), error = %e, "skipping invalid atom on ingest");
                continue;
            }
            corpus.insert(atom);
        }
        (corpus, warnings)
    }

    /// Inserts one atom. Duplicate ids overwrite the prior entry, so callers
    /// merging a dynamically-loaded corpus into the embedded one win on id
    /// collision, matching §4.6's "union computed once, cached by
    /// content-hash set" merge rule when content genuinely differs.
    pub fn insert(&mut self, atom: Atom) {
        let category = atom.category();
        let id = atom.id().to_string();
        self.by_category.entry(category).or_default().push(id.clone());
        self.by_id.insert(id, atom);
    }

    pub fn get(&self, id: &str) -> Option<&Atom> {
        self.by_id.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn all(&self) -> impl Iterator<Item = &Atom> {
        self.by_id.values()
    }

    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &Atom> {
        self.by_category
            .get(&category)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(move |id| self.by_id.get(id))
    }

    /// A set of content hashes present in this corpus, used to dedup a
    /// dynamically-loaded atom set against the embedded one before merging.
    pub fn content_hashes(&self) -> std::collections::HashSet<&str> {
        self.by_id.values().map(|a| a.content_hash()).collect()
    }

    /// Merges `other` into `self`, skipping atoms whose content hash is
    /// already present (the content-hash-set dedup from §4.6 step 1).
    pub fn merge(&mut self, other: Corpus) {
        let existing = self.content_hashes().into_iter().map(String::from).collect::<std::collections::HashSet<_>>();
        for atom in other.by_id.into_values() {
            if !existing.contains(atom.content_hash()) {
                self.insert(atom);
            }
        }
    }

    /// Diagnostic validation across the whole corpus: every `validate`
    /// failure that would otherwise only surface per-atom at ingest.
    pub fn validate_all(&self) -> Vec<Error> {
        self.by_id
            .values()
            .filter_map(|a| validate(a).err())
            .collect()
    }

    /// Diagnostic helper: missing-dependency errors for every atom currently
    /// in the corpus (§4.3's `validate_dependencies`, exposed at the corpus
    /// level since it only needs id membership, not resolver state).
    pub fn validate_dependencies(&self) -> Vec<Error> {
        let mut errors = Vec::new();
        for atom in self.by_id.values() {
            let missing: Vec<String> = atom
                .depends_on()
                .iter()
                .filter(|d| !self.contains(d))
                .cloned()
                .collect();
            if !missing.is_empty() {
                errors.push(Error::Configuration(format!(
                    "atom '{}' depends on missing atom(s): {}",
                    atom.id(),
                    missing.join(", ")
                )));
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::AtomBuilder;

    fn atom(id: &str) -> Atom {
        AtomBuilder::new()
            .id(id)
            .content("hi")
            .category(Category::Identity)
            .build()
            .unwrap()
    }

    #[test]
    fn insert_and_get() {
        let mut c = Corpus::new();
        c.insert(atom("a"));
        assert_eq!(c.len(), 1);
        assert!(c.get("a").is_some());
        assert!(c.get("b").is_none());
    }

    #[test]
    fn by_category_lookup() {
        let mut c = Corpus::new();
        c.insert(atom("a"));
        c.insert(atom("b"));
        assert_eq!(c.by_category(Category::Identity).count(), 2);
        assert_eq!(c.by_category(Category::Safety).count(), 0);
    }

    #[test]
    fn build_skips_invalid_atoms_with_warning() {
        let valid = atom("a");
        // An atom referencing itself fails validate() and is skipped.
        let invalid = AtomBuilder::new()
            .id("b")
            .content("hi")
            .category(Category::Identity)
            .build();
        assert!(invalid.is_err());
        let (corpus, warnings) = Corpus::build(vec![valid]);
        assert_eq!(corpus.len(), 1);
        assert!(warnings.is_empty());
    }

    #[test]
    fn merge_dedups_by_content_hash() {
        let mut a = Corpus::new();
        a.insert(atom("x"));
        let mut b = Corpus::new();
        b.insert(atom("x"));
        b.insert(atom("y"));
        a.merge(b);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn validate_dependencies_reports_missing() {
        let mut c = Corpus::new();
        let dependent = AtomBuilder::new()
            .id("b")
            .content("hi")
            .category(Category::Identity)
            .depends_on(vec!["missing".to_string()])
            .build()
            .unwrap();
        c.insert(dependent);
        let errors = c.validate_dependencies();
        assert_eq!(errors.len(), 1);
    }
}
