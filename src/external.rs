//! External collaborators the core depends on as interfaces only (§6): a
//! semantic-search ranker and an atom loader. Neither is implemented here —
//! the core makes no assumption about embeddings, storage, or transport.

use crate::atom::Atom;
use crate::context::Context;
use crate::error::Result;

/// Ranks atoms against a free-text query. `search` returns `(atom_id,
/// score)` pairs with scores in `[0, 1]`; missing or failing collaborators
/// simply aren't called — the selector treats that as `score_vector = 0`
/// for every atom, never as a hard failure.
pub trait SemanticSearch: Send + Sync {
    fn search(&self, query: &str, atoms: &[&Atom], top_k: usize) -> Vec<(String, f64)>;
}

/// Loads atoms once at startup from whatever backing store a caller chooses
/// (embedded file tree, SQLite, a remote service). The core never calls
/// this itself; callers invoke it and hand the result to [`crate::corpus::Corpus::build`].
pub trait AtomSource {
    fn load_atoms(&self, ctx: &Context) -> Result<Vec<Atom>>;
}
