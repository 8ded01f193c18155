/**
 * Just-in-time prompt compiler
 *
 * DESIGN DECISION: one module per pipeline stage, re-exported flat at the
 * crate root
 * WHY: the compile pipeline (select -> resolve -> budget -> assemble) is
 * leaf-to-root: each stage only depends on the ones before it, so keeping
 * them as separate modules lets each be tested and read in isolation while
 * `Compiler` in compiler.rs is the only thing that wires them together
 *
 * REASONING CHAIN:
 * 1. Atom representation and validation is foundational (atom.rs)
 * 2. Corpus is a read-only index over atoms (corpus.rs)
 * 3. Context describes a single compile request (context.rs)
 * 4. Selector, resolver, and budget manager transform a scored/ordered
 *    atom list stage by stage (selector.rs, resolver.rs, budget.rs)
 * 5. Assembler and template engine turn the final atom list into text
 *    (assembler.rs, template.rs)
 * 6. Compiler orchestrates the above and owns the public API surface
 *    (compiler.rs)
 * 7. Error handling centralized in error.rs provides consistent semantics
 * 8. Configuration (config.rs) and manifest/stats (manifest.rs) are ambient
 *    concerns every stage touches
 *
 * # Architecture Overview
 *
 * ```text
 * ┌──────────────────────────────────────────────────────────────────┐
 * │                         atomforge-core                           │
 * ├───────────┬───────────┬───────────┬───────────┬──────────────────┤
 * │ atom.rs   │ corpus.rs │ context.rs│ selector  │ resolver / budget │
 * ├───────────┴───────────┴───────────┴───────────┴──────────────────┤
 * │         assembler.rs + template.rs (category join, {{name}})      │
 * ├────────────────────────────────────────────────────────────────────┤
 * │                  compiler.rs (Compile, SelectAtoms, ...)          │
 * ├────────────────────────────────────────────────────────────────────┤
 * │          error.rs (Error/Warning)   │   config.rs   │ manifest.rs │
 * └──────────────────────────────────────────────────────────────────┘
 * ```
 */
pub mod assembler;
pub mod atom;
pub mod budget;
pub mod compiler;
pub mod config;
pub mod context;
pub mod corpus;
pub mod error;
pub mod external;
pub mod manifest;
pub mod resolver;
pub mod selector;
pub mod template;

pub use atom::{estimate_tokens, normalize_tag, Atom, AtomBuilder, Category, SelectorSet};
pub use budget::allocate as allocate_budget;
pub use compiler::{CancellationToken, CompileOutput, Compiler};
pub use config::{CompilerConfig, ConfigLoader, PriorityClass};
pub use context::{matches, Context, WorldSignals};
pub use corpus::Corpus;
pub use error::{DropStage, Error, Result, Warning};
pub use external::{AtomSource, SemanticSearch};
pub use manifest::{AdmittedAtom, CompilationStats, DroppedAtom, PhaseTimings, PromptManifest, RenderModeDto};
pub use resolver::{detect_cycles, resolve, validate_dependencies, OrderedAtom, RenderMode};
pub use selector::{select, ScoredAtom};
pub use template::TemplateRegistry;

pub const VERSION_MAJOR: u32 = 0;
pub const VERSION_MINOR: u32 = 1;
pub const VERSION_PATCH: u32 = 0;

/// Returns the library version as a semantic version string.
///
/// # Examples
///
/// ```rust
/// use atomforge_core::version;
/// println!("atomforge-core v{}", version());
/// ```
pub fn version() -> String {
    format!("{}.{}.{}", VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH)
}
