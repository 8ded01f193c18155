//! End-to-end scenario tests against the public `Compiler` API, covering the
//! literal compile scenarios from the component design docs (ordering,
//! templating, dependency drop, conflict resolution, budget polymorphism,
//! structured-output filtering).

use atomforge_core::{Atom, AtomBuilder, Category, CompilerConfig, Context, Corpus, Compiler};

fn compiler_with(atoms: Vec<Atom>) -> Compiler {
    let (corpus, warnings) = Corpus::build(atoms);
    assert!(warnings.is_empty());
    Compiler::new(corpus, CompilerConfig::default())
}

#[test]
fn ordering_places_identity_before_exemplar() {
    let x = AtomBuilder::new()
        .id("x")
        .content("X")
        .category(Category::Exemplar)
        .build()
        .unwrap();
    let i = AtomBuilder::new()
        .id("i")
        .content("I")
        .category(Category::Identity)
        .build()
        .unwrap();
    let compiler = compiler_with(vec![x, i]);
    let ctx = Context {
        total_budget: 10_000,
        ..Default::default()
    };
    let output = compiler.compile(&ctx, None).unwrap();
    assert_eq!(output.prompt, "I\n\nX");
}

#[test]
fn template_functions_substitute_from_context() {
    let atom = AtomBuilder::new()
        .id("identity/main")
        .content("You are a {{shard_type}} in {{operational_mode}} mode.")
        .category(Category::Identity)
        .build()
        .unwrap();
    let compiler = compiler_with(vec![atom]);
    let ctx = Context {
        shard_type: Some("/coder".to_string()),
        operational_mode: Some("/active".to_string()),
        total_budget: 10_000,
        ..Default::default()
    };
    let output = compiler.compile(&ctx, None).unwrap();
    assert_eq!(output.prompt, "You are a coder in active mode.");
}

#[test]
fn missing_dependency_drops_the_dependent_only() {
    let a = AtomBuilder::new()
        .id("a")
        .content("A")
        .category(Category::Identity)
        .build()
        .unwrap();
    let b = AtomBuilder::new()
        .id("b")
        .content("B")
        .category(Category::Exemplar)
        .depends_on(vec!["c".to_string()])
        .build()
        .unwrap();
    let compiler = compiler_with(vec![a, b]);
    let ctx = Context {
        total_budget: 10_000,
        ..Default::default()
    };
    let output = compiler.compile(&ctx, None).unwrap();
    assert_eq!(output.prompt, "A");
    let drop = output.manifest.dropped.iter().find(|d| d.atom_id == "b").unwrap();
    assert_eq!(drop.stage, atomforge_core::DropStage::MissingDependency);
}

#[test]
fn higher_scoring_conflicting_atom_wins() {
    let p = AtomBuilder::new()
        .id("p")
        .content("P")
        .category(Category::Identity)
        .priority(90)
        .conflicts_with(vec!["q".to_string()])
        .build()
        .unwrap();
    let q = AtomBuilder::new()
        .id("q")
        .content("Q")
        .category(Category::Identity)
        .priority(30)
        .build()
        .unwrap();
    let compiler = compiler_with(vec![p, q]);
    let ctx = Context {
        total_budget: 10_000,
        ..Default::default()
    };
    let output = compiler.compile(&ctx, None).unwrap();
    assert_eq!(output.prompt, "P");
    let q_drop = output.manifest.dropped.iter().find(|d| d.atom_id == "q").unwrap();
    assert!(q_drop.reason.contains("conflict with 'p'"));
}

#[test]
fn tight_budget_downgrades_to_min_render() {
    let l = AtomBuilder::new()
        .id("l")
        .content("x".repeat(400))
        .content_concise("y".repeat(80))
        .content_min("z".repeat(20))
        .category(Category::Language)
        .build()
        .unwrap();
    let compiler = compiler_with(vec![l]);
    let ctx = Context {
        total_budget: 40,
        ..Default::default()
    };
    let output = compiler.compile(&ctx, None).unwrap();
    assert_eq!(output.stats.atoms_selected, 1);
    assert!(output.stats.tokens_used <= 40);
}

#[test]
fn structured_output_shard_drops_piggyback_atoms() {
    let piggyback = AtomBuilder::new()
        .id("protocol/piggyback/x")
        .content("PIGGYBACK")
        .category(Category::Protocol)
        .build()
        .unwrap();
    let identity = AtomBuilder::new()
        .id("identity/main")
        .content("IDENTITY")
        .category(Category::Identity)
        .build()
        .unwrap();
    let compiler = compiler_with(vec![piggyback, identity]);
    let ctx = Context {
        shard_type: Some("mangle_repair".to_string()),
        total_budget: 10_000,
        ..Default::default()
    };
    let output = compiler.compile(&ctx, None).unwrap();
    assert!(!output.prompt.contains("PIGGYBACK"));
    assert!(output.prompt.contains("IDENTITY"));
}

#[test]
fn mandatory_category_admitted_regardless_of_own_context_match() {
    // identity/safety/protocol/methodology/hallucination are mandatory
    // categories: any atom in them is skeleton even without selectors
    // matching the context, per the atom model's mandatory-category rule.
    let safety = AtomBuilder::new()
        .id("safety/core")
        .content("Do no harm.")
        .category(Category::Safety)
        .build()
        .unwrap();
    let compiler = compiler_with(vec![safety]);
    let ctx = Context {
        language: Some("rust".to_string()),
        total_budget: 10_000,
        ..Default::default()
    };
    let output = compiler.compile(&ctx, None).unwrap();
    assert!(output.prompt.contains("Do no harm."));
}

#[test]
fn non_matching_selector_excludes_atom_entirely() {
    let rust_only = AtomBuilder::new()
        .id("lang/rust")
        .content("Rust guidance.")
        .category(Category::Language)
        .selectors(atomforge_core::SelectorSet {
            language: vec!["rust".to_string()],
            ..Default::default()
        })
        .build()
        .unwrap();
    let compiler = compiler_with(vec![rust_only]);
    let ctx = Context {
        language: Some("python".to_string()),
        total_budget: 10_000,
        ..Default::default()
    };
    let output = compiler.compile(&ctx, None).unwrap();
    assert!(output.prompt.is_empty());
}
