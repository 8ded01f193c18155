//! Resolver: dependency filtering, conflict resolution, and topological
//! ordering.
//!
//! DESIGN DECISION: adapt Kahn's algorithm with an in-degree map and a
//! priority queue tie-break
//! WHY: directly generalizes the teacher's sprint dependency graph
//! (`sprint_parser/dependency_graph.rs::DependencyGraph::topological_sort`),
//! which already tracks in-degree per node and detects cycles by comparing
//! the sorted count to the input count — the same check catches a cycle
//! here without a separate acyclicity pre-pass.

use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::atom::Atom;
use crate::error::{Error, Result, Warning};
use crate::manifest::DroppedAtom;
use crate::selector::ScoredAtom;

/// Which variant of an atom's content the budget manager selected.
/// Always attempted in this order: `Standard` first, then `Concise`, then
/// `Min`; each strictly shorter than the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RenderMode {
    Standard,
    Concise,
    Min,
}

/// An atom placed at a specific position in the output, carrying its
/// selection-time score and the render mode the budget manager picked
/// (always `Standard` immediately after resolution).
#[derive(Debug, Clone)]
pub struct OrderedAtom {
    pub atom: Atom,
    pub order: usize,
    pub score: f64,
    pub is_mandatory: bool,
    pub render_mode: RenderMode,
}

/// Runs the dependency filter to a fixed point, then conflict resolution,
/// then topological ordering. Returns the ordered survivors, a record of
/// every atom dropped at this stage (for the manifest), and any non-fatal
/// warnings (`MissingDependency` when `allow_missing_deps`,
/// `MandatoryDropped` when a mandatory atom loses a conflict).
pub fn resolve(
    scored: Vec<ScoredAtom>,
    allow_missing_deps: bool,
) -> Result<(Vec<OrderedAtom>, Vec<DroppedAtom>, Vec<Warning>)> {
    let span = tracing::info_span!("resolve");
    let _enter = span.enter();

    let mut dropped = Vec::new();
    let mut warnings = Vec::new();

    let (after_deps, dep_dropped, dep_warnings) = filter_missing_dependencies(scored, allow_missing_deps);
    dropped.extend(dep_dropped);
    warnings.extend(dep_warnings);

    let (after_conflicts, conflict_dropped, conflict_warnings) = resolve_conflicts(after_deps);
    dropped.extend(conflict_dropped);
    warnings.extend(conflict_warnings);

    let ordered = topological_sort(after_conflicts)?;

    Ok((ordered, dropped, warnings))
}

fn filter_missing_dependencies(
    atoms: Vec<ScoredAtom>,
    allow_missing_deps: bool,
) -> (Vec<ScoredAtom>, Vec<DroppedAtom>, Vec<Warning>) {
    let mut current: HashMap<String, ScoredAtom> =
        atoms.into_iter().map(|a| (a.atom.id().to_string(), a)).collect();
    let mut dropped = Vec::new();
    let mut warnings = Vec::new();

    loop {
        let ids: HashSet<String> = current.keys().cloned().collect();
        let unmet: Vec<(String, Vec<String>)> = current
            .values()
            .filter_map(|s| {
                let missing: Vec<String> = s
                    .atom
                    .depends_on()
                    .iter()
                    .filter(|d| !ids.contains(d.as_str()))
                    .cloned()
                    .collect();
                if missing.is_empty() {
                    None
                } else {
                    Some((s.atom.id().to_string(), missing))
                }
            })
            .collect();

        if unmet.is_empty() {
            break;
        }

        if allow_missing_deps {
            for (id, missing) in unmet {
                tracing::warn!(atom_id = %id, missing = ?missing, "keeping atom with unmet dependency (allow_missing_deps)");
                warnings.push(Warning::MissingDependency { atom_id: id, missing });
            }
            break;
        }

        for (id, missing) in unmet {
            current.remove(&id);
            dropped.push(DroppedAtom {
                atom_id: id,
                stage: crate::error::DropStage::MissingDependency,
                reason: format!("missing dependency: {}", missing.join(", ")),
            });
        }
        // loop again: removing these atoms may have invalidated others
    }

    (current.into_values().collect(), dropped, warnings)
}

fn resolve_conflicts(atoms: Vec<ScoredAtom>) -> (Vec<ScoredAtom>, Vec<DroppedAtom>, Vec<Warning>) {
    let mut sorted = atoms;
    sorted.sort_by(|a, b| {
        b.combined
            .partial_cmp(&a.combined)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.atom.id().cmp(b.atom.id()))
    });

    let mut excluded_by: HashMap<String, String> = HashMap::new();
    let mut claimed_groups: HashMap<String, String> = HashMap::new();
    let mut accepted_ids: HashSet<String> = HashSet::new();
    let mut accepted = Vec::new();
    let mut dropped = Vec::new();
    let mut warnings = Vec::new();

    for scored in sorted {
        let id = scored.atom.id().to_string();

        let exclusion_reason = if let Some(winner) = excluded_by.get(&id) {
            Some(format!("conflict with '{winner}'"))
        } else if let Some(winner) = scored.atom.conflicts_with().iter().find(|c| accepted_ids.contains(c.as_str())) {
            // The candidate itself declares the conflict against an already-accepted
            // atom; exclusion must be symmetric regardless of who named whom.
            Some(format!("conflict with '{winner}'"))
        } else if let Some(group) = scored.atom.is_exclusive() {
            claimed_groups
                .get(group)
                .map(|winner| format!("exclusive group '{group}' already claimed by '{winner}'"))
        } else {
            None
        };

        if let Some(reason) = exclusion_reason {
            if scored.is_mandatory {
                tracing::warn!(atom_id = %id, reason = %reason, "mandatory atom dropped by conflict resolution");
                warnings.push(Warning::MandatoryDropped {
                    atom_id: id.clone(),
                    reason: reason.clone(),
                });
            }
            dropped.push(DroppedAtom {
                atom_id: id,
                stage: crate::error::DropStage::Conflict,
                reason,
            });
            continue;
        }

        for conflicting in scored.atom.conflicts_with() {
            excluded_by.entry(conflicting.clone()).or_insert_with(|| id.clone());
        }
        if let Some(group) = scored.atom.is_exclusive() {
            claimed_groups.insert(group.to_string(), id.clone());
        }

        accepted_ids.insert(id.clone());
        accepted.push(scored);
    }

    (accepted, dropped, warnings)
}

/// Kahn's algorithm over the `depends_on` edges (`dep -> atom`), seeded with
/// zero-in-degree nodes and broken out of hash-map order by a max-heap
/// keyed on `(is_mandatory, combined)` so peer ordering is deterministic. A
/// processed count short of the input size means a cycle; the shortest
/// cycle is then found via iterative DFS with parent tracking, matching
/// `DependencyGraph::topological_sort`'s count-mismatch cycle signal.
fn topological_sort(atoms: Vec<ScoredAtom>) -> Result<Vec<OrderedAtom>> {
    let by_id: HashMap<String, ScoredAtom> =
        atoms.into_iter().map(|a| (a.atom.id().to_string(), a)).collect();

    let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
    let mut in_degree: HashMap<String, usize> = HashMap::new();
    for id in by_id.keys() {
        in_degree.entry(id.clone()).or_insert(0);
    }
    for (id, scored) in &by_id {
        for dep in scored.atom.depends_on() {
            if by_id.contains_key(dep) {
                dependents.entry(dep.clone()).or_default().push(id.clone());
                *in_degree.entry(id.clone()).or_insert(0) += 1;
            }
        }
    }

    #[derive(PartialEq)]
    struct HeapKey {
        id: String,
        is_mandatory: bool,
        combined: f64,
    }
    impl Eq for HeapKey {}
    impl PartialOrd for HeapKey {
        fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
            Some(self.cmp(other))
        }
    }
    impl Ord for HeapKey {
        fn cmp(&self, other: &Self) -> std::cmp::Ordering {
            self.is_mandatory
                .cmp(&other.is_mandatory)
                .then_with(|| self.combined.partial_cmp(&other.combined).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| other.id.cmp(&self.id)) // reverse so lexicographically-first id wins ties in a max-heap
        }
    }

    let mut heap: BinaryHeap<HeapKey> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(id, _)| {
            let s = &by_id[id];
            HeapKey {
                id: id.clone(),
                is_mandatory: s.is_mandatory,
                combined: s.combined,
            }
        })
        .collect();

    let mut sorted_ids = Vec::with_capacity(by_id.len());
    let mut remaining_in_degree = in_degree.clone();

    while let Some(HeapKey { id, .. }) = heap.pop() {
        sorted_ids.push(id.clone());
        if let Some(deps) = dependents.get(&id) {
            for dependent in deps {
                if let Some(deg) = remaining_in_degree.get_mut(dependent) {
                    *deg -= 1;
                    if *deg == 0 {
                        let s = &by_id[dependent];
                        heap.push(HeapKey {
                            id: dependent.clone(),
                            is_mandatory: s.is_mandatory,
                            combined: s.combined,
                        });
                    }
                }
            }
        }
    }

    if sorted_ids.len() != by_id.len() {
        let cycle = find_shortest_cycle(&by_id, &dependents);
        return Err(Error::DependencyCycle(cycle));
    }

    Ok(sorted_ids
        .into_iter()
        .enumerate()
        .map(|(order, id)| {
            let scored = by_id.get(&id).expect("id came from by_id").clone();
            OrderedAtom {
                atom: scored.atom,
                order,
                score: scored.combined,
                is_mandatory: scored.is_mandatory,
                render_mode: RenderMode::Standard,
            }
        })
        .collect())
}

/// Iterative DFS with parent tracking to find one shortest cycle among the
/// atoms that did not get a finishing position in Kahn's algorithm.
fn find_shortest_cycle(
    by_id: &HashMap<String, ScoredAtom>,
    dependents: &HashMap<String, Vec<String>>,
) -> Vec<String> {
    let mut shortest: Option<Vec<String>> = None;

    for start in by_id.keys() {
        let mut stack: Vec<(String, Vec<String>)> = vec![(start.clone(), vec![start.clone()])];
        let mut visited_paths: HashSet<String> = HashSet::new();

        while let Some((node, path)) = stack.pop() {
            if !visited_paths.insert(node.clone()) && path.len() > 1 {
                continue;
            }
            if let Some(next_nodes) = dependents.get(&node) {
                for next in next_nodes {
                    if next == start && path.len() > 1 {
                        let mut cycle = path.clone();
                        cycle.push(next.clone());
                        if shortest.as_ref().map(|s| cycle.len() < s.len()).unwrap_or(true) {
                            shortest = Some(cycle);
                        }
                        continue;
                    }
                    if !path.contains(next) {
                        let mut next_path = path.clone();
                        next_path.push(next.clone());
                        stack.push((next.clone(), next_path));
                    }
                }
            }
        }
        if shortest.is_some() {
            break;
        }
    }

    shortest.unwrap_or_default()
}

/// Diagnostic helper (§4.3): missing-dependency errors without mutating
/// anything, for callers that want to validate a corpus before compiling.
pub fn validate_dependencies(atoms: &[ScoredAtom]) -> Vec<Error> {
    let ids: HashSet<&str> = atoms.iter().map(|a| a.atom.id()).collect();
    atoms
        .iter()
        .filter_map(|a| {
            let missing: Vec<String> = a
                .atom
                .depends_on()
                .iter()
                .filter(|d| !ids.contains(d.as_str()))
                .cloned()
                .collect();
            if missing.is_empty() {
                None
            } else {
                Some(Error::Configuration(format!(
                    "atom '{}' depends on missing atom(s): {}",
                    a.atom.id(),
                    missing.join(", ")
                )))
            }
        })
        .collect()
}

/// Diagnostic helper (§4.3): the shortest cycle present in `atoms`, or an
/// empty vec if acyclic.
pub fn detect_cycles(atoms: &[ScoredAtom]) -> Vec<String> {
    let by_id: HashMap<String, ScoredAtom> = atoms
        .iter()
        .map(|a| (a.atom.id().to_string(), a.clone()))
        .collect();
    let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
    for (id, scored) in &by_id {
        for dep in scored.atom.depends_on() {
            if by_id.contains_key(dep) {
                dependents.entry(dep.clone()).or_default().push(id.clone());
            }
        }
    }
    find_shortest_cycle(&by_id, &dependents)
}
