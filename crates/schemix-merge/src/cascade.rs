//! Propagation of decisions along linked conflicts.

use std::collections::{BTreeMap, VecDeque};

use tracing::debug;

use schemix_types::{Conflict, Resolution};

/// Conflicts with cascaded decisions filled in.
#[derive(Clone, Debug)]
pub struct Cascade {
    pub conflicts: Vec<Conflict>,
    /// Index of each cascaded conflict mapped to the index of its source.
    pub sources: BTreeMap<usize, usize>,
}

impl Cascade {
    /// The source index a conflict received its decision from, if any.
    pub fn source_of(&self, index: usize) -> Option<usize> {
        self.sources.get(&index).copied()
    }
}

fn is_target(conflict: &Conflict) -> bool {
    matches!(
        conflict.resolution,
        Resolution::Unresolved | Resolution::Combine
    )
}

/// Propagate `Current`, `Incoming`, and `Combine` decisions to every
/// transitively linked conflict that is unresolved or combined.
///
/// Links are followed within a step only. Targets are chosen against the
/// input decisions, so the result does not depend on iteration order except
/// that the first source in slice order wins a contested target.
pub fn cascade(conflicts: &[Conflict]) -> Cascade {
    let mut by_path: BTreeMap<(usize, &str), Vec<usize>> = BTreeMap::new();
    for (i, c) in conflicts.iter().enumerate() {
        by_path.entry((c.step_number, c.path.as_str())).or_default().push(i);
    }

    let mut out = conflicts.to_vec();
    let mut sources = BTreeMap::new();

    for (source, conflict) in conflicts.iter().enumerate() {
        if !conflict.resolution.cascades() {
            continue;
        }
        let mut seen = vec![false; conflicts.len()];
        seen[source] = true;
        let mut queue = VecDeque::from([source]);
        while let Some(at) = queue.pop_front() {
            let step = conflicts[at].step_number;
            for link in &conflicts[at].linked_conflict_paths {
                let Some(targets) = by_path.get(&(step, link.as_str())) else {
                    continue;
                };
                for &t in targets {
                    if seen[t] {
                        continue;
                    }
                    seen[t] = true;
                    queue.push_back(t);
                    if !is_target(&conflicts[t]) || sources.contains_key(&t) {
                        continue;
                    }
                    if conflicts[t].resolution == conflict.resolution {
                        continue;
                    }
                    out[t].resolve(conflict.resolution, None);
                    sources.insert(t, source);
                    debug!(
                        from = %conflict.path,
                        to = %conflicts[t].path,
                        resolution = %conflict.resolution,
                        "cascaded resolution"
                    );
                }
            }
        }
    }

    Cascade {
        conflicts: out,
        sources,
    }
}
