use serde::{Deserialize, Serialize};

use crate::conflict::{Conflict, Resolution};
use crate::document::Tree;
use crate::path::compare_paths;

/// One pairwise fold of an additional document into the accumulated tree.
///
/// Step numbers run `1..N-1` for `N` documents. Steps are never edited; a
/// regeneration replaces them wholesale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeStep {
    pub step_number: usize,
    pub from_document: String,
    pub to_document: String,
    pub patch_count: usize,
    pub conflict_count: usize,
}

/// Counters reported alongside a merge result.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeSummary {
    /// Additions introduced by the structural patches of all steps.
    pub added: usize,
    /// Named schemas in the merged tree.
    pub merged_components: usize,
    pub total: usize,
    pub resolved: usize,
    pub unresolved: usize,
}

impl MergeSummary {
    /// Build a summary; `total`, `resolved`, and `unresolved` are counted
    /// from `conflicts`.
    pub fn count(conflicts: &[Conflict], added: usize, merged_components: usize) -> Self {
        let resolved = conflicts.iter().filter(|c| c.is_resolved()).count();
        Self {
            added,
            merged_components,
            total: conflicts.len(),
            resolved,
            unresolved: conflicts.len() - resolved,
        }
    }
}

/// The output of a merge or regeneration.
///
/// A result is superseded, not edited: methods that change decisions return
/// a new value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResult {
    pub name: String,
    pub merged_tree: Tree,
    pub conflicts: Vec<Conflict>,
    pub is_compatible: bool,
    pub warnings: Vec<String>,
    pub summary: MergeSummary,
    pub steps: Vec<MergeStep>,
}

impl MergeResult {
    /// Sort conflicts by path depth, then segment order, then step.
    pub fn sort_conflicts(conflicts: &mut [Conflict]) {
        conflicts.sort_by(|a, b| {
            compare_paths(&a.path, &b.path)
                .then_with(|| a.step_number.cmp(&b.step_number))
                .then_with(|| a.kind.cmp(&b.kind))
        });
    }

    /// Conflicts recorded for one step.
    pub fn conflicts_at_step(&self, step_number: usize) -> impl Iterator<Item = &Conflict> {
        self.conflicts
            .iter()
            .filter(move |c| c.step_number == step_number)
    }

    /// Conflicts still awaiting a decision.
    pub fn unresolved(&self) -> impl Iterator<Item = &Conflict> {
        self.conflicts.iter().filter(|c| !c.is_resolved())
    }

    /// Conflict paths in their current order, for use as a default
    /// application order.
    pub fn path_order(&self) -> Vec<String> {
        self.conflicts.iter().map(|c| c.path.clone()).collect()
    }

    /// A copy of this result with one conflict's decision replaced and the
    /// summary recounted. Out-of-range indices return an unchanged copy.
    pub fn with_decision(&self, index: usize, resolution: Resolution, custom: Option<Tree>) -> Self {
        let mut next = self.clone();
        if let Some(conflict) = next.conflicts.get_mut(index) {
            conflict.resolve(resolution, custom);
        }
        next.summary = MergeSummary::count(
            &next.conflicts,
            self.summary.added,
            self.summary.merged_components,
        );
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::ConflictKind;
    use serde_json::json;

    fn conflict(path: &str, step: usize) -> Conflict {
        Conflict::new(path, ConflictKind::ValueChanged, None, None, step, path)
    }

    fn result(conflicts: Vec<Conflict>) -> MergeResult {
        let summary = MergeSummary::count(&conflicts, 0, 0);
        MergeResult {
            name: "merged".into(),
            merged_tree: json!({}),
            conflicts,
            is_compatible: true,
            warnings: Vec::new(),
            summary,
            steps: Vec::new(),
        }
    }

    #[test]
    fn sort_puts_parents_first() {
        let mut conflicts = vec![
            conflict("/a/b", 1),
            conflict("/list[10]", 1),
            conflict("/a", 2),
            conflict("/list[2]", 1),
            conflict("/a", 1),
        ];
        MergeResult::sort_conflicts(&mut conflicts);
        let order: Vec<_> = conflicts
            .iter()
            .map(|c| (c.path.as_str(), c.step_number))
            .collect();
        assert_eq!(
            order,
            vec![
                ("/a", 1),
                ("/a", 2),
                ("/a/b", 1),
                ("/list[2]", 1),
                ("/list[10]", 1)
            ]
        );
    }

    #[test]
    fn summary_counts_decisions() {
        let mut conflicts = vec![conflict("/a", 1), conflict("/b", 1), conflict("/c", 1)];
        conflicts[1].resolve(Resolution::Current, None);
        let summary = MergeSummary::count(&conflicts, 4, 2);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.resolved, 1);
        assert_eq!(summary.unresolved, 2);
        assert_eq!(summary.added, 4);
        assert_eq!(summary.merged_components, 2);
    }

    #[test]
    fn with_decision_supersedes() {
        let original = result(vec![conflict("/a", 1), conflict("/b", 1)]);
        let next = original.with_decision(1, Resolution::Incoming, None);
        assert_eq!(original.summary.resolved, 0);
        assert_eq!(next.summary.resolved, 1);
        assert_eq!(next.conflicts[1].resolution, Resolution::Incoming);
        assert_eq!(next.unresolved().count(), 1);
    }

    #[test]
    fn step_filter() {
        let r = result(vec![conflict("/a", 1), conflict("/b", 2), conflict("/c", 2)]);
        assert_eq!(r.conflicts_at_step(2).count(), 2);
        assert_eq!(r.path_order(), vec!["/a", "/b", "/c"]);
    }
}
