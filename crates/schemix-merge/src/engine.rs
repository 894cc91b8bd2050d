//! The merge engine facade.

use tracing::info;

use schemix_types::{
    get_at_path, set_at_path, Conflict, Document, MergeResult, MergeSummary, Tree,
};

use crate::apply::apply_resolutions;
use crate::compat::{check, CompatibilityReport};
use crate::config::MergeConfig;
use crate::decision;
use crate::error::EngineResult;
use crate::orchestrator::{merged_components, SequentialMerger};
use crate::regenerate::regenerate_from_step;
use crate::report::ConflictReport;

/// Entry point for merging document sequences and working with their
/// conflicts.
///
/// ```no_run
/// use schemix_merge::MergeEngine;
/// use schemix_types::Document;
/// use serde_json::json;
///
/// let engine = MergeEngine::default();
/// let docs = vec![
///     Document::detect("v1", json!({"type": "object"})),
///     Document::detect("v2", json!({"type": "object", "title": "User"})),
/// ];
/// let result = engine.merge(&docs, "user");
/// println!("{} conflicts", result.conflicts.len());
/// ```
pub struct MergeEngine {
    merger: SequentialMerger,
}

impl MergeEngine {
    /// Create an engine. Fails if the configuration is invalid.
    pub fn new(config: MergeConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            merger: SequentialMerger::new(config),
        })
    }

    pub fn config(&self) -> &MergeConfig {
        self.merger.config()
    }

    pub fn check_compatibility(&self, documents: &[Document]) -> CompatibilityReport {
        check(documents)
    }

    pub fn merge(&self, documents: &[Document], name: &str) -> MergeResult {
        self.merger.merge(documents, name)
    }

    /// Apply decided conflicts to `base`, returning a new tree.
    pub fn apply_resolutions(
        &self,
        base: &Tree,
        conflicts: &[Conflict],
        path_order: Option<&[String]>,
    ) -> Tree {
        apply_resolutions(base, conflicts, path_order, &self.config().combine)
    }

    /// A copy of `result` whose merged tree has every decision applied.
    pub fn resolve(&self, result: &MergeResult) -> MergeResult {
        let order = result.path_order();
        let merged_tree = self.apply_resolutions(&result.merged_tree, &result.conflicts, Some(&order));
        let summary = MergeSummary::count(
            &result.conflicts,
            result.summary.added,
            merged_components(&merged_tree),
        );
        MergeResult {
            merged_tree,
            summary,
            ..result.clone()
        }
    }

    pub fn regenerate_from_step(
        &self,
        documents: &[Document],
        name: &str,
        previous: &MergeResult,
        from_step: usize,
    ) -> MergeResult {
        regenerate_from_step(&self.merger, documents, name, previous, from_step)
    }

    /// Copy decisions from a report onto the unresolved conflicts of
    /// `result` with matching signatures.
    pub fn import_decisions(&self, result: &MergeResult, report: &ConflictReport) -> MergeResult {
        let mut next = result.clone();
        let restored = decision::restore(&mut next.conflicts, &report.decisions());
        info!(restored, "imported decisions");
        next.summary = MergeSummary::count(
            &next.conflicts,
            result.summary.added,
            result.summary.merged_components,
        );
        next
    }

    pub fn get_value(tree: &Tree, path: &str) -> Option<Tree> {
        get_at_path(tree, path).cloned()
    }

    /// A copy of `tree` with `value` set at `path`, creating intermediate
    /// containers as needed.
    pub fn set_value(tree: &Tree, path: &str, value: Tree) -> EngineResult<Tree> {
        let mut next = tree.clone();
        set_at_path(&mut next, path, value)?;
        Ok(next)
    }
}

impl Default for MergeEngine {
    fn default() -> Self {
        Self {
            merger: SequentialMerger::default(),
        }
    }
}
