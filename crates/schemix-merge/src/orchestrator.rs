//! The sequential merge: fold `D1..DN` into one accumulated tree.

use serde_json::Value;
use tracing::{info, warn};

use schemix_diff::{apply_patch, diff_trees, normalize_nullable, ConflictDetector};
use schemix_types::{
    get_at_path, Conflict, Document, MergeResult, MergeStep, MergeSummary, Tree,
};

use crate::compat::check;
use crate::config::MergeConfig;
use crate::error::{EngineResult, MergeError};

/// Paths whose object members count as named schemas.
const COMPONENT_ROOTS: &[&str] = &["/$defs", "/definitions", "/components/schemas"];

/// The outcome of folding one document into the accumulated tree.
#[derive(Clone, Debug)]
pub(crate) struct StepOutput {
    pub tree: Tree,
    pub conflicts: Vec<Conflict>,
    pub step: MergeStep,
    pub added: usize,
}

/// Runs pairwise detection and structural patching over a document sequence.
pub struct SequentialMerger {
    config: MergeConfig,
    detector: ConflictDetector,
}

impl SequentialMerger {
    pub fn new(config: MergeConfig) -> Self {
        let detector =
            ConflictDetector::with_default_phases().with_array_expansion(config.link_array_items);
        Self { config, detector }
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Merge `documents` in order.
    ///
    /// Never fails: an incompatible sequence yields one critical conflict and
    /// `is_compatible == false`; a failing step is recorded as a critical
    /// conflict at that step and the fold continues with the next document.
    pub fn merge(&self, documents: &[Document], name: &str) -> MergeResult {
        let report = check(documents);
        if !report.compatible {
            let reason = report.reason.unwrap_or_else(|| "documents are incompatible".into());
            return incompatible(documents, name, reason);
        }

        let mut acc = normalize_nullable(&documents[0].content);
        let mut conflicts = Vec::new();
        let mut steps = Vec::new();
        let mut warnings = Vec::new();
        let mut added = 0;

        for step in 1..documents.len() {
            match self.fold_step(&acc, documents, step) {
                Ok(out) => {
                    acc = out.tree;
                    added += out.added;
                    conflicts.extend(out.conflicts);
                    steps.push(out.step);
                }
                Err(e) => {
                    let (conflict, record, warning) = failed_step(documents, step, &e);
                    conflicts.push(conflict);
                    steps.push(record);
                    warnings.push(warning);
                }
            }
        }

        finish(name, acc, conflicts, steps, warnings, added)
    }

    /// Fold `documents[step]` into `acc`.
    pub(crate) fn fold_step(
        &self,
        acc: &Tree,
        documents: &[Document],
        step: usize,
    ) -> EngineResult<StepOutput> {
        let doc = documents.get(step).ok_or_else(|| MergeError::InvalidStep {
            step,
            reason: format!("only {} documents", documents.len()),
        })?;
        let from = step
            .checked_sub(1)
            .and_then(|i| documents.get(i))
            .ok_or_else(|| MergeError::InvalidStep {
                step,
                reason: "step 0 is the starting document".into(),
            })?;

        let incoming = normalize_nullable(&doc.content);
        let conflicts = self.detector.detect(acc, &incoming, step);
        let patch = diff_trees(acc, &incoming);
        let tree = apply_patch(acc, &patch, self.config.apply_removals)
            .map_err(|source| MergeError::Patch { step, source })?;

        info!(
            step,
            from = %from.name,
            to = %doc.name,
            patch_ops = patch.len(),
            conflicts = conflicts.len(),
            "merge step complete"
        );

        Ok(StepOutput {
            step: MergeStep {
                step_number: step,
                from_document: from.name.clone(),
                to_document: doc.name.clone(),
                patch_count: patch.len(),
                conflict_count: conflicts.len(),
            },
            added: patch.additions(),
            conflicts,
            tree,
        })
    }
}

impl Default for SequentialMerger {
    fn default() -> Self {
        Self::new(MergeConfig::default())
    }
}

/// The result returned when the compatibility gate fails.
pub(crate) fn incompatible(documents: &[Document], name: &str, reason: String) -> MergeResult {
    warn!(%reason, "documents are not compatible");
    let merged_tree = documents
        .first()
        .map(|d| d.content.clone())
        .unwrap_or_else(|| Value::Object(Default::default()));
    let conflicts = vec![Conflict::incompatible(0, reason.clone())];
    MergeResult {
        name: name.to_string(),
        summary: MergeSummary::count(&conflicts, 0, 0),
        merged_tree,
        conflicts,
        is_compatible: false,
        warnings: vec![reason],
        steps: Vec::new(),
    }
}

/// The records for a step that could not be folded.
pub(crate) fn failed_step(
    documents: &[Document],
    step: usize,
    error: &MergeError,
) -> (Conflict, MergeStep, String) {
    let warning = format!("step {step} failed: {error}");
    warn!(step, %error, "merge step failed");
    let name_at = |i: usize| documents.get(i).map(|d| d.name.clone()).unwrap_or_default();
    let record = MergeStep {
        step_number: step,
        from_document: name_at(step.saturating_sub(1)),
        to_document: name_at(step),
        patch_count: 0,
        conflict_count: 1,
    };
    (Conflict::incompatible(step, warning.clone()), record, warning)
}

/// Sort, count, and package a merge result.
pub(crate) fn finish(
    name: &str,
    merged_tree: Tree,
    mut conflicts: Vec<Conflict>,
    steps: Vec<MergeStep>,
    warnings: Vec<String>,
    added: usize,
) -> MergeResult {
    MergeResult::sort_conflicts(&mut conflicts);
    let summary = MergeSummary::count(&conflicts, added, merged_components(&merged_tree));
    MergeResult {
        name: name.to_string(),
        merged_tree,
        conflicts,
        is_compatible: true,
        warnings,
        summary,
        steps,
    }
}

/// Count named schemas under the definition containers of a tree.
pub fn merged_components(tree: &Tree) -> usize {
    COMPONENT_ROOTS
        .iter()
        .filter_map(|root| get_at_path(tree, root).and_then(Value::as_object))
        .map(|map| map.len())
        .sum()
}
