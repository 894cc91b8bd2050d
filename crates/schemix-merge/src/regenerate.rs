//! Regeneration: recompute a merge from one step onward after a decision
//! changed, preserving every decision that still applies.

use tracing::{debug, info, warn};

use schemix_diff::normalize_nullable;
use schemix_types::{Conflict, Document, MergeResult, MergeStep};

use crate::apply::apply_resolutions;
use crate::compat::check;
use crate::decision::{self, DecisionMap};
use crate::orchestrator::{failed_step, finish, incompatible, SequentialMerger};

/// Recompute `previous` from `from_step` onward.
///
/// Conflicts before `from_step` are kept verbatim. The accumulated tree is
/// rebuilt up to `from_step - 1` with the kept decisions applied, then every
/// later step is re-detected against it. Decisions recorded on later steps
/// are restored onto new conflicts with the same signature; conflicts that no
/// longer occur lose theirs. Decided conflicts are applied before each next
/// step, so later steps see the effect of earlier decisions.
///
/// An out-of-range `from_step` is clamped into `1..N-1` with a warning.
pub fn regenerate_from_step(
    merger: &SequentialMerger,
    documents: &[Document],
    name: &str,
    previous: &MergeResult,
    from_step: usize,
) -> MergeResult {
    let report = check(documents);
    if !report.compatible {
        let reason = report.reason.unwrap_or_else(|| "documents are incompatible".into());
        return incompatible(documents, name, reason);
    }

    let last = documents.len() - 1;
    let mut warnings = Vec::new();
    let from = from_step.clamp(1, last);
    if from != from_step {
        let warning = format!("regeneration step {from_step} is out of range, using {from}");
        warn!(requested = from_step, used = from, "clamped regeneration step");
        warnings.push(warning);
    }

    let kept: Vec<Conflict> = previous
        .conflicts
        .iter()
        .filter(|c| c.step_number < from)
        .cloned()
        .collect();
    let saved: DecisionMap =
        decision::collect(previous.conflicts.iter().filter(|c| c.step_number >= from));

    let options = &merger.config().combine;
    let mut acc = normalize_nullable(&documents[0].content);
    let mut conflicts = Vec::new();
    let mut steps: Vec<MergeStep> = Vec::new();
    let mut added = 0;

    for step in 1..=last {
        let out = match merger.fold_step(&acc, documents, step) {
            Ok(out) => out,
            Err(e) => {
                let (conflict, record, warning) = failed_step(documents, step, &e);
                if step < from {
                    conflicts.extend(kept.iter().filter(|c| c.step_number == step).cloned());
                } else {
                    conflicts.push(conflict);
                }
                steps.push(record);
                warnings.push(warning);
                continue;
            }
        };
        added += out.added;

        let step_conflicts = if step < from {
            let mine: Vec<Conflict> = kept
                .iter()
                .filter(|c| c.step_number == step)
                .cloned()
                .collect();
            steps.push(MergeStep {
                conflict_count: mine.len(),
                ..out.step
            });
            mine
        } else {
            let mut fresh = out.conflicts;
            let restored = decision::restore(&mut fresh, &saved);
            debug!(step, restored, "restored decisions");
            steps.push(out.step);
            fresh
        };

        acc = apply_resolutions(&out.tree, &step_conflicts, None, options);
        conflicts.extend(step_conflicts);
    }

    // Kept conflicts at step 0 (an earlier gate failure) have no step to
    // attach to above.
    conflicts.extend(kept.into_iter().filter(|c| c.step_number == 0));

    info!(from, steps = steps.len(), conflicts = conflicts.len(), "regeneration complete");
    finish(name, acc, conflicts, steps, warnings, added)
}
