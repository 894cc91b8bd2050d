use schemix_types::{is_ancestor, ConflictKind};
use serde_json::Value;

use crate::phase::{DetectionContext, DetectionPhase, Phase, TreePair};
use crate::refs::RefGraph;

/// Phase 12: references that stopped resolving because of changes
/// reported elsewhere, typically a renamed or removed definition.
///
/// References that were already broken before the merge are not reported.
pub struct RevalidationPhase;

impl DetectionPhase for RevalidationPhase {
    fn phase(&self) -> Phase {
        Phase::Revalidation
    }

    fn run(&self, pair: &TreePair<'_>, ctx: &mut DetectionContext) {
        let edges = ctx.incoming_refs.edges().to_vec();
        for edge in edges {
            if ctx.is_claimed(&edge.path) || !RefGraph::is_broken(&edge, pair.incoming) {
                continue;
            }
            let broken_before = ctx
                .base_refs
                .get(&edge.path)
                .is_some_and(|old| old.reference == edge.reference && RefGraph::is_broken(old, pair.base));
            if broken_before {
                continue;
            }

            let target = edge.target.clone().unwrap_or_default();
            let renamed_to = ctx
                .definition_renames
                .iter()
                .chain(ctx.property_renames.iter())
                .find(|(old, _)| **old == target || is_ancestor(old, &target))
                .map(|(_, new)| new.clone());
            let description = match renamed_to {
                Some(new) => format!("reference {} points at a name that moved to {new}", edge.reference),
                None => format!("reference {} no longer resolves", edge.reference),
            };
            let reference = Value::String(edge.reference.clone());
            ctx.report(&edge.path, ConflictKind::RefBroken, Some(&reference), Some(&reference), description);
        }
    }
}
