use schemix_types::{ConflictKind, Tree};
use serde_json::Value;

use crate::keywords;
use crate::phase::{show, DetectionContext, DetectionPhase, Phase, TreePair};
use crate::refs::RefGraph;
use crate::walk::Visit;

/// Phase 2: `$ref` and `$dynamicRef` changes, broken references, and new
/// reference cycles.
pub struct ReferencePhase;

impl DetectionPhase for ReferencePhase {
    fn phase(&self) -> Phase {
        Phase::References
    }

    fn run(&self, pair: &TreePair<'_>, ctx: &mut DetectionContext) {
        let before = ctx.base_refs.cyclic_refs();
        let after = ctx.incoming_refs.cyclic_refs();
        for path in after.difference(&before) {
            let Some(edge) = ctx.incoming_refs.get(path).cloned() else {
                continue;
            };
            let current = ctx.base_refs.get(path).map(|e| Value::String(e.reference.clone()));
            let incoming = Value::String(edge.reference.clone());
            ctx.report(
                path,
                ConflictKind::RefCycleIntroduced,
                current.as_ref(),
                Some(&incoming),
                format!("reference {} closes a cycle", edge.reference),
            );
        }

        pair.walk(ctx, |node, ctx| {
            let Some(keyword) = node.keyword() else {
                return Visit::Descend;
            };
            match keyword {
                "$dynamicRef" | "$recursiveRef" if node.shared_parent => {
                    ctx.report(
                        &node.path,
                        ConflictKind::DynamicRefChanged,
                        node.base,
                        node.incoming,
                        format!(
                            "{keyword} changed from {} to {}",
                            show(node.base),
                            show(node.incoming)
                        ),
                    );
                    Visit::Skip
                }
                "$ref" => {
                    classify_ref(pair, ctx, &node.path, node.base, node.incoming, node.shared_parent);
                    Visit::Skip
                }
                _ => Visit::Descend,
            }
        });
    }
}

fn classify_ref(
    pair: &TreePair<'_>,
    ctx: &mut DetectionContext,
    path: &str,
    base: Option<&Tree>,
    incoming: Option<&Tree>,
    shared_parent: bool,
) {
    let broken = ctx
        .incoming_refs
        .get(path)
        .is_some_and(|edge| RefGraph::is_broken(edge, pair.incoming));

    let (kind, description) = match (base, incoming) {
        (_, Some(target)) if broken => (
            ConflictKind::RefBroken,
            format!("reference {} does not resolve", show(Some(target))),
        ),
        _ if !shared_parent => return,
        (Some(_), Some(_)) => (
            ConflictKind::RefTargetChanged,
            format!("reference retargeted from {} to {}", show(base), show(incoming)),
        ),
        (None, Some(_)) => (
            ConflictKind::RefAdded,
            format!("inline schema replaced by reference {}", show(incoming)),
        ),
        (Some(_), None) => {
            let (_, holder) = pair.parent(path);
            let inline = holder
                .and_then(Value::as_object)
                .is_some_and(|map| map.keys().any(|k| !keywords::is_annotation(k)));
            if inline {
                (
                    ConflictKind::RefReplacedInline,
                    format!("reference {} replaced by an inline schema", show(base)),
                )
            } else {
                (
                    ConflictKind::RefRemoved,
                    format!("reference {} was removed", show(base)),
                )
            }
        }
        (None, None) => return,
    };
    ctx.report(path, kind, base, incoming, description);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phases::testing::{paths, run_phase};
    use serde_json::json;

    fn defs() -> Tree {
        json!({"A": {"type": "string"}, "B": {"type": "integer"}})
    }

    #[test]
    fn retarget() {
        let base = json!({"$defs": defs(), "properties": {"x": {"$ref": "#/$defs/A"}}});
        let incoming = json!({"$defs": defs(), "properties": {"x": {"$ref": "#/$defs/B"}}});
        let conflicts = run_phase(&ReferencePhase, &base, &incoming);
        assert_eq!(paths(&conflicts), vec!["/properties/x/$ref"]);
        assert_eq!(conflicts[0].kind, ConflictKind::RefTargetChanged);
    }

    #[test]
    fn broken_target() {
        let base = json!({"$defs": defs(), "properties": {"x": {"$ref": "#/$defs/A"}}});
        let incoming = json!({"$defs": defs(), "properties": {"x": {"$ref": "#/$defs/Gone"}}});
        let conflicts = run_phase(&ReferencePhase, &base, &incoming);
        assert_eq!(conflicts[0].kind, ConflictKind::RefBroken);
    }

    #[test]
    fn ref_swapped_for_inline() {
        let base = json!({"$defs": defs(), "properties": {"x": {"$ref": "#/$defs/A"}}});
        let incoming = json!({"$defs": defs(), "properties": {"x": {"type": "string"}}});
        let conflicts = run_phase(&ReferencePhase, &base, &incoming);
        assert_eq!(conflicts[0].kind, ConflictKind::RefReplacedInline);

        let incoming = json!({"$defs": defs(), "properties": {"x": {"description": "any"}}});
        let conflicts = run_phase(&ReferencePhase, &base, &incoming);
        assert_eq!(conflicts[0].kind, ConflictKind::RefRemoved);
    }

    #[test]
    fn ref_added() {
        let base = json!({"$defs": defs(), "properties": {"x": {}}});
        let incoming = json!({"$defs": defs(), "properties": {"x": {"$ref": "#/$defs/A"}}});
        let conflicts = run_phase(&ReferencePhase, &base, &incoming);
        assert_eq!(conflicts[0].kind, ConflictKind::RefAdded);
    }

    #[test]
    fn refs_in_new_subtrees_only_flag_when_broken() {
        let base = json!({"$defs": defs()});
        let incoming = json!({"$defs": defs(), "properties": {
            "ok": {"$ref": "#/$defs/A"},
            "bad": {"$ref": "#/$defs/Nope"}
        }});
        let conflicts = run_phase(&ReferencePhase, &base, &incoming);
        assert_eq!(paths(&conflicts), vec!["/properties/bad/$ref"]);
    }

    #[test]
    fn remote_refs_are_not_validated() {
        let base = json!({"properties": {"x": {"$ref": "a.json#/A"}}});
        let incoming = json!({"properties": {"x": {"$ref": "b.json#/A"}}});
        let conflicts = run_phase(&ReferencePhase, &base, &incoming);
        assert_eq!(conflicts[0].kind, ConflictKind::RefTargetChanged);
    }

    #[test]
    fn new_cycle_is_reported() {
        let base = json!({"$defs": {"Node": {"properties": {"next": {"type": "string"}}}}});
        let incoming = json!({"$defs": {"Node": {"properties": {"next": {"$ref": "#/$defs/Node"}}}}});
        let conflicts = run_phase(&ReferencePhase, &base, &incoming);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::RefCycleIntroduced);
        assert_eq!(conflicts[0].path, "/$defs/Node/properties/next/$ref");
    }

    #[test]
    fn dynamic_ref_change() {
        let base = json!({"items": {"$dynamicRef": "#a"}});
        let incoming = json!({"items": {"$dynamicRef": "#b"}});
        let conflicts = run_phase(&ReferencePhase, &base, &incoming);
        assert_eq!(conflicts[0].kind, ConflictKind::DynamicRefChanged);
    }
}
