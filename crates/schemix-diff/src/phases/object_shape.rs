use schemix_types::{ConflictKind, Tree};
use serde_json::Value;

use crate::phase::{show, DetectionContext, DetectionPhase, Phase, TreePair};
use crate::walk::Visit;

/// Phase 5: how open an object schema is to properties it does not name.
pub struct ObjectShapePhase;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Openness {
    Open,
    Schema,
    Closed,
}

fn openness(value: Option<&Tree>) -> Openness {
    match value {
        None | Some(Value::Bool(true)) => Openness::Open,
        Some(Value::Bool(false)) => Openness::Closed,
        Some(_) => Openness::Schema,
    }
}

impl DetectionPhase for ObjectShapePhase {
    fn phase(&self) -> Phase {
        Phase::ObjectShape
    }

    fn run(&self, pair: &TreePair<'_>, ctx: &mut DetectionContext) {
        pair.walk(ctx, |node, ctx| {
            let Some(keyword) = node.changed_keyword() else {
                return Visit::Descend;
            };
            let both_objects = node.base.is_some_and(Value::is_object) && node.incoming.is_some_and(Value::is_object);
            let changed = format!("{keyword} changed from {} to {}", show(node.base), show(node.incoming));

            let (kind, description) = match keyword {
                "additionalProperties" => {
                    let kind = match (openness(node.base), openness(node.incoming)) {
                        (Openness::Schema, Openness::Schema) => return Visit::Descend,
                        (before, after) if before == after => return Visit::Skip,
                        (Openness::Open, _) | (Openness::Schema, Openness::Closed) => {
                            ConflictKind::AdditionalPropertiesRestricted
                        }
                        (_, Openness::Open) | (Openness::Closed, Openness::Schema) => {
                            ConflictKind::AdditionalPropertiesRelaxed
                        }
                        _ => ConflictKind::AdditionalPropertiesChanged,
                    };
                    (kind, changed)
                }
                "patternProperties" => match (node.base, node.incoming) {
                    (None, Some(_)) => (ConflictKind::PatternPropertiesAdded, format!("{keyword} was added")),
                    (Some(_), None) => (ConflictKind::PatternPropertiesRemoved, format!("{keyword} was removed")),
                    (Some(Value::Object(old)), Some(Value::Object(new)))
                        if old.keys().eq(new.keys()) =>
                    {
                        return Visit::Descend
                    }
                    _ => (ConflictKind::PatternPropertiesChanged, changed),
                },
                "propertyNames" if !both_objects => (ConflictKind::PropertyNamesChanged, changed),
                "unevaluatedProperties" if !both_objects => {
                    (ConflictKind::UnevaluatedPropertiesChanged, changed)
                }
                "dependentSchemas" | "dependencies" => match (node.base, node.incoming) {
                    (Some(Value::Object(old)), Some(Value::Object(new)))
                        if old.keys().eq(new.keys()) =>
                    {
                        return Visit::Descend
                    }
                    _ => (ConflictKind::DependentSchemasChanged, changed),
                },
                "dependentRequired" => (ConflictKind::DependentRequiredChanged, changed),
                "minProperties" => (ConflictKind::MinPropertiesChanged, changed),
                "maxProperties" => (ConflictKind::MaxPropertiesChanged, changed),
                _ => return Visit::Descend,
            };
            ctx.report(&node.path, kind, node.base, node.incoming, description);
            Visit::Skip
        });
    }
}
