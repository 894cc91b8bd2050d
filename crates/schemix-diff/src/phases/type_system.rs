use std::collections::BTreeSet;

use schemix_types::{join_key, parent_path, ConflictKind, Tree};
use serde_json::Value;

use crate::keywords;
use crate::phase::{show, DetectionContext, DetectionPhase, Phase, TreePair};
use crate::walk::{Container, Visit, WalkNode};

/// Phase 8: the `type` keyword, raw `nullable`, and container kind changes.
///
/// A type conflict also claims the type-specific constraint keywords next
/// to it; under a new type their old values are not comparable.
pub struct TypePhase;

impl DetectionPhase for TypePhase {
    fn phase(&self) -> Phase {
        Phase::Types
    }

    fn run(&self, pair: &TreePair<'_>, ctx: &mut DetectionContext) {
        pair.walk(ctx, |node, ctx| {
            match node.changed_keyword() {
                Some("type") => {
                    if let Some((kind, description)) = classify_type(node.base, node.incoming) {
                        ctx.report(&node.path, kind, node.base, node.incoming, description);
                        claim_constraints(ctx, &node.path);
                    }
                    return Visit::Skip;
                }
                Some("nullable") => {
                    let was = node.base.and_then(Value::as_bool).unwrap_or(false);
                    let is = node.incoming.and_then(Value::as_bool).unwrap_or(false);
                    if was != is {
                        let (kind, word) = if is {
                            (ConflictKind::NullableAdded, "nullable")
                        } else {
                            (ConflictKind::NullableRemoved, "non-nullable")
                        };
                        ctx.report(&node.path, kind, node.base, node.incoming, format!("schema became {word}"));
                    }
                    return Visit::Skip;
                }
                _ => {}
            }
            if structure_changed(node) {
                ctx.report(
                    &node.path,
                    ConflictKind::TypeStructureChanged,
                    node.base,
                    node.incoming,
                    format!(
                        "value changed from {} to {}",
                        kind_name(node.base),
                        kind_name(node.incoming)
                    ),
                );
                return Visit::Skip;
            }
            Visit::Descend
        });
    }
}

fn claim_constraints(ctx: &mut DetectionContext, type_path: &str) {
    let Some(parent) = parent_path(type_path) else {
        return;
    };
    for keyword in keywords::CONSTRAINTS {
        ctx.claim(join_key(&parent, keyword));
    }
}

fn type_set(value: &Tree) -> Option<BTreeSet<&str>> {
    match value {
        Value::String(s) => Some(BTreeSet::from([s.as_str()])),
        Value::Array(items) => items.iter().map(Value::as_str).collect(),
        _ => None,
    }
}

/// Classify a change of the `type` keyword. Reordering a type list is not a
/// change.
fn classify_type(base: Option<&Tree>, incoming: Option<&Tree>) -> Option<(ConflictKind, String)> {
    let describe = |verb: &str| format!("type {verb} from {} to {}", show(base), show(incoming));
    let (old, new) = match (base, incoming) {
        (None, Some(_)) => return Some((ConflictKind::TypeAdded, format!("type {} was added", show(incoming)))),
        (Some(_), None) => return Some((ConflictKind::TypeRemoved, format!("type {} was removed", show(base)))),
        (Some(old), Some(new)) => (old, new),
        (None, None) => return None,
    };
    let (Some(old_set), Some(new_set)) = (type_set(old), type_set(new)) else {
        return Some((ConflictKind::TypeChanged, describe("changed")));
    };
    if old_set == new_set {
        return None;
    }

    let kind = match (old, new) {
        (Value::String(_), Value::String(_)) => ConflictKind::TypeChanged,
        (Value::String(_), Value::Array(_)) if new_set.is_superset(&old_set) => ConflictKind::TypeExpanded,
        (Value::Array(_), Value::String(_)) if new_set.is_subset(&old_set) => ConflictKind::TypeCollapsed,
        (Value::Array(_), Value::Array(_)) if is_null_only_delta(&old_set, &new_set) => {
            if new_set.contains("null") {
                ConflictKind::NullableAdded
            } else {
                ConflictKind::NullableRemoved
            }
        }
        (Value::Array(_), Value::Array(_)) if new_set.is_superset(&old_set) => ConflictKind::TypeExpanded,
        (Value::Array(_), Value::Array(_)) if new_set.is_subset(&old_set) => ConflictKind::TypeCollapsed,
        _ => ConflictKind::TypeChanged,
    };
    let verb = match kind {
        ConflictKind::TypeExpanded => "expanded",
        ConflictKind::TypeCollapsed => "collapsed",
        ConflictKind::NullableAdded => "became nullable",
        ConflictKind::NullableRemoved => "lost null",
        _ => "changed",
    };
    Some((kind, describe(verb)))
}

/// The two lists differ only by `"null"`.
fn is_null_only_delta(old: &BTreeSet<&str>, new: &BTreeSet<&str>) -> bool {
    let delta: Vec<&&str> = old.symmetric_difference(new).collect();
    delta.len() == 1 && *delta[0] == "null"
}

fn is_container(value: &Tree) -> bool {
    value.is_object() || value.is_array()
}

/// A node switching between object, array, and scalar form. Annotation and
/// constraint values are data, not structure.
fn structure_changed(node: &WalkNode<'_>) -> bool {
    let (Some(old), Some(new)) = (node.base, node.incoming) else {
        return false;
    };
    if let Some(keyword) = node.keyword() {
        if keywords::is_annotation(keyword) || keywords::CONSTRAINTS.contains(&keyword) {
            return false;
        }
    }
    if node.container == Container::Array && !(old.is_object() && new.is_object()) {
        return false;
    }
    match (old, new) {
        (Value::Object(_), Value::Object(_)) | (Value::Array(_), Value::Array(_)) => false,
        _ => is_container(old) || is_container(new),
    }
}

fn kind_name(value: Option<&Tree>) -> &'static str {
    match value {
        None => "absent",
        Some(Value::Null) => "null",
        Some(Value::Bool(_)) => "boolean",
        Some(Value::Number(_)) => "number",
        Some(Value::String(_)) => "string",
        Some(Value::Array(_)) => "array",
        Some(Value::Object(_)) => "object",
    }
}
