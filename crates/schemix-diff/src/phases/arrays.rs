use schemix_types::{ConflictKind, Tree};
use serde_json::Value;

use crate::keywords;
use crate::phase::{show, DetectionContext, DetectionPhase, Phase, TreePair};
use crate::walk::{Container, Visit, WalkNode};

/// Phase 7: array keywords, and plain data arrays outside any keyword.
///
/// Data arrays claim only their own path so that object elements can still
/// be examined by later phases.
pub struct ArrayPhase;

impl DetectionPhase for ArrayPhase {
    fn phase(&self) -> Phase {
        Phase::Arrays
    }

    fn run(&self, pair: &TreePair<'_>, ctx: &mut DetectionContext) {
        pair.walk(ctx, |node, ctx| {
            if let Some(keyword) = node.changed_keyword() {
                if keywords::ARRAY.contains(&keyword) {
                    return array_keyword(ctx, node, keyword);
                }
            }
            if is_data_array(node) {
                data_array(ctx, node);
            }
            Visit::Descend
        });
    }
}

fn array_keyword(ctx: &mut DetectionContext, node: &WalkNode<'_>, keyword: &str) -> Visit {
    let changed = format!("{keyword} changed from {} to {}", show(node.base), show(node.incoming));
    let (kind, description) = match keyword {
        "items" => match (node.base, node.incoming) {
            (None, Some(_)) => (ConflictKind::ItemsAdded, format!("{keyword} was added")),
            (Some(_), None) => (ConflictKind::ItemsRemoved, format!("{keyword} was removed")),
            (Some(old), Some(new)) if descendable(old, new) => return Visit::Descend,
            _ => (ConflictKind::ItemsChanged, changed),
        },
        "additionalItems" | "unevaluatedItems" => match (node.base, node.incoming) {
            (Some(Value::Object(_)), Some(Value::Object(_))) => return Visit::Descend,
            _ => (ConflictKind::ItemsChanged, changed),
        },
        "prefixItems" => match (node.base, node.incoming) {
            (Some(old), Some(new)) if descendable(old, new) => return Visit::Descend,
            _ => (ConflictKind::PrefixItemsChanged, changed),
        },
        "contains" => match (node.base, node.incoming) {
            (Some(Value::Object(_)), Some(Value::Object(_))) => return Visit::Descend,
            _ => (ConflictKind::ContainsChanged, changed),
        },
        "uniqueItems" => (ConflictKind::UniqueItemsChanged, changed),
        "minItems" => (ConflictKind::MinItemsChanged, changed),
        "maxItems" => (ConflictKind::MaxItemsChanged, changed),
        "minContains" | "maxContains" => (ConflictKind::ContainsBoundsChanged, changed),
        _ => return Visit::Descend,
    };
    ctx.report(&node.path, kind, node.base, node.incoming, description);
    Visit::Skip
}

/// Two schemas, or two equally long tuples of object schemas, are compared
/// member by member.
fn descendable(old: &Tree, new: &Tree) -> bool {
    match (old, new) {
        (Value::Object(_), Value::Object(_)) => true,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().chain(b.iter()).all(Value::is_object)
        }
        _ => false,
    }
}

/// An array on both sides that no keyword phase owns.
fn is_data_array(node: &WalkNode<'_>) -> bool {
    let both_arrays = node.base.is_some_and(Value::is_array) && node.incoming.is_some_and(Value::is_array);
    if !both_arrays || node.index().is_some() {
        return false;
    }
    match node.container {
        Container::Keywords => node.keyword().is_some_and(|k| !keywords::is_schema_keyword(k)),
        Container::Root | Container::Names => true,
        Container::Array => false,
    }
}

fn data_array(ctx: &mut DetectionContext, node: &WalkNode<'_>) {
    let (Some(Value::Array(old)), Some(Value::Array(new))) = (node.base, node.incoming) else {
        return;
    };
    if same_multiset(old, new) {
        // Elements are unchanged, so nothing below the array is examined.
        ctx.report(
            &node.path,
            ConflictKind::ArrayReordered,
            node.base,
            node.incoming,
            "array items were reordered",
        );
        return;
    }
    let (kind, description) = if old.len() != new.len() {
        (
            ConflictKind::ArrayLengthMismatch,
            format!("array length changed from {} to {}", old.len(), new.len()),
        )
    } else {
        (ConflictKind::ArrayItemsChanged, "array items changed".to_string())
    };
    ctx.report_node(&node.path, kind, node.base, node.incoming, description);
}

/// Pairs every item of `a` with a distinct, deeply equal item of `b`.
/// Map equality ignores key order.
fn same_multiset(a: &[Tree], b: &[Tree]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    a.iter().all(|item| match (0..b.len()).find(|&i| !used[i] && b[i] == *item) {
        Some(i) => {
            used[i] = true;
            true
        }
        None => false,
    })
}
