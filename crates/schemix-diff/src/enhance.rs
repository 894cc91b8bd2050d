//! Per-index expansion of array-level conflicts.

use std::collections::BTreeSet;

use schemix_types::{is_ancestor, join_index, Conflict, ConflictKind, KindFamily};
use serde_json::Value;

/// Families whose array-valued conflicts are expanded per index. A reorder
/// keeps every element, so it stays a single conflict.
fn expands(kind: ConflictKind) -> bool {
    kind != ConflictKind::ArrayReordered
        && !matches!(
            kind.family(),
            KindFamily::Meta | KindFamily::Reference | KindFamily::TypeSystem | KindFamily::Annotation
        )
}

/// Add an item conflict for each differing index of every array-level
/// conflict, unless a conflict already sits at that index.
///
/// The array conflict is linked to its items, and each item to the
/// conflicts nested under it. Item conflicts follow their array conflict in
/// the output.
pub fn enhance_arrays(conflicts: Vec<Conflict>) -> Vec<Conflict> {
    let existing: BTreeSet<String> = conflicts.iter().map(|c| c.path.clone()).collect();
    let mut out = Vec::with_capacity(conflicts.len());

    for mut conflict in conflicts {
        let items = item_conflicts(&conflict, &existing);
        for item in &items {
            conflict.linked_conflict_paths.push(item.path.clone());
        }
        out.push(conflict);
        out.extend(items);
    }

    let paths: Vec<String> = out.iter().map(|c| c.path.clone()).collect();
    for item in out.iter_mut().filter(|c| c.kind.is_array_item()) {
        for path in &paths {
            if is_ancestor(&item.path, path) && !item.linked_conflict_paths.contains(path) {
                item.linked_conflict_paths.push(path.clone());
            }
        }
    }
    out
}

fn item_conflicts(conflict: &Conflict, existing: &BTreeSet<String>) -> Vec<Conflict> {
    let (Some(Value::Array(old)), Some(Value::Array(new))) = (&conflict.current_value, &conflict.incoming_value)
    else {
        return Vec::new();
    };
    if !expands(conflict.kind) {
        return Vec::new();
    }

    let len = old.len().max(new.len());
    (0..len)
        .filter_map(|index| {
            let before = old.get(index);
            let after = new.get(index);
            let path = join_index(&conflict.path, index);
            if before == after || existing.contains(&path) {
                return None;
            }
            let (kind, verb) = match (before, after) {
                (None, _) => (ConflictKind::ArrayItemAdded, "added"),
                (_, None) => (ConflictKind::ArrayItemRemoved, "removed"),
                _ => (ConflictKind::ArrayItemChanged, "changed"),
            };
            Some(Conflict::new(
                path,
                kind,
                before.cloned(),
                after.cloned(),
                conflict.step_number,
                format!("item {index} of {} {verb}", display_path(&conflict.path)),
            ))
        })
        .collect()
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn array_conflict(path: &str, old: Value, new: Value) -> Conflict {
        Conflict::new(path, ConflictKind::ArrayLengthMismatch, Some(old), Some(new), 1, "len")
    }

    #[test]
    fn expands_differing_indices() {
        let conflicts = vec![array_conflict("/tags", json!(["a", "b"]), json!(["a", "c", "d"]))];
        let out = enhance_arrays(conflicts);
        let summary: Vec<_> = out.iter().map(|c| (c.path.as_str(), c.kind)).collect();
        assert_eq!(
            summary,
            vec![
                ("/tags", ConflictKind::ArrayLengthMismatch),
                ("/tags[1]", ConflictKind::ArrayItemChanged),
                ("/tags[2]", ConflictKind::ArrayItemAdded),
            ]
        );
        assert_eq!(out[0].linked_conflict_paths, vec!["/tags[1]", "/tags[2]"]);
        assert_eq!(out[1].description, "item 1 of /tags changed");
    }

    #[test]
    fn shorter_incoming_removes() {
        let out = enhance_arrays(vec![array_conflict("/t", json!([1, 2]), json!([1]))]);
        assert_eq!(out[1].kind, ConflictKind::ArrayItemRemoved);
        assert_eq!(out[1].incoming_value, None);
    }

    #[test]
    fn existing_conflicts_are_not_duplicated_and_get_linked() {
        let nested = Conflict::new(
            "/params[0]/required",
            ConflictKind::RequiredAdded,
            Some(json!(false)),
            Some(json!(true)),
            1,
            "req",
        );
        let conflicts = vec![
            array_conflict(
                "/params",
                json!([{"required": false}]),
                json!([{"required": true}, {"x": 1}]),
            ),
            nested,
        ];
        let out = enhance_arrays(conflicts);
        let item = out.iter().find(|c| c.path == "/params[0]").unwrap();
        assert_eq!(item.linked_conflict_paths, vec!["/params[0]/required"]);
        assert!(out.iter().any(|c| c.path == "/params[1]"));
    }

    #[test]
    fn type_lists_are_not_expanded() {
        let conflict = Conflict::new(
            "/type",
            ConflictKind::NullableAdded,
            Some(json!(["string"])),
            Some(json!(["string", "null"])),
            1,
            "n",
        );
        assert_eq!(enhance_arrays(vec![conflict]).len(), 1);
    }

    #[test]
    fn reorders_are_not_expanded() {
        let conflict = Conflict::new(
            "/tags",
            ConflictKind::ArrayReordered,
            Some(json!(["a", "b"])),
            Some(json!(["b", "a"])),
            1,
            "r",
        );
        assert_eq!(enhance_arrays(vec![conflict]).len(), 1);
    }

    #[test]
    fn non_array_conflicts_pass_through() {
        let c = Conflict::new("/a", ConflictKind::ValueChanged, Some(json!(1)), Some(json!(2)), 1, "v");
        assert_eq!(enhance_arrays(vec![c.clone()]), vec![c]);
    }
}
