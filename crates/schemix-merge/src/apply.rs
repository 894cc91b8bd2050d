//! Applying recorded decisions to a tree.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use tracing::debug;

use schemix_types::{
    format_path, get_at_path, is_ancestor, join_key, parse_path, remove_at_path, write_at_path,
    Conflict, Resolution, Segment, Tree,
};

use crate::algebra::{self, Outcome};
use crate::cascade::{cascade, Cascade};
use crate::config::CombineOptions;

/// Apply every decided conflict to a copy of `base`.
///
/// Decisions cascade along links first. Per-index array conflicts are then
/// folded into one whole-array write per array. The remaining conflicts are
/// applied in `path_order` (conflicts whose path is not listed follow in
/// slice order). Writes never create missing parents: a conflict orphaned by
/// an earlier write is skipped. A rename or move also settles the new path
/// it links to.
pub fn apply_resolutions(
    base: &Tree,
    conflicts: &[Conflict],
    path_order: Option<&[String]>,
    options: &CombineOptions,
) -> Tree {
    let cascade = cascade(conflicts);
    let mut tree = base.clone();

    let grouped = apply_array_groups(&mut tree, base, &cascade.conflicts, options);

    for index in application_order(&cascade.conflicts, path_order) {
        let conflict = &cascade.conflicts[index];
        if !conflict.is_resolved() || conflict.kind.is_array_item() {
            continue;
        }
        if covered(&cascade, index, &grouped) {
            continue;
        }
        if !conflict.kind.accepts(conflict.resolution) {
            debug!(
                path = %conflict.path,
                kind = %conflict.kind,
                resolution = %conflict.resolution,
                "resolution not valid for kind, skipping"
            );
            continue;
        }
        apply_one(&mut tree, conflict, options);
        if conflict.kind.is_relocation() {
            settle_relocation(&mut tree, conflict);
        }
    }
    tree
}

/// Apply a single decided conflict in place. Failures are logged and leave
/// the tree unchanged.
pub fn apply_one(tree: &mut Tree, conflict: &Conflict, options: &CombineOptions) {
    let result = match algebra::resolve(conflict, options) {
        Outcome::Skip => return,
        Outcome::Write(value) => write_at_path(tree, &conflict.path, value),
        Outcome::Remove => remove_at_path(tree, &conflict.path).map(|_| ()),
    };
    if let Err(e) = result {
        debug!(path = %conflict.path, error = %e, "resolution not applied");
    }
}

/// Cascaded conflicts nested under their source, and anything nested under
/// a rewritten array, were already settled by the enclosing write.
fn covered(cascade: &Cascade, index: usize, grouped: &[String]) -> bool {
    let path = &cascade.conflicts[index].path;
    if grouped.iter().any(|array| is_ancestor(array, path)) {
        return true;
    }
    match cascade.source_of(index) {
        Some(source) => is_ancestor(&cascade.conflicts[source].path, path),
        None => false,
    }
}

fn application_order(conflicts: &[Conflict], path_order: Option<&[String]>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..conflicts.len()).collect();
    if let Some(paths) = path_order {
        let mut rank: HashMap<&str, usize> = HashMap::new();
        for (i, p) in paths.iter().enumerate() {
            rank.entry(p.as_str()).or_insert(i);
        }
        order.sort_by_key(|&i| rank.get(conflicts[i].path.as_str()).copied().unwrap_or(usize::MAX));
    }
    order
}

// ---------------------------------------------------------------------------
// Array items
// ---------------------------------------------------------------------------

fn split_item_path(path: &str) -> Option<(String, usize)> {
    let mut segments = parse_path(path).ok()?;
    match segments.pop()? {
        Segment::Index(i) => Some((format_path(&segments), i)),
        Segment::Key(_) => None,
    }
}

/// Rebuild every array that has at least one decided item conflict and
/// return the rewritten array paths.
///
/// Untouched elements keep their place and multiplicity. A decided item
/// contributes only values the rebuilt array does not hold yet.
fn apply_array_groups(
    tree: &mut Tree,
    base: &Tree,
    conflicts: &[Conflict],
    options: &CombineOptions,
) -> Vec<String> {
    let mut groups: BTreeMap<String, BTreeMap<usize, &Conflict>> = BTreeMap::new();
    for conflict in conflicts.iter().filter(|c| c.kind.is_array_item()) {
        if let Some((array, index)) = split_item_path(&conflict.path) {
            groups.entry(array).or_default().insert(index, conflict);
        }
    }

    let mut written = Vec::new();
    for (array, items) in groups {
        if !items.values().any(|c| c.is_resolved()) {
            continue;
        }
        let existing: &[Tree] = get_at_path(base, &array)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let len = items
            .keys()
            .next_back()
            .map_or(0, |last| last + 1)
            .max(existing.len());

        let mut rebuilt = Vec::with_capacity(len);
        for index in 0..len {
            match items.get(&index).filter(|c| c.is_resolved()) {
                Some(conflict) => {
                    for value in item_values(conflict, options) {
                        if !rebuilt.contains(&value) {
                            rebuilt.push(value);
                        }
                    }
                }
                None => rebuilt.extend(existing.get(index).cloned()),
            }
        }

        match write_at_path(tree, &array, Value::Array(rebuilt)) {
            Ok(()) => written.push(array),
            Err(e) => debug!(path = %array, error = %e, "array rebuild not applied"),
        }
    }
    written
}

/// The values one decided item contributes to its rebuilt array.
fn item_values(conflict: &Conflict, options: &CombineOptions) -> Vec<Tree> {
    let current = conflict.current_value.clone();
    let incoming = conflict.incoming_value.clone();
    match conflict.resolution {
        Resolution::Unresolved => Vec::new(),
        Resolution::Current => current.into_iter().collect(),
        Resolution::Incoming => incoming.into_iter().collect(),
        Resolution::Combine | Resolution::Extrapolate => {
            current.into_iter().chain(incoming).collect()
        }
        Resolution::Interpolate => current
            .filter(|c| incoming.as_ref() == Some(c))
            .into_iter()
            .collect(),
        Resolution::Custom => match algebra::resolve(conflict, options) {
            Outcome::Write(value) => vec![value],
            _ => Vec::new(),
        },
    }
}

// ---------------------------------------------------------------------------
// Relocations
// ---------------------------------------------------------------------------

/// Settle the new paths of a decided rename or move. When the old path wins
/// outright the copy at the new path goes; otherwise it stays. A `required`
/// entry follows the property to wherever it now lives.
fn settle_relocation(tree: &mut Tree, conflict: &Conflict) {
    let keep_new = match conflict.resolution {
        Resolution::Unresolved => return,
        Resolution::Current | Resolution::Custom => false,
        Resolution::Incoming
        | Resolution::Interpolate
        | Resolution::Combine
        | Resolution::Extrapolate => true,
    };
    let restored = get_at_path(tree, &conflict.path).is_some();
    for target in &conflict.linked_conflict_paths {
        if restored {
            carry_required(tree, target, &conflict.path, keep_new);
        }
        if !keep_new {
            if let Err(e) = remove_at_path(tree, target) {
                debug!(path = %target, error = %e, "relocated copy not removed");
            }
        }
    }
}

/// The object holding a property path, and the property name.
fn property_slot(path: &str) -> Option<(String, String)> {
    let mut segments = parse_path(path).ok()?;
    let Segment::Key(name) = segments.pop()? else {
        return None;
    };
    match segments.pop()? {
        Segment::Key(keyword) if keyword == "properties" => Some((format_path(&segments), name)),
        _ => None,
    }
}

/// Copy the `required` entry of the property at `from` to the property at
/// `to`. The entry at `from` is dropped unless `keep` is set.
fn carry_required(tree: &mut Tree, from: &str, to: &str, keep: bool) {
    let (Some((from_object, from_name)), Some((to_object, to_name))) =
        (property_slot(from), property_slot(to))
    else {
        return;
    };
    let from_list = join_key(&from_object, "required");
    let to_list = join_key(&to_object, "required");
    let mut source = required_names(tree, &from_list);
    let Some(at) = source.iter().position(|n| *n == from_name) else {
        return;
    };

    if from_list == to_list {
        match (source.contains(&to_name), keep) {
            (true, true) => return,
            (true, false) => {
                source.remove(at);
            }
            (false, true) => source.insert(at + 1, to_name),
            (false, false) => source[at] = to_name,
        }
        write_required(tree, &from_list, source);
        return;
    }

    if !keep {
        source.remove(at);
        write_required(tree, &from_list, source);
    }
    let mut target = required_names(tree, &to_list);
    if !target.contains(&to_name) {
        target.push(to_name);
        write_required(tree, &to_list, target);
    }
}

fn required_names(tree: &Tree, path: &str) -> Vec<String> {
    get_at_path(tree, path)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

fn write_required(tree: &mut Tree, path: &str, names: Vec<String>) {
    let result = if names.is_empty() {
        remove_at_path(tree, path).map(|_| ())
    } else {
        write_at_path(tree, path, Value::Array(names.into_iter().map(Value::String).collect()))
    };
    if let Err(e) = result {
        debug!(path, error = %e, "required list not updated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemix_types::ConflictKind;
    use serde_json::json;

    fn opts() -> CombineOptions {
        CombineOptions::default()
    }

    fn decided(
        path: &str,
        kind: ConflictKind,
        current: Option<Tree>,
        incoming: Option<Tree>,
        resolution: Resolution,
    ) -> Conflict {
        let mut c = Conflict::new(path, kind, current, incoming, 1, path);
        c.resolve(resolution, None);
        c
    }

    #[test]
    fn writes_and_removes() {
        let base = json!({"properties": {"a": {"type": "integer"}, "b": {"type": "string"}}});
        let conflicts = vec![
            decided(
                "/properties/a",
                ConflictKind::PropertyAdded,
                None,
                Some(json!({"type": "integer"})),
                Resolution::Current,
            ),
            decided(
                "/properties/b/type",
                ConflictKind::TypeChanged,
                Some(json!("number")),
                Some(json!("string")),
                Resolution::Current,
            ),
        ];
        let out = apply_resolutions(&base, &conflicts, None, &opts());
        assert_eq!(out, json!({"properties": {"b": {"type": "number"}}}));
        assert_eq!(base["properties"]["a"], json!({"type": "integer"}));
    }

    #[test]
    fn unresolved_and_invalid_are_skipped() {
        let base = json!({"title": "B"});
        let unresolved = decided(
            "/title",
            ConflictKind::TitleChanged,
            Some(json!("A")),
            Some(json!("B")),
            Resolution::Unresolved,
        );
        let invalid = decided(
            "/title",
            ConflictKind::TitleChanged,
            Some(json!("A")),
            Some(json!("B")),
            Resolution::Interpolate,
        );
        let out = apply_resolutions(&base, &[unresolved, invalid], None, &opts());
        assert_eq!(out, base);
    }

    #[test]
    fn orphaned_write_is_skipped() {
        let base = json!({"properties": {}});
        let conflicts = vec![
            decided(
                "/properties/gone/minimum",
                ConflictKind::MinimumChanged,
                Some(json!(1)),
                Some(json!(2)),
                Resolution::Current,
            ),
            decided(
                "/title",
                ConflictKind::TitleChanged,
                None,
                Some(json!("T")),
                Resolution::Incoming,
            ),
        ];
        let out = apply_resolutions(&base, &conflicts, None, &opts());
        assert_eq!(out, json!({"properties": {}, "title": "T"}));
    }

    #[test]
    fn path_order_controls_last_writer() {
        let base = json!({"default": {"b": 0}});
        let mut child = decided("/default/b", ConflictKind::ValueChanged, None, None, Resolution::Custom);
        child.resolve(Resolution::Custom, Some(json!(5)));
        let mut parent = decided("/default", ConflictKind::DefaultChanged, None, None, Resolution::Custom);
        parent.resolve(Resolution::Custom, Some(json!({"b": 1})));
        let conflicts = vec![child, parent];

        let out = apply_resolutions(&base, &conflicts, None, &opts());
        assert_eq!(out["default"], json!({"b": 1}));

        let order = vec!["/default".to_string(), "/default/b".to_string()];
        let out = apply_resolutions(&base, &conflicts, Some(&order), &opts());
        assert_eq!(out["default"], json!({"b": 5}));
    }

    #[test]
    fn array_items_rebuild_whole_array() {
        let base = json!({"enum": ["b", "x", "c"]});
        let conflicts = vec![
            decided(
                "/enum[0]",
                ConflictKind::ArrayItemChanged,
                Some(json!("a")),
                Some(json!("b")),
                Resolution::Combine,
            ),
            decided(
                "/enum[1]",
                ConflictKind::ArrayItemChanged,
                Some(json!("y")),
                Some(json!("x")),
                Resolution::Current,
            ),
            decided(
                "/enum[3]",
                ConflictKind::ArrayItemAdded,
                None,
                Some(json!("d")),
                Resolution::Incoming,
            ),
        ];
        let out = apply_resolutions(&base, &conflicts, None, &opts());
        assert_eq!(out["enum"], json!(["a", "b", "y", "c", "d"]));
    }

    #[test]
    fn array_rebuild_keeps_agreed_duplicates() {
        let base = json!({"examples": [1, 1, 2, 5]});
        let conflicts = vec![
            decided(
                "/examples[2]",
                ConflictKind::ArrayItemChanged,
                Some(json!(3)),
                Some(json!(2)),
                Resolution::Combine,
            ),
            decided(
                "/examples[3]",
                ConflictKind::ArrayItemChanged,
                Some(json!(1)),
                Some(json!(5)),
                Resolution::Current,
            ),
        ];
        let out = apply_resolutions(&base, &conflicts, None, &opts());
        assert_eq!(out["examples"], json!([1, 1, 3, 2]));
    }

    #[test]
    fn cascade_reaches_linked_items() {
        let base = json!({"tags": ["x", "q"]});
        let mut array = decided(
            "/tags",
            ConflictKind::ArrayItemsChanged,
            Some(json!(["x", "y"])),
            Some(json!(["x", "q"])),
            Resolution::Current,
        );
        array.linked_conflict_paths = vec!["/tags[1]".into()];
        let item = Conflict::new(
            "/tags[1]",
            ConflictKind::ArrayItemChanged,
            Some(json!("y")),
            Some(json!("q")),
            1,
            "item",
        );
        let out = apply_resolutions(&base, &[array, item], None, &opts());
        assert_eq!(out["tags"], json!(["x", "y"]));
    }

    #[test]
    fn cascaded_sibling_is_applied() {
        let base = json!({"oneOf": [{"type": "string"}]});
        let mut any_of = decided(
            "/anyOf",
            ConflictKind::AnyOfRemoved,
            Some(json!([{"type": "string"}])),
            None,
            Resolution::Current,
        );
        any_of.linked_conflict_paths = vec!["/oneOf".into()];
        let one_of = Conflict::new(
            "/oneOf",
            ConflictKind::OneOfAdded,
            None,
            Some(json!([{"type": "string"}])),
            1,
            "oneOf added",
        );
        let out = apply_resolutions(&base, &[any_of, one_of], None, &opts());
        assert_eq!(out, json!({"anyOf": [{"type": "string"}]}));
    }

    // -----------------------------------------------------------------------
    // Relocations
    // -----------------------------------------------------------------------

    fn renamed(resolution: Resolution) -> Conflict {
        let mut c = decided(
            "/properties/userName",
            ConflictKind::PropertyRenamed,
            Some(json!({"type": "string"})),
            None,
            resolution,
        );
        c.linked_conflict_paths = vec!["/properties/username".into()];
        c
    }

    fn renamed_tree() -> Tree {
        json!({
            "properties": {"id": {"type": "integer"}, "username": {"type": "string"}},
            "required": ["username", "id"]
        })
    }

    #[test]
    fn current_undoes_a_rename() {
        let out = apply_resolutions(&renamed_tree(), &[renamed(Resolution::Current)], None, &opts());
        assert_eq!(
            out,
            json!({
                "properties": {"id": {"type": "integer"}, "userName": {"type": "string"}},
                "required": ["userName", "id"]
            })
        );
    }

    #[test]
    fn incoming_keeps_the_new_name() {
        let out = apply_resolutions(&renamed_tree(), &[renamed(Resolution::Incoming)], None, &opts());
        assert_eq!(out, renamed_tree());
    }

    #[test]
    fn combine_keeps_both_names() {
        let out = apply_resolutions(&renamed_tree(), &[renamed(Resolution::Combine)], None, &opts());
        assert_eq!(
            out["properties"],
            json!({"id": {"type": "integer"}, "username": {"type": "string"}, "userName": {"type": "string"}})
        );
        assert_eq!(out["required"], json!(["username", "userName", "id"]));
    }

    #[test]
    fn current_moves_a_property_back() {
        let base = json!({"properties": {
            "a": {"properties": {}},
            "b": {"properties": {"zip": {"type": "string"}}, "required": ["zip"]}
        }});
        let mut moved = decided(
            "/properties/a/properties/zip",
            ConflictKind::PropertyMoved,
            Some(json!({"type": "string"})),
            None,
            Resolution::Current,
        );
        moved.linked_conflict_paths = vec!["/properties/b/properties/zip".into()];
        let out = apply_resolutions(&base, &[moved], None, &opts());
        assert_eq!(
            out,
            json!({"properties": {
                "a": {"properties": {"zip": {"type": "string"}}, "required": ["zip"]},
                "b": {"properties": {}}
            }})
        );
    }

    #[test]
    fn current_undoes_a_definition_rename() {
        let base = json!({"$defs": {"Location": {"type": "object"}}});
        let mut c = decided(
            "/$defs/Address",
            ConflictKind::DefinitionRenamed,
            Some(json!({"type": "object"})),
            None,
            Resolution::Current,
        );
        c.linked_conflict_paths = vec!["/$defs/Location".into()];
        let out = apply_resolutions(&base, &[c], None, &opts());
        assert_eq!(out, json!({"$defs": {"Address": {"type": "object"}}}));
    }
}
