//! The path grammar shared by conflicts, resolutions, and tree mutation.
//!
//! Object traversal is written as `/key`, array traversal as `[index]`
//! appended directly (no separator before `[`). The root is the empty path;
//! `/` is accepted as an alias and normalizes to `""`.
//!
//! Keys containing `~`, `/`, or `[` are escaped as `~0`, `~1`, and `~2` so
//! that OpenAPI path keys such as `/users/{id}` stay addressable.

use std::cmp::Ordering;
use std::fmt;

use serde_json::{Map, Value};

use crate::document::Tree;
use crate::error::{PathError, PathResult};

/// One step of a path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Object member access.
    Key(String),
    /// Array element access.
    Index(usize),
}

impl Segment {
    /// The key, if this is an object segment.
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::Key(key) => Some(key),
            Self::Index(_) => None,
        }
    }

    /// The index, if this is an array segment.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Key(_) => None,
            Self::Index(index) => Some(*index),
        }
    }
}

impl Ord for Segment {
    /// Keys sort lexically, indices numerically, and keys before indices.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Key(a), Self::Key(b)) => a.cmp(b),
            (Self::Index(a), Self::Index(b)) => a.cmp(b),
            (Self::Key(_), Self::Index(_)) => Ordering::Less,
            (Self::Index(_), Self::Key(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => write!(f, "/{}", escape_key(key)),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// Escape a raw object key for use inside a path.
pub fn escape_key(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1").replace('[', "~2")
}

fn unescape_key(raw: &str) -> String {
    raw.replace("~2", "[").replace("~1", "/").replace("~0", "~")
}

fn invalid(path: &str, segment: &str) -> PathError {
    PathError::InvalidSegment {
        path: path.to_string(),
        segment: segment.to_string(),
    }
}

/// Parse a path string into segments.
///
/// Empty segments (`//`, a trailing `/`) are ignored, so `"/"`, `""`, and
/// `"/a/"` parse the same as their normalized forms.
pub fn parse_path(path: &str) -> PathResult<Vec<Segment>> {
    let mut segments = Vec::new();
    for part in path.trim().split('/') {
        if part.is_empty() {
            continue;
        }
        let (key, mut rest) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };
        if !key.is_empty() {
            segments.push(Segment::Key(unescape_key(key)));
        }
        while !rest.is_empty() {
            if !rest.starts_with('[') {
                return Err(invalid(path, part));
            }
            let close = rest.find(']').ok_or_else(|| invalid(path, part))?;
            let index = rest[1..close]
                .parse::<usize>()
                .map_err(|_| invalid(path, part))?;
            segments.push(Segment::Index(index));
            rest = &rest[close + 1..];
        }
    }
    Ok(segments)
}

/// Render segments back into the canonical path string.
pub fn format_path(segments: &[Segment]) -> String {
    segments.iter().map(ToString::to_string).collect()
}

/// Canonical form of a path: root becomes `""`, stray separators vanish.
///
/// Unparseable input is returned trimmed rather than rejected.
pub fn normalize_path(path: &str) -> String {
    match parse_path(path) {
        Ok(segments) => format_path(&segments),
        Err(_) => path.trim().trim_end_matches('/').to_string(),
    }
}

/// Append an object key to a canonical path.
pub fn join_key(parent: &str, key: &str) -> String {
    format!("{parent}/{}", escape_key(key))
}

/// Append an array index to a canonical path.
pub fn join_index(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}

/// The parent of a path, or `None` for the root.
pub fn parent_path(path: &str) -> Option<String> {
    let mut segments = parse_path(path).ok()?;
    segments.pop()?;
    Some(format_path(&segments))
}

/// Returns `true` if `ancestor` is a strict ancestor of `path`.
///
/// Both paths must be canonical (see [`normalize_path`]).
pub fn is_ancestor(ancestor: &str, path: &str) -> bool {
    if path.len() <= ancestor.len() || !path.starts_with(ancestor) {
        return false;
    }
    matches!(path.as_bytes()[ancestor.len()], b'/' | b'[')
}

/// Number of segments in a path. The root has depth 0.
pub fn path_depth(path: &str) -> usize {
    parse_path(path).map(|s| s.len()).unwrap_or(0)
}

/// Total order used to sort conflicts: depth first, then segment by segment
/// (indices numerically), then the raw strings as a tie-breaker.
pub fn compare_paths(a: &str, b: &str) -> Ordering {
    let sa = parse_path(a).unwrap_or_else(|_| vec![Segment::Key(a.to_string())]);
    let sb = parse_path(b).unwrap_or_else(|_| vec![Segment::Key(b.to_string())]);
    sa.len()
        .cmp(&sb.len())
        .then_with(|| sa.cmp(&sb))
        .then_with(|| a.cmp(b))
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Look up the value at `path`. Returns `None` if any segment is missing or
/// the path does not parse.
pub fn get_at_path<'t>(tree: &'t Tree, path: &str) -> Option<&'t Tree> {
    let segments = parse_path(path).ok()?;
    let mut current = tree;
    for segment in &segments {
        current = match (segment, current) {
            (Segment::Key(key), Value::Object(map)) => map.get(key)?,
            (Segment::Index(index), Value::Array(items)) => items.get(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

fn descend_mut<'t>(node: &'t mut Tree, segment: &Segment, path: &str) -> PathResult<&'t mut Tree> {
    match (segment, node) {
        (Segment::Key(key), Value::Object(map)) => map
            .get_mut(key)
            .ok_or_else(|| PathError::NotFound(path.to_string())),
        (Segment::Index(index), Value::Array(items)) => {
            let len = items.len();
            items.get_mut(*index).ok_or(PathError::OutOfBounds {
                path: path.to_string(),
                index: *index,
                len,
            })
        }
        (_, other) => Err(PathError::TypeMismatch {
            path: path.to_string(),
            found: kind_name(other),
        }),
    }
}

fn descend_or_create<'t>(
    node: &'t mut Tree,
    segment: &Segment,
    next_is_index: bool,
    path: &str,
) -> PathResult<&'t mut Tree> {
    let empty = || {
        if next_is_index {
            Value::Array(Vec::new())
        } else {
            Value::Object(Map::new())
        }
    };
    match (segment, node) {
        (Segment::Key(key), Value::Object(map)) => Ok(map.entry(key.clone()).or_insert_with(empty)),
        (Segment::Index(index), Value::Array(items)) => {
            let len = items.len();
            if *index == len {
                items.push(empty());
            }
            items.get_mut(*index).ok_or(PathError::OutOfBounds {
                path: path.to_string(),
                index: *index,
                len,
            })
        }
        (_, other) => Err(PathError::TypeMismatch {
            path: path.to_string(),
            found: kind_name(other),
        }),
    }
}

fn assign(node: &mut Tree, segment: &Segment, value: Tree, path: &str) -> PathResult<()> {
    match (segment, node) {
        (Segment::Key(key), Value::Object(map)) => {
            map.insert(key.clone(), value);
            Ok(())
        }
        (Segment::Index(index), Value::Array(items)) => {
            let len = items.len();
            match (*index).cmp(&len) {
                Ordering::Less => items[*index] = value,
                Ordering::Equal => items.push(value),
                Ordering::Greater => {
                    return Err(PathError::OutOfBounds {
                        path: path.to_string(),
                        index: *index,
                        len,
                    })
                }
            }
            Ok(())
        }
        (_, other) => Err(PathError::TypeMismatch {
            path: path.to_string(),
            found: kind_name(other),
        }),
    }
}

/// Set the value at `path`, creating missing intermediate objects/arrays.
///
/// An index equal to the array length appends. Traversing through a scalar
/// or past the end of an array is an error.
pub fn set_at_path(tree: &mut Tree, path: &str, value: Tree) -> PathResult<()> {
    let segments = parse_path(path)?;
    let Some((last, parents)) = segments.split_last() else {
        *tree = value;
        return Ok(());
    };
    let mut current = tree;
    for (i, segment) in parents.iter().enumerate() {
        let next_is_index = matches!(segments[i + 1], Segment::Index(_));
        current = descend_or_create(current, segment, next_is_index, path)?;
    }
    assign(current, last, value, path)
}

/// Set the value at `path` only if its parent already exists.
///
/// Used when applying resolutions: a conflict orphaned by an upstream
/// structural change yields [`PathError::NotFound`] instead of recreating
/// structure that no longer exists.
pub fn write_at_path(tree: &mut Tree, path: &str, value: Tree) -> PathResult<()> {
    let segments = parse_path(path)?;
    let Some((last, parents)) = segments.split_last() else {
        *tree = value;
        return Ok(());
    };
    let mut current = tree;
    for segment in parents {
        current = descend_mut(current, segment, path)?;
    }
    assign(current, last, value, path)
}

/// Remove the value at `path`, returning it if it existed.
///
/// Removing from a missing parent is a no-op (`Ok(None)`); removing the root
/// replaces it with `null`.
pub fn remove_at_path(tree: &mut Tree, path: &str) -> PathResult<Option<Tree>> {
    let segments = parse_path(path)?;
    let Some((last, parents)) = segments.split_last() else {
        return Ok(Some(std::mem::replace(tree, Value::Null)));
    };
    let mut current = tree;
    for segment in parents {
        current = match descend_mut(current, segment, path) {
            Ok(next) => next,
            Err(PathError::NotFound(_) | PathError::OutOfBounds { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
    }
    match (last, current) {
        (Segment::Key(key), Value::Object(map)) => Ok(map.shift_remove(key)),
        (Segment::Index(index), Value::Array(items)) => {
            if *index < items.len() {
                Ok(Some(items.remove(*index)))
            } else {
                Ok(None)
            }
        }
        (_, other) => Err(PathError::TypeMismatch {
            path: path.to_string(),
            found: kind_name(other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_mixed_path() {
        let segments = parse_path("/properties/user[2]/name").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::Key("properties".into()),
                Segment::Key("user".into()),
                Segment::Index(2),
                Segment::Key("name".into()),
            ]
        );
    }

    #[test]
    fn root_forms_normalize_to_empty() {
        assert_eq!(normalize_path(""), "");
        assert_eq!(normalize_path("/"), "");
        assert!(parse_path("/").unwrap().is_empty());
    }

    #[test]
    fn normalize_strips_stray_separators() {
        assert_eq!(normalize_path("properties//a/"), "/properties/a");
        assert_eq!(normalize_path("/enum/[1]"), "/enum[1]");
        assert_eq!(normalize_path("/a[0][3]"), "/a[0][3]");
    }

    #[test]
    fn escaped_keys_round_trip() {
        let path = join_key("/paths", "/users/{id}");
        assert_eq!(path, "/paths/~1users~1{id}");
        let segments = parse_path(&path).unwrap();
        assert_eq!(segments[1], Segment::Key("/users/{id}".into()));
        assert_eq!(format_path(&segments), path);
    }

    #[test]
    fn invalid_index_rejected() {
        assert!(matches!(
            parse_path("/a[x]"),
            Err(PathError::InvalidSegment { .. })
        ));
        assert!(parse_path("/a[1").is_err());
        assert!(parse_path("/a[1]b").is_err());
    }

    #[test]
    fn ancestor_checks() {
        assert!(is_ancestor("", "/a"));
        assert!(is_ancestor("/a", "/a/b"));
        assert!(is_ancestor("/a", "/a[0]"));
        assert!(!is_ancestor("/a", "/ab"));
        assert!(!is_ancestor("/a", "/a"));
    }

    #[test]
    fn parent_and_depth() {
        assert_eq!(parent_path("/a/b[1]").as_deref(), Some("/a/b"));
        assert_eq!(parent_path("/a").as_deref(), Some(""));
        assert_eq!(parent_path(""), None);
        assert_eq!(path_depth("/a/b[1]"), 3);
        assert_eq!(path_depth(""), 0);
    }

    #[test]
    fn compare_sorts_parents_first_and_indices_numerically() {
        let mut paths = vec!["/a[10]", "/b", "/a[2]", "/a", "/a/x"];
        paths.sort_by(|a, b| compare_paths(a, b));
        assert_eq!(paths, vec!["/a", "/b", "/a/x", "/a[2]", "/a[10]"]);
    }

    #[test]
    fn get_values() {
        let tree = json!({"properties": {"tags": {"enum": ["a", "b"]}}});
        assert_eq!(
            get_at_path(&tree, "/properties/tags/enum[1]"),
            Some(&json!("b"))
        );
        assert_eq!(get_at_path(&tree, "/properties/missing"), None);
        assert_eq!(get_at_path(&tree, "/properties[0]"), None);
        assert_eq!(get_at_path(&tree, ""), Some(&tree));
    }

    #[test]
    fn set_creates_intermediates() {
        let mut tree = json!({});
        set_at_path(&mut tree, "/a/b[0]/c", json!(1)).unwrap();
        assert_eq!(tree, json!({"a": {"b": [{"c": 1}]}}));
    }

    #[test]
    fn set_rejects_scalar_traversal() {
        let mut tree = json!({"a": 5});
        let err = set_at_path(&mut tree, "/a/b", json!(1)).unwrap_err();
        assert!(matches!(err, PathError::TypeMismatch { found: "number", .. }));
    }

    #[test]
    fn set_rejects_gap_in_array() {
        let mut tree = json!({"a": [1]});
        assert!(matches!(
            set_at_path(&mut tree, "/a[3]", json!(2)),
            Err(PathError::OutOfBounds { index: 3, len: 1, .. })
        ));
    }

    #[test]
    fn write_requires_parent() {
        let mut tree = json!({"a": {}});
        write_at_path(&mut tree, "/a/b", json!(true)).unwrap();
        assert_eq!(tree, json!({"a": {"b": true}}));
        assert!(matches!(
            write_at_path(&mut tree, "/x/y", json!(1)),
            Err(PathError::NotFound(_))
        ));
    }

    #[test]
    fn write_root_replaces_tree() {
        let mut tree = json!({"a": 1});
        write_at_path(&mut tree, "/", json!([1])).unwrap();
        assert_eq!(tree, json!([1]));
    }

    #[test]
    fn set_existing_key_keeps_position() {
        let mut tree = json!({"a": 1, "b": 2, "c": 3});
        set_at_path(&mut tree, "/b", json!(20)).unwrap();
        let keys: Vec<_> = tree.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn remove_values() {
        let mut tree = json!({"a": {"b": 1, "c": 2}, "list": [1, 2, 3]});
        assert_eq!(remove_at_path(&mut tree, "/a/b").unwrap(), Some(json!(1)));
        assert_eq!(remove_at_path(&mut tree, "/list[1]").unwrap(), Some(json!(2)));
        assert_eq!(remove_at_path(&mut tree, "/missing/x").unwrap(), None);
        assert_eq!(tree, json!({"a": {"c": 2}, "list": [1, 3]}));
    }
}
