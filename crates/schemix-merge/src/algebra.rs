//! The resolution algebra: union, intersection, and symmetric difference
//! over JSON-like values.
//!
//! Every operation takes the two sides as `Option<&Tree>` (a missing side is
//! `None`) and returns `None` when the path should be removed.

use serde_json::{Map, Value};
use tracing::debug;

use schemix_types::{Conflict, Resolution, Tree};

use crate::config::{CombineOptions, KeyConflictPolicy};

/// What applying a resolution does to one path.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Write(Tree),
    Remove,
    /// Leave the path untouched.
    Skip,
}

impl From<Option<Tree>> for Outcome {
    fn from(value: Option<Tree>) -> Self {
        value.map_or(Self::Remove, Self::Write)
    }
}

/// Compute the outcome of a conflict's recorded resolution.
pub fn resolve(conflict: &Conflict, options: &CombineOptions) -> Outcome {
    let current = conflict.current_value.as_ref();
    let incoming = conflict.incoming_value.as_ref();
    match conflict.resolution {
        Resolution::Unresolved => Outcome::Skip,
        Resolution::Current => current.cloned().into(),
        Resolution::Incoming => incoming.cloned().into(),
        Resolution::Combine => combine(current, incoming, options).into(),
        Resolution::Interpolate => interpolate(current, incoming).into(),
        Resolution::Extrapolate => extrapolate(current, incoming).into(),
        Resolution::Custom => match &conflict.custom_value {
            Some(value) => Outcome::Write(value.clone()),
            None => {
                debug!(path = %conflict.path, "custom resolution without a value, skipping");
                Outcome::Skip
            }
        },
    }
}

fn present(value: Option<&Tree>) -> Option<&Tree> {
    value.filter(|v| !v.is_null())
}

// ---------------------------------------------------------------------------
// Combine
// ---------------------------------------------------------------------------

/// Union. Arrays keep every current item and append the incoming items not
/// already present; objects merge key by key per `options`; scalars take the
/// incoming value. A missing or null side yields the other side.
pub fn combine(
    current: Option<&Tree>,
    incoming: Option<&Tree>,
    options: &CombineOptions,
) -> Option<Tree> {
    match (present(current), present(incoming)) {
        (Some(c), Some(i)) => Some(combine_values(c, i, options, 0)),
        (Some(c), None) => Some(c.clone()),
        (None, Some(i)) => Some(i.clone()),
        (None, None) => current.or(incoming).cloned(),
    }
}

fn combine_values(current: &Tree, incoming: &Tree, options: &CombineOptions, depth: usize) -> Tree {
    match (current, incoming) {
        (Value::Array(c), Value::Array(i)) => {
            let mut out = c.clone();
            for item in i {
                if !out.contains(item) {
                    out.push(item.clone());
                }
            }
            Value::Array(out)
        }
        (Value::Object(c), Value::Object(i)) => {
            let mut out = c.clone();
            for (key, theirs) in i {
                let Some(ours) = c.get(key) else {
                    out.insert(key.clone(), theirs.clone());
                    continue;
                };
                let merged = match options.key_policy {
                    KeyConflictPolicy::PreferCurrent => ours.clone(),
                    KeyConflictPolicy::PreferIncoming => theirs.clone(),
                    KeyConflictPolicy::MergeRecursive if options.can_recurse(depth) => {
                        match (present(Some(ours)), present(Some(theirs))) {
                            (Some(o), Some(t)) => combine_values(o, t, options, depth + 1),
                            (Some(o), None) => o.clone(),
                            _ => theirs.clone(),
                        }
                    }
                    KeyConflictPolicy::MergeRecursive => theirs.clone(),
                };
                out.insert(key.clone(), merged);
            }
            Value::Object(out)
        }
        (_, other) => other.clone(),
    }
}

// ---------------------------------------------------------------------------
// Interpolate
// ---------------------------------------------------------------------------

/// Intersection. Arrays keep the current items also found in incoming;
/// objects keep keys present on both sides with equal values; differing
/// scalars keep the current value. A missing side removes the path.
pub fn interpolate(current: Option<&Tree>, incoming: Option<&Tree>) -> Option<Tree> {
    let (c, i) = (current?, incoming?);
    let value = match (c, i) {
        (Value::Array(ca), Value::Array(ia)) => {
            Value::Array(ca.iter().filter(|item| ia.contains(item)).cloned().collect())
        }
        (Value::Object(co), Value::Object(io)) => Value::Object(
            co.iter()
                .filter(|(k, v)| io.get(*k) == Some(*v))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        _ => c.clone(),
    };
    Some(value)
}

// ---------------------------------------------------------------------------
// Extrapolate
// ---------------------------------------------------------------------------

/// Symmetric difference. Arrays keep the items unique to either side,
/// current first; objects keep keys unique to either side plus keys whose
/// values differ (taking the current value). Object handling is one level
/// deep. Scalars keep the current value.
pub fn extrapolate(current: Option<&Tree>, incoming: Option<&Tree>) -> Option<Tree> {
    let (c, i) = match (current, incoming) {
        (Some(c), Some(i)) => (c, i),
        (one, other) => return one.or(other).cloned(),
    };
    let value = match (c, i) {
        (Value::Array(ca), Value::Array(ia)) => {
            let mut out: Vec<Tree> = ca.iter().filter(|v| !ia.contains(v)).cloned().collect();
            out.extend(ia.iter().filter(|v| !ca.contains(v)).cloned());
            Value::Array(out)
        }
        (Value::Object(co), Value::Object(io)) => {
            let mut out = Map::new();
            for (k, v) in co {
                if io.get(k) != Some(v) {
                    out.insert(k.clone(), v.clone());
                }
            }
            for (k, v) in io {
                if !co.contains_key(k) {
                    out.insert(k.clone(), v.clone());
                }
            }
            Value::Object(out)
        }
        _ => c.clone(),
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use schemix_types::ConflictKind;
    use serde_json::json;

    fn opts() -> CombineOptions {
        CombineOptions::default()
    }

    // -----------------------------------------------------------------------
    // 1. Combine
    // -----------------------------------------------------------------------

    #[test]
    fn combine_arrays_unions_in_order() {
        let out = combine(Some(&json!(["a", "b"])), Some(&json!(["a", "c"])), &opts());
        assert_eq!(out, Some(json!(["a", "b", "c"])));
    }

    #[test]
    fn combine_objects_recursive() {
        let out = combine(
            Some(&json!({"a": {"x": 1}, "b": 2})),
            Some(&json!({"a": {"y": 2}, "c": 3})),
            &opts(),
        );
        assert_eq!(out, Some(json!({"a": {"x": 1, "y": 2}, "b": 2, "c": 3})));
    }

    #[test]
    fn combine_key_policies() {
        let current = json!({"a": {"x": 1}});
        let incoming = json!({"a": {"y": 2}});
        let prefer_current = CombineOptions {
            key_policy: KeyConflictPolicy::PreferCurrent,
            ..opts()
        };
        assert_eq!(
            combine(Some(&current), Some(&incoming), &prefer_current),
            Some(json!({"a": {"x": 1}}))
        );
        let prefer_incoming = CombineOptions {
            key_policy: KeyConflictPolicy::PreferIncoming,
            ..opts()
        };
        assert_eq!(
            combine(Some(&current), Some(&incoming), &prefer_incoming),
            Some(json!({"a": {"y": 2}}))
        );
    }

    #[test]
    fn combine_depth_limit_takes_incoming() {
        let shallow = CombineOptions {
            max_depth: 1,
            ..opts()
        };
        let out = combine(
            Some(&json!({"a": {"b": {"x": 1}}})),
            Some(&json!({"a": {"b": {"y": 2}}})),
            &shallow,
        );
        assert_eq!(out, Some(json!({"a": {"b": {"y": 2}}})));
    }

    #[test]
    fn combine_missing_or_null_side() {
        assert_eq!(combine(None, Some(&json!(1)), &opts()), Some(json!(1)));
        assert_eq!(combine(Some(&json!([1])), None, &opts()), Some(json!([1])));
        assert_eq!(combine(Some(&json!(null)), Some(&json!("x")), &opts()), Some(json!("x")));
        assert_eq!(combine(None, None, &opts()), None);
    }

    #[test]
    fn combine_scalars_take_incoming() {
        assert_eq!(combine(Some(&json!(1)), Some(&json!(2)), &opts()), Some(json!(2)));
        assert_eq!(combine(Some(&json!([1])), Some(&json!("x")), &opts()), Some(json!("x")));
    }

    // -----------------------------------------------------------------------
    // 2. Interpolate
    // -----------------------------------------------------------------------

    #[test]
    fn interpolate_arrays() {
        let out = interpolate(Some(&json!(["a", "b", "c"])), Some(&json!(["c", "a", "z"])));
        assert_eq!(out, Some(json!(["a", "c"])));
    }

    #[test]
    fn interpolate_objects_keep_equal_keys() {
        let out = interpolate(
            Some(&json!({"a": 1, "b": 2, "c": 3})),
            Some(&json!({"a": 1, "b": 5, "d": 4})),
        );
        assert_eq!(out, Some(json!({"a": 1})));
    }

    #[test]
    fn interpolate_scalars_and_missing() {
        assert_eq!(interpolate(Some(&json!(1)), Some(&json!(2))), Some(json!(1)));
        assert_eq!(interpolate(Some(&json!(1)), None), None);
        assert_eq!(interpolate(None, Some(&json!(1))), None);
    }

    // -----------------------------------------------------------------------
    // 3. Extrapolate
    // -----------------------------------------------------------------------

    #[test]
    fn extrapolate_arrays() {
        let out = extrapolate(Some(&json!(["a", "b"])), Some(&json!(["b", "c"])));
        assert_eq!(out, Some(json!(["a", "c"])));
    }

    #[test]
    fn extrapolate_objects_one_level() {
        let out = extrapolate(
            Some(&json!({"a": 1, "b": 2, "n": {"x": 1}})),
            Some(&json!({"a": 1, "b": 3, "c": 4, "n": {"x": 2}})),
        );
        assert_eq!(out, Some(json!({"b": 2, "n": {"x": 1}, "c": 4})));
    }

    #[test]
    fn extrapolate_missing_side_keeps_present() {
        assert_eq!(extrapolate(None, Some(&json!([1]))), Some(json!([1])));
        assert_eq!(extrapolate(Some(&json!("x")), None), Some(json!("x")));
        assert_eq!(extrapolate(None, None), None);
    }

    // -----------------------------------------------------------------------
    // 4. resolve
    // -----------------------------------------------------------------------

    fn conflict(current: Option<Tree>, incoming: Option<Tree>, resolution: Resolution) -> Conflict {
        let mut c = Conflict::new("/x", ConflictKind::ValueChanged, current, incoming, 1, "d");
        c.resolve(resolution, None);
        c
    }

    #[test]
    fn resolve_sides() {
        let c = conflict(Some(json!(1)), None, Resolution::Incoming);
        assert_eq!(resolve(&c, &opts()), Outcome::Remove);
        let c = conflict(Some(json!(1)), None, Resolution::Current);
        assert_eq!(resolve(&c, &opts()), Outcome::Write(json!(1)));
        let c = conflict(Some(json!(1)), None, Resolution::Unresolved);
        assert_eq!(resolve(&c, &opts()), Outcome::Skip);
    }

    #[test]
    fn custom_without_value_skips() {
        let c = conflict(Some(json!(1)), Some(json!(2)), Resolution::Custom);
        assert_eq!(resolve(&c, &opts()), Outcome::Skip);

        let mut c = c;
        c.resolve(Resolution::Custom, Some(json!(7)));
        assert_eq!(resolve(&c, &opts()), Outcome::Write(json!(7)));
    }

    // -----------------------------------------------------------------------
    // 5. Properties
    // -----------------------------------------------------------------------

    fn leaf() -> impl Strategy<Value = Tree> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            (0i64..20).prop_map(|n| json!(n)),
            "[a-d]{1,3}".prop_map(Value::String),
        ]
    }

    fn tree() -> impl Strategy<Value = Tree> {
        leaf().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-d]", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn combine_is_idempotent(x in tree()) {
            prop_assert_eq!(combine(Some(&x), Some(&x), &opts()), Some(x.clone()));
        }

        #[test]
        fn interpolate_is_idempotent(x in tree()) {
            prop_assert_eq!(interpolate(Some(&x), Some(&x)), Some(x.clone()));
        }

        #[test]
        fn combine_contains_both_array_sides(a in prop::collection::vec(leaf(), 0..6),
                                             b in prop::collection::vec(leaf(), 0..6)) {
            let out = combine(Some(&Value::Array(a.clone())), Some(&Value::Array(b.clone())), &opts());
            let Some(Value::Array(items)) = out else { panic!("expected array") };
            for item in a.iter().chain(b.iter()) {
                prop_assert!(items.contains(item));
            }
        }
    }
}
