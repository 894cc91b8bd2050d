use std::collections::BTreeSet;

use schemix_types::{get_at_path, join_key, parent_path, ConflictKind, Tree};
use serde_json::Value;
use tracing::debug;

use crate::phase::{DetectionContext, DetectionPhase, Phase, TreePair};
use crate::signature::StructuralSignature;
use crate::similarity::edit_distance;
use crate::walk::Visit;

const RENAME_DISTANCE: usize = 2;

/// Phase 6: property additions, removals, renames, moves, and
/// case-insensitive duplicates.
pub struct PropertyPhase;

/// A property present on only one side of a shared `properties` map.
#[derive(Debug)]
struct Delta<'t> {
    /// Path of the `properties` keyword.
    map: String,
    name: String,
    path: String,
    value: &'t Tree,
    required: bool,
}

#[derive(Default)]
struct Outcome {
    /// Names whose disappearance from `required` is explained, per map.
    explained: Vec<(String, String)>,
}

impl DetectionPhase for PropertyPhase {
    fn phase(&self) -> Phase {
        Phase::Properties
    }

    fn run(&self, pair: &TreePair<'_>, ctx: &mut DetectionContext) {
        let mut removed: Vec<Delta<'_>> = Vec::new();
        let mut added: Vec<Delta<'_>> = Vec::new();
        let mut one_sided_maps = Vec::new();

        pair.walk(ctx, |node, ctx| {
            if node.keyword() != Some("properties") || !node.shared_parent {
                return Visit::Descend;
            }
            if !node.present_on_both() {
                one_sided_maps.push(node.path.clone());
            }
            let old = node.base.and_then(Value::as_object);
            let new = node.incoming.and_then(Value::as_object);
            let (base_required, _) = pair.sibling(&node.path, "required");
            let required = names(base_required);

            for (name, value) in old.into_iter().flatten() {
                let path = join_key(&node.path, name);
                if new.is_some_and(|m| m.contains_key(name)) || ctx.is_claimed(&path) {
                    continue;
                }
                removed.push(Delta {
                    map: node.path.clone(),
                    name: name.clone(),
                    path,
                    value,
                    required: required.contains(name.as_str()),
                });
            }
            for (name, value) in new.into_iter().flatten() {
                let path = join_key(&node.path, name);
                if old.is_some_and(|m| m.contains_key(name)) || ctx.is_claimed(&path) {
                    continue;
                }
                added.push(Delta {
                    map: node.path.clone(),
                    name: name.clone(),
                    path,
                    value,
                    required: false,
                });
            }
            Visit::Descend
        });

        let outcome = classify(pair, ctx, removed, added);
        claim_explained_required(pair, ctx, &outcome);
        for path in one_sided_maps {
            ctx.claim(path);
        }
    }
}

/// The same property, unchanged, under a different `properties` map.
fn find_move(added: &[Option<Delta<'_>>], old: &Delta<'_>, signature: StructuralSignature) -> Option<usize> {
    added.iter().position(|candidate| {
        candidate.as_ref().is_some_and(|new| {
            new.map != old.map && new.name == old.name && StructuralSignature::of(new.value) == signature
        })
    })
}

fn names(value: Option<&Tree>) -> BTreeSet<&str> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn classify(
    pair: &TreePair<'_>,
    ctx: &mut DetectionContext,
    removed: Vec<Delta<'_>>,
    added: Vec<Delta<'_>>,
) -> Outcome {
    let mut outcome = Outcome::default();
    let mut added: Vec<Option<Delta<'_>>> = added.into_iter().map(Some).collect();

    for old in removed {
        let signature = StructuralSignature::of(old.value);
        let renamed = added.iter().position(|candidate| {
            candidate.as_ref().is_some_and(|new| {
                new.map == old.map
                    && edit_distance(&old.name, &new.name) <= RENAME_DISTANCE
                    && StructuralSignature::of(new.value) == signature
            })
        });
        if let Some(new) = renamed.and_then(|i| added[i].take()) {
            debug!(from = %old.path, to = %new.path, "property rename detected");
            ctx.report(
                &old.path,
                ConflictKind::PropertyRenamed,
                Some(old.value),
                None,
                format!("property '{}' renamed to '{}'", old.name, new.name),
            )
            .linked_conflict_paths
            .push(new.path.clone());
            ctx.claim(new.path.clone());
            ctx.property_renames.insert(old.path.clone(), new.path.clone());
            outcome.explained.push((old.map.clone(), old.name.clone()));
            outcome.explained.push((new.map, new.name));
        } else if let Some(new) = find_move(&added, &old, signature).and_then(|i| added[i].take()) {
            let from = parent_path(&old.map).unwrap_or_default();
            let to = parent_path(&new.map).unwrap_or_default();
            ctx.report(
                &old.path,
                ConflictKind::PropertyMoved,
                Some(old.value),
                None,
                format!("property '{}' moved from '{from}' to '{to}'", old.name),
            )
            .linked_conflict_paths
            .push(new.path.clone());
            ctx.claim(new.path.clone());
            ctx.property_renames.insert(old.path.clone(), new.path.clone());
            outcome.explained.push((old.map.clone(), old.name.clone()));
        } else {
            let (kind, label) = if old.required {
                (ConflictKind::PropertyRemovedRequired, "required")
            } else {
                (ConflictKind::PropertyRemovedOptional, "optional")
            };
            ctx.report(
                &old.path,
                kind,
                Some(old.value),
                None,
                format!("{label} property '{}' was removed", old.name),
            );
            outcome.explained.push((old.map.clone(), old.name.clone()));
        }
    }

    for new in added.into_iter().flatten() {
        let clash = get_at_path(pair.incoming, &new.map)
            .and_then(Value::as_object)
            .and_then(|map| {
                map.keys()
                    .find(|k| **k != new.name && k.eq_ignore_ascii_case(&new.name))
                    .cloned()
            });
        match clash {
            Some(existing) => {
                ctx.report(
                    &new.path,
                    ConflictKind::PropertyDuplicate,
                    None,
                    Some(new.value),
                    format!("property '{}' duplicates '{existing}' up to case", new.name),
                );
            }
            None => {
                ctx.report(
                    &new.path,
                    ConflictKind::PropertyAdded,
                    None,
                    Some(new.value),
                    format!("property '{}' was added", new.name),
                );
            }
        }
    }
    outcome
}

/// Claim a sibling `required` list when every name that left or joined it
/// belongs to a property this phase already reported. The property
/// conflict then stands alone.
fn claim_explained_required(pair: &TreePair<'_>, ctx: &mut DetectionContext, outcome: &Outcome) {
    let maps: BTreeSet<&str> = outcome.explained.iter().map(|(map, _)| map.as_str()).collect();
    for map in maps {
        let (base, incoming) = pair.sibling(map, "required");
        let before = names(base);
        let after = names(incoming);
        let changed: Vec<&str> = before.symmetric_difference(&after).copied().collect();
        if changed.is_empty() {
            continue;
        }
        let explained = changed.iter().all(|name| {
            outcome
                .explained
                .iter()
                .any(|(m, n)| m == map && n == name)
        });
        if explained {
            if let Some(parent) = parent_path(map) {
                ctx.claim(join_key(&parent, "required"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phases::testing::{paths, run_phase};
    use serde_json::json;

    #[test]
    fn added_property() {
        let base = json!({"properties": {"a": {"type": "string"}}});
        let incoming = json!({"properties": {"a": {"type": "string"}, "b": {"type": "integer"}}});
        let conflicts = run_phase(&PropertyPhase, &base, &incoming);
        assert_eq!(paths(&conflicts), vec!["/properties/b"]);
        assert_eq!(conflicts[0].kind, ConflictKind::PropertyAdded);
    }

    #[test]
    fn removed_required_property_claims_required() {
        let base = json!({
            "properties": {"id": {"type": "string"}, "email": {"type": "string"}},
            "required": ["id", "email"]
        });
        let incoming = json!({
            "properties": {"id": {"type": "string"}},
            "required": ["id"]
        });
        let pair = TreePair::new(&base, &incoming);
        let mut ctx = DetectionContext::new(&pair, 1);
        PropertyPhase.run(&pair, &mut ctx);
        assert_eq!(ctx.conflicts().len(), 1);
        assert_eq!(ctx.conflicts()[0].kind, ConflictKind::PropertyRemovedRequired);
        assert!(ctx.is_claimed("/required"));
    }

    #[test]
    fn unexplained_required_change_stays_open() {
        let base = json!({"properties": {"a": {}, "b": {}}, "required": ["a"]});
        let incoming = json!({"properties": {"a": {}}, "required": ["a", "c"]});
        let pair = TreePair::new(&base, &incoming);
        let mut ctx = DetectionContext::new(&pair, 1);
        PropertyPhase.run(&pair, &mut ctx);
        assert_eq!(ctx.conflicts()[0].kind, ConflictKind::PropertyRemovedOptional);
        assert!(!ctx.is_claimed("/required"));
    }

    #[test]
    fn rename_within_distance() {
        let base = json!({"properties": {"userName": {"type": "string"}}, "required": ["userName"]});
        let incoming = json!({"properties": {"username": {"type": "string"}}, "required": ["username"]});
        let pair = TreePair::new(&base, &incoming);
        let mut ctx = DetectionContext::new(&pair, 1);
        PropertyPhase.run(&pair, &mut ctx);
        let conflicts = ctx.conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::PropertyRenamed);
        assert_eq!(conflicts[0].path, "/properties/userName");
        assert_eq!(conflicts[0].linked_conflict_paths, vec!["/properties/username"]);
        assert!(ctx.is_claimed("/properties/username"));
        assert!(ctx.is_claimed("/required"));
    }

    #[test]
    fn different_structure_is_not_a_rename() {
        let base = json!({"properties": {"userName": {"type": "string"}}});
        let incoming = json!({"properties": {"username": {"type": "integer"}}});
        let conflicts = run_phase(&PropertyPhase, &base, &incoming);
        assert_eq!(conflicts.len(), 2);
        assert_eq!(conflicts[0].kind, ConflictKind::PropertyRemovedOptional);
        assert_eq!(conflicts[1].kind, ConflictKind::PropertyAdded);
    }

    #[test]
    fn move_between_objects() {
        let base = json!({"properties": {
            "a": {"properties": {"zip": {"type": "string"}}},
            "b": {"properties": {}}
        }});
        let incoming = json!({"properties": {
            "a": {"properties": {}},
            "b": {"properties": {"zip": {"type": "string"}}}
        }});
        let conflicts = run_phase(&PropertyPhase, &base, &incoming);
        assert_eq!(paths(&conflicts), vec!["/properties/a/properties/zip"]);
        assert_eq!(conflicts[0].kind, ConflictKind::PropertyMoved);
        assert_eq!(conflicts[0].linked_conflict_paths, vec!["/properties/b/properties/zip"]);
    }

    #[test]
    fn case_duplicate() {
        let base = json!({"properties": {"email": {"type": "string"}}});
        let incoming = json!({"properties": {"email": {"type": "string"}, "Email": {"type": "string"}}});
        let conflicts = run_phase(&PropertyPhase, &base, &incoming);
        assert_eq!(conflicts[0].kind, ConflictKind::PropertyDuplicate);
        assert_eq!(conflicts[0].path, "/properties/Email");
    }

    #[test]
    fn one_sided_properties_map_is_claimed() {
        let base = json!({"type": "object"});
        let incoming = json!({"type": "object", "properties": {"a": {}}});
        let pair = TreePair::new(&base, &incoming);
        let mut ctx = DetectionContext::new(&pair, 1);
        PropertyPhase.run(&pair, &mut ctx);
        assert_eq!(ctx.conflicts()[0].path, "/properties/a");
        assert!(ctx.is_claimed("/properties"));
    }

    #[test]
    fn properties_under_new_subtrees_are_not_reported() {
        let base = json!({"properties": {}});
        let incoming = json!({"properties": {"a": {"properties": {"b": {}}}}});
        let conflicts = run_phase(&PropertyPhase, &base, &incoming);
        assert_eq!(paths(&conflicts), vec!["/properties/a"]);
    }
}
