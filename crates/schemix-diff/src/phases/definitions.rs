use schemix_types::{get_at_path, join_key, ConflictKind, Tree};
use serde_json::Value;
use tracing::debug;

use crate::phase::{DetectionContext, DetectionPhase, Phase, TreePair};
use crate::signature::StructuralSignature;
use crate::similarity::{edit_distance, name_similarity};

/// Containers holding named, reusable schemas.
const CONTAINERS: &[&str] = &["/$defs", "/definitions", "/components/schemas"];

/// Names within this edit distance may be a rename when the outlines match.
const RENAME_DISTANCE: usize = 2;

/// Phase 3: added, removed, renamed, and moved definitions.
pub struct DefinitionPhase;

struct Definition<'t> {
    container: &'static str,
    name: &'t str,
    path: String,
    value: &'t Tree,
}

fn collect(tree: &Tree) -> Vec<Definition<'_>> {
    let mut out = Vec::new();
    for &container in CONTAINERS {
        if let Some(Value::Object(map)) = get_at_path(tree, container) {
            for (name, value) in map {
                out.push(Definition {
                    container,
                    name,
                    path: join_key(container, name),
                    value,
                });
            }
        }
    }
    out
}

impl DetectionPhase for DefinitionPhase {
    fn phase(&self) -> Phase {
        Phase::Definitions
    }

    fn run(&self, pair: &TreePair<'_>, ctx: &mut DetectionContext) {
        let base = collect(pair.base);
        let incoming = collect(pair.incoming);

        let removed: Vec<&Definition<'_>> = base
            .iter()
            .filter(|d| !ctx.is_claimed(&d.path))
            .filter(|d| get_at_path(pair.incoming, &d.path).is_none())
            .collect();
        let mut added: Vec<Option<&Definition<'_>>> = incoming
            .iter()
            .filter(|d| !ctx.is_claimed(&d.path))
            .filter(|d| get_at_path(pair.base, &d.path).is_none())
            .map(Some)
            .collect();

        for old in removed {
            match best_match(old, &added) {
                Some(index) => {
                    let Some(new) = added[index].take() else {
                        continue;
                    };
                    let (kind, description) = if old.container == new.container {
                        (
                            ConflictKind::DefinitionRenamed,
                            format!("definition '{}' renamed to '{}'", old.name, new.name),
                        )
                    } else {
                        (
                            ConflictKind::DefinitionMoved,
                            format!(
                                "definition '{}' moved from {} to {}",
                                old.name, old.container, new.path
                            ),
                        )
                    };
                    debug!(from = %old.path, to = %new.path, "definition rename detected");
                    ctx.report(&old.path, kind, Some(old.value), None, description)
                        .linked_conflict_paths
                        .push(new.path.clone());
                    ctx.claim(new.path.clone());
                    ctx.definition_renames
                        .insert(old.path.clone(), new.path.clone());
                }
                None => {
                    ctx.report(
                        &old.path,
                        ConflictKind::DefinitionRemoved,
                        Some(old.value),
                        None,
                        format!("definition '{}' was removed", old.name),
                    );
                }
            }
        }

        for new in added.into_iter().flatten() {
            ctx.report(
                &new.path,
                ConflictKind::DefinitionAdded,
                None,
                Some(new.value),
                format!("definition '{}' was added", new.name),
            );
        }

        for &container in CONTAINERS {
            let base_has = get_at_path(pair.base, container).is_some();
            let incoming_has = get_at_path(pair.incoming, container).is_some();
            if base_has != incoming_has {
                ctx.claim(container);
            }
        }
    }
}

/// The best rename candidate for `old`: an identical structure first, then
/// a near name with the same outline. Ties go to the most similar name.
fn best_match(old: &Definition<'_>, added: &[Option<&Definition<'_>>]) -> Option<usize> {
    let signature = StructuralSignature::of(old.value);
    let shape = StructuralSignature::shape(old.value);

    let mut best: Option<(u8, usize, f32, usize)> = None;
    for (index, candidate) in added.iter().enumerate() {
        let Some(new) = candidate else {
            continue;
        };
        let distance = edit_distance(old.name, new.name);
        let tier = if StructuralSignature::of(new.value) == signature {
            0
        } else if distance <= RENAME_DISTANCE && StructuralSignature::shape(new.value) == shape {
            1
        } else {
            continue;
        };
        let similarity = name_similarity(old.name, new.name);
        let better = match best {
            None => true,
            Some((t, d, s, _)) => (tier, distance) < (t, d) || ((tier, distance) == (t, d) && similarity > s),
        };
        if better {
            best = Some((tier, distance, similarity, index));
        }
    }
    best.map(|(_, _, _, index)| index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phases::testing::{paths, run_phase};
    use serde_json::json;

    fn address() -> Tree {
        json!({"type": "object", "properties": {"street": {"type": "string"}}})
    }

    #[test]
    fn add_and_remove() {
        let base = json!({"$defs": {"A": {"type": "string"}}});
        let incoming = json!({"$defs": {"B": {"type": "integer", "minimum": 1}}});
        let conflicts = run_phase(&DefinitionPhase, &base, &incoming);
        assert_eq!(paths(&conflicts), vec!["/$defs/A", "/$defs/B"]);
        assert_eq!(conflicts[0].kind, ConflictKind::DefinitionRemoved);
        assert_eq!(conflicts[1].kind, ConflictKind::DefinitionAdded);
    }

    #[test]
    fn identical_structure_is_a_rename() {
        let base = json!({"$defs": {"Address": address()}});
        let incoming = json!({"$defs": {"PostalAddress": address()}});
        let pair = TreePair::new(&base, &incoming);
        let mut ctx = DetectionContext::new(&pair, 1);
        DefinitionPhase.run(&pair, &mut ctx);
        let conflicts = ctx.conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::DefinitionRenamed);
        assert_eq!(conflicts[0].path, "/$defs/Address");
        assert_eq!(conflicts[0].incoming_value, None);
        assert_eq!(conflicts[0].linked_conflict_paths, vec!["/$defs/PostalAddress"]);
        assert!(ctx.is_claimed("/$defs/PostalAddress"));
        assert_eq!(
            ctx.definition_renames.get("/$defs/Address").map(String::as_str),
            Some("/$defs/PostalAddress")
        );
    }

    #[test]
    fn near_name_with_same_outline_is_a_rename() {
        let base = json!({"$defs": {"Adress": address()}});
        let mut changed = address();
        changed["properties"]["street"]["maxLength"] = json!(80);
        let incoming = json!({"$defs": {"Address": changed}});
        let conflicts = run_phase(&DefinitionPhase, &base, &incoming);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::DefinitionRenamed);
    }

    #[test]
    fn container_change_is_a_move() {
        let base = json!({"definitions": {"Address": address()}});
        let incoming = json!({"$defs": {"Address": address()}});
        let conflicts = run_phase(&DefinitionPhase, &base, &incoming);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::DefinitionMoved);
        assert_eq!(conflicts[0].path, "/definitions/Address");
    }

    #[test]
    fn openapi_components_are_definitions() {
        let base = json!({"components": {"schemas": {}}});
        let incoming = json!({"components": {"schemas": {"Pet": {"type": "object"}}}});
        let conflicts = run_phase(&DefinitionPhase, &base, &incoming);
        assert_eq!(paths(&conflicts), vec!["/components/schemas/Pet"]);
        assert_eq!(conflicts[0].kind, ConflictKind::DefinitionAdded);
    }

    #[test]
    fn changed_bodies_are_left_to_later_phases() {
        let base = json!({"$defs": {"A": {"type": "string"}}});
        let incoming = json!({"$defs": {"A": {"type": "integer"}}});
        assert!(run_phase(&DefinitionPhase, &base, &incoming).is_empty());
    }
}
