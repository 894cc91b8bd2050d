use schemix_types::{join_key, ConflictKind, Tree};
use serde_json::Value;

use crate::keywords::COMBINATORS;
use crate::phase::{show, DetectionContext, DetectionPhase, Phase, TreePair};
use crate::walk::{Visit, WalkNode};

/// Phase 4: `allOf`/`anyOf`/`oneOf`, `not`, conditionals, and the
/// discriminator.
pub struct CompositionPhase;

impl DetectionPhase for CompositionPhase {
    fn phase(&self) -> Phase {
        Phase::Composition
    }

    fn run(&self, pair: &TreePair<'_>, ctx: &mut DetectionContext) {
        pair.walk(ctx, |node, ctx| {
            let Some(keyword) = node.changed_keyword() else {
                return Visit::Descend;
            };
            match keyword {
                "allOf" | "anyOf" | "oneOf" => combinator(pair, ctx, node, keyword),
                "not" => subschema(
                    ctx,
                    node,
                    [ConflictKind::NotAdded, ConflictKind::NotRemoved, ConflictKind::NotChanged],
                ),
                "if" | "then" | "else" => subschema(
                    ctx,
                    node,
                    [
                        ConflictKind::ConditionalAdded,
                        ConflictKind::ConditionalRemoved,
                        ConflictKind::ConditionalChanged,
                    ],
                ),
                "discriminator" => {
                    ctx.report(
                        &node.path,
                        ConflictKind::DiscriminatorChanged,
                        node.base,
                        node.incoming,
                        format!("discriminator changed from {} to {}", show(node.base), show(node.incoming)),
                    );
                    Visit::Skip
                }
                _ => Visit::Descend,
            }
        });
    }
}

/// `[added, removed, changed]` kinds for a single-schema keyword. Two
/// object schemas are descended into instead of compared whole.
fn subschema(ctx: &mut DetectionContext, node: &WalkNode<'_>, kinds: [ConflictKind; 3]) -> Visit {
    let keyword = node.keyword().unwrap_or_default();
    let (kind, description) = match (node.base, node.incoming) {
        (Some(Value::Object(_)), Some(Value::Object(_))) => return Visit::Descend,
        (None, Some(_)) => (kinds[0], format!("{keyword} was added")),
        (Some(_), None) => (kinds[1], format!("{keyword} was removed")),
        _ => (
            kinds[2],
            format!("{keyword} changed from {} to {}", show(node.base), show(node.incoming)),
        ),
    };
    ctx.report(&node.path, kind, node.base, node.incoming, description);
    Visit::Skip
}

fn kinds_for(keyword: &str) -> [ConflictKind; 4] {
    match keyword {
        "allOf" => [
            ConflictKind::AllOfAdded,
            ConflictKind::AllOfRemoved,
            ConflictKind::AllOfMemberAdded,
            ConflictKind::AllOfMemberRemoved,
        ],
        "anyOf" => [
            ConflictKind::AnyOfAdded,
            ConflictKind::AnyOfRemoved,
            ConflictKind::AnyOfMemberAdded,
            ConflictKind::AnyOfMemberRemoved,
        ],
        _ => [
            ConflictKind::OneOfAdded,
            ConflictKind::OneOfRemoved,
            ConflictKind::OneOfMemberAdded,
            ConflictKind::OneOfMemberRemoved,
        ],
    }
}

fn combinator(pair: &TreePair<'_>, ctx: &mut DetectionContext, node: &WalkNode<'_>, keyword: &str) -> Visit {
    let [added_kind, removed_kind, member_added, member_removed] = kinds_for(keyword);
    match (node.base, node.incoming) {
        (Some(old), None) => {
            if let Some((other, value)) = replacement(pair, &node.path, keyword) {
                let other_path = parent_join(&node.path, other);
                if !ctx.is_claimed(&other_path) {
                    let [other_added, ..] = kinds_for(other);
                    ctx.report(
                        &node.path,
                        ConflictKind::CompositionKeywordChanged,
                        Some(old),
                        None,
                        format!("{keyword} replaced by {other}"),
                    );
                    ctx.report(&other_path, other_added, None, Some(value), format!("{other} was added"))
                        .linked_conflict_paths
                        .push(node.path.clone());
                    ctx.link(&node.path, &other_path);
                    return Visit::Skip;
                }
            }
            ctx.report(&node.path, removed_kind, Some(old), None, format!("{keyword} was removed"));
        }
        (None, Some(new)) => {
            ctx.report(&node.path, added_kind, None, Some(new), format!("{keyword} was added"));
        }
        (Some(Value::Array(old)), Some(Value::Array(new))) => {
            let added = new.iter().filter(|m| !old.contains(m)).count();
            let removed = old.iter().filter(|m| !new.contains(m)).count();
            if added == 0 && removed == 0 {
                return Visit::Skip;
            }
            let all_objects = old.iter().chain(new.iter()).all(Value::is_object);
            if old.len() == new.len() && all_objects {
                return Visit::Descend;
            }
            let (kind, description) = if removed > 0 {
                (member_removed, format!("{keyword} lost {removed} member(s)"))
            } else {
                (member_added, format!("{keyword} gained {added} member(s)"))
            };
            ctx.report(&node.path, kind, node.base, node.incoming, description);
        }
        _ => {
            ctx.report(
                &node.path,
                ConflictKind::CompositionKeywordChanged,
                node.base,
                node.incoming,
                format!("{keyword} changed from {} to {}", show(node.base), show(node.incoming)),
            );
        }
    }
    Visit::Skip
}

/// Another combinator that the incoming side introduced next to a removed
/// one: the schema switched e.g. from `anyOf` to `oneOf`.
fn replacement<'t>(pair: &TreePair<'t>, path: &str, keyword: &str) -> Option<(&'static str, &'t Tree)> {
    let (base_parent, incoming_parent) = pair.parent(path);
    let base_parent = base_parent?.as_object()?;
    let incoming_parent = incoming_parent?.as_object()?;
    COMBINATORS
        .iter()
        .filter(|&&other| other != keyword && !base_parent.contains_key(other))
        .find_map(|&other| incoming_parent.get(other).map(|value| (other, value)))
}

fn parent_join(path: &str, key: &str) -> String {
    let parent = schemix_types::parent_path(path).unwrap_or_default();
    join_key(&parent, key)
}
