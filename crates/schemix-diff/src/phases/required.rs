use std::collections::BTreeSet;

use schemix_types::{ConflictKind, Tree};
use serde_json::Value;

use crate::phase::{DetectionContext, DetectionPhase, Phase, TreePair};
use crate::walk::Visit;

/// Phase 10: the `required` keyword, as a name list or a boolean flag.
pub struct RequiredPhase;

impl DetectionPhase for RequiredPhase {
    fn phase(&self) -> Phase {
        Phase::Required
    }

    fn run(&self, pair: &TreePair<'_>, ctx: &mut DetectionContext) {
        pair.walk(ctx, |node, ctx| {
            if node.changed_keyword() != Some("required") {
                return Visit::Descend;
            }
            if let Some((kind, description)) = classify(node.base, node.incoming) {
                ctx.report(&node.path, kind, node.base, node.incoming, description);
            }
            Visit::Skip
        });
    }
}

fn names(value: Option<&Tree>) -> BTreeSet<&str> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn classify(base: Option<&Tree>, incoming: Option<&Tree>) -> Option<(ConflictKind, String)> {
    let is_flag = |v: Option<&Tree>| v.map_or(true, Value::is_boolean);
    if is_flag(base) && is_flag(incoming) {
        let was = base.and_then(Value::as_bool).unwrap_or(false);
        let is = incoming.and_then(Value::as_bool).unwrap_or(false);
        return match (was, is) {
            (false, true) => Some((ConflictKind::RequiredAdded, "value became required".into())),
            (true, false) => Some((ConflictKind::RequiredRemoved, "value is no longer required".into())),
            _ => None,
        };
    }

    let before = names(base);
    let after = names(incoming);
    let added: Vec<&str> = after.difference(&before).copied().collect();
    let removed: Vec<&str> = before.difference(&after).copied().collect();
    if !added.is_empty() {
        let mut description = format!("now required: {}", added.join(", "));
        if !removed.is_empty() {
            description.push_str(&format!("; no longer required: {}", removed.join(", ")));
        }
        Some((ConflictKind::RequiredAdded, description))
    } else if !removed.is_empty() {
        Some((
            ConflictKind::RequiredRemoved,
            format!("no longer required: {}", removed.join(", ")),
        ))
    } else {
        None
    }
}
