use schemix_types::{ConflictKind, Tree};
use serde_json::Value;

use crate::keywords;
use crate::phase::{show, DetectionContext, DetectionPhase, Phase, TreePair};
use crate::walk::{Visit, WalkNode};

/// Phase 9: numeric and string bounds, `pattern`, `format`, `enum`, and
/// `const`.
pub struct ConstraintPhase;

impl DetectionPhase for ConstraintPhase {
    fn phase(&self) -> Phase {
        Phase::Constraints
    }

    fn run(&self, pair: &TreePair<'_>, ctx: &mut DetectionContext) {
        pair.walk(ctx, |node, ctx| {
            let Some(keyword) = node.changed_keyword() else {
                return Visit::Descend;
            };
            if !keywords::CONSTRAINTS.contains(&keyword) {
                return Visit::Descend;
            }
            if let Some((kind, description)) = classify(node, keyword) {
                ctx.report(&node.path, kind, node.base, node.incoming, description);
            }
            Visit::Skip
        });
    }
}

fn classify(node: &WalkNode<'_>, keyword: &str) -> Option<(ConflictKind, String)> {
    match (node.base, node.incoming) {
        (None, Some(value)) => {
            return Some((
                ConflictKind::ConstraintAdded,
                format!("{keyword} {} was added", show(Some(value))),
            ))
        }
        (Some(value), None) => {
            return Some((
                ConflictKind::ConstraintRemoved,
                format!("{keyword} {} was removed", show(Some(value))),
            ))
        }
        _ => {}
    }
    let changed = format!("{keyword} changed from {} to {}", show(node.base), show(node.incoming));
    let kind = match keyword {
        "minimum" => ConflictKind::MinimumChanged,
        "maximum" => ConflictKind::MaximumChanged,
        "exclusiveMinimum" => ConflictKind::ExclusiveMinimumChanged,
        "exclusiveMaximum" => ConflictKind::ExclusiveMaximumChanged,
        "multipleOf" => ConflictKind::MultipleOfChanged,
        "minLength" => ConflictKind::MinLengthChanged,
        "maxLength" => ConflictKind::MaxLengthChanged,
        "pattern" => ConflictKind::PatternChanged,
        "format" => ConflictKind::FormatChanged,
        "const" => ConflictKind::ConstChanged,
        "enum" => return classify_enum(node.base, node.incoming),
        _ => return None,
    };
    Some((kind, changed))
}

fn classify_enum(base: Option<&Tree>, incoming: Option<&Tree>) -> Option<(ConflictKind, String)> {
    let (Some(Value::Array(old)), Some(Value::Array(new))) = (base, incoming) else {
        return Some((
            ConflictKind::EnumChanged,
            format!("enum changed from {} to {}", show(base), show(incoming)),
        ));
    };
    let added: Vec<&Tree> = new.iter().filter(|v| !old.contains(v)).collect();
    let removed: Vec<&Tree> = old.iter().filter(|v| !new.contains(v)).collect();
    let list = |values: &[&Tree]| {
        values
            .iter()
            .map(|v| show(Some(v)))
            .collect::<Vec<_>>()
            .join(", ")
    };
    match (added.is_empty(), removed.is_empty()) {
        (true, true) => None,
        (false, true) => Some((ConflictKind::EnumValuesAdded, format!("enum gained {}", list(&added)))),
        (true, false) => Some((ConflictKind::EnumValuesRemoved, format!("enum lost {}", list(&removed)))),
        (false, false) => Some((
            ConflictKind::EnumChanged,
            format!("enum gained {} and lost {}", list(&added), list(&removed)),
        )),
    }
}
