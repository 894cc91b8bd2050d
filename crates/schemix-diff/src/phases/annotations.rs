use schemix_types::ConflictKind;
use serde_json::Value;

use crate::keywords;
use crate::phase::{show, DetectionContext, DetectionPhase, Phase, TreePair};
use crate::walk::{Container, Visit};

/// Phase 11: annotation keywords, then a catch-all for any remaining
/// difference no earlier phase claimed.
pub struct AnnotationPhase;

fn annotation_kind(keyword: &str) -> Option<ConflictKind> {
    let kind = match keyword {
        "title" => ConflictKind::TitleChanged,
        "description" | "summary" => ConflictKind::DescriptionChanged,
        "example" | "examples" => ConflictKind::ExampleChanged,
        "default" => ConflictKind::DefaultChanged,
        "deprecated" => ConflictKind::DeprecatedChanged,
        "readOnly" => ConflictKind::ReadOnlyChanged,
        "writeOnly" => ConflictKind::WriteOnlyChanged,
        "$comment" => ConflictKind::CommentChanged,
        "contentEncoding" | "contentMediaType" | "contentSchema" => ConflictKind::ContentAnnotationChanged,
        k if keywords::is_extension(k) => ConflictKind::ExtensionChanged,
        _ => return None,
    };
    Some(kind)
}

impl DetectionPhase for AnnotationPhase {
    fn phase(&self) -> Phase {
        Phase::Annotations
    }

    fn run(&self, pair: &TreePair<'_>, ctx: &mut DetectionContext) {
        pair.walk(ctx, |node, ctx| {
            if node.container == Container::Root || !node.shared_parent {
                return Visit::Descend;
            }
            let description = format!("{} changed from {} to {}", node.path, show(node.base), show(node.incoming));

            if let Some(kind) = node.changed_keyword().and_then(annotation_kind) {
                ctx.report(&node.path, kind, node.base, node.incoming, description);
                return Visit::Skip;
            }

            let kind = match (node.base, node.incoming) {
                (Some(Value::Object(_)), Some(Value::Object(_))) => return Visit::Descend,
                (Some(Value::Array(_)), Some(Value::Array(_))) => return Visit::Skip,
                (None, Some(_)) => ConflictKind::ValueAdded,
                (Some(_), None) => ConflictKind::ValueRemoved,
                (Some(_), Some(_)) => ConflictKind::ValueChanged,
                (None, None) => return Visit::Skip,
            };
            ctx.report(&node.path, kind, node.base, node.incoming, description);
            Visit::Skip
        });
    }
}
