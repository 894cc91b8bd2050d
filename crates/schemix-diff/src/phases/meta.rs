use schemix_types::{ConflictKind, Tree};
use serde_json::{Map, Value};
use tracing::trace;

use crate::keywords;
use crate::phase::{show, DetectionContext, DetectionPhase, Phase, TreePair};
use crate::walk::Visit;

/// Phase 1: dialect, identity, and document version.
pub struct MetaPhase;

impl DetectionPhase for MetaPhase {
    fn phase(&self) -> Phase {
        Phase::Meta
    }

    fn run(&self, pair: &TreePair<'_>, ctx: &mut DetectionContext) {
        pair.walk(ctx, |node, ctx| {
            let Some(keyword) = node.changed_keyword() else {
                return Visit::Descend;
            };
            let kind = match keyword {
                "$schema" => ConflictKind::SchemaDialectChanged,
                "$id" => ConflictKind::SchemaIdChanged,
                "$anchor" => ConflictKind::AnchorChanged,
                "openapi" | "swagger" => ConflictKind::OpenapiVersionChanged,
                _ => return Visit::Descend,
            };
            let description = format!(
                "{keyword} changed from {} to {}",
                show(node.base),
                show(node.incoming)
            );
            ctx.report(&node.path, kind, node.base, node.incoming, description);
            Visit::Skip
        });
    }
}

/// Rewrite OpenAPI-style nullability into JSON Schema form.
///
/// `nullable: true` next to a `type` becomes a `"null"` member of the type
/// list; `nullable: false` is the default and is dropped. A `nullable: true`
/// with no `type` to widen is kept as is.
pub fn normalize_nullable(tree: &Tree) -> Tree {
    normalize(tree, false)
}

fn normalize(value: &Tree, names: bool) -> Tree {
    match value {
        Value::Object(map) if names => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), normalize(v, false)))
                .collect(),
        ),
        Value::Object(map) => Value::Object(normalize_schema(map)),
        Value::Array(items) => Value::Array(items.iter().map(|v| normalize(v, false)).collect()),
        other => other.clone(),
    }
}

fn normalize_schema(map: &Map<String, Value>) -> Map<String, Value> {
    let nullable = map.get("nullable").and_then(Value::as_bool);
    let widen = nullable == Some(true) && matches!(map.get("type"), Some(Value::String(_) | Value::Array(_)));

    let mut out = Map::new();
    for (key, value) in map {
        if key == "nullable" && (nullable == Some(false) || widen) {
            continue;
        }
        let value = if key == "type" && widen {
            with_null(value)
        } else {
            normalize(value, keywords::is_name_map(key))
        };
        out.insert(key.clone(), value);
    }
    if widen {
        trace!("rewrote nullable type");
    }
    out
}

fn with_null(ty: &Value) -> Value {
    let null = Value::String("null".into());
    match ty {
        Value::String(s) if s == "null" => ty.clone(),
        Value::String(_) => Value::Array(vec![ty.clone(), null]),
        Value::Array(items) if items.contains(&null) => ty.clone(),
        Value::Array(items) => {
            let mut items = items.clone();
            items.push(null);
            Value::Array(items)
        }
        other => other.clone(),
    }
}
