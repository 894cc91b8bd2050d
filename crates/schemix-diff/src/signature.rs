use std::fmt;

use schemix_types::Tree;
use serde_json::Value;

use crate::keywords;

/// Domain-separated BLAKE3 fingerprint of a subtree's structure.
///
/// Object keys are hashed in sorted order, so key order never changes a
/// signature. Annotation keywords (titles, descriptions, examples, `x-*`)
/// are left out: two definitions that differ only in documentation have
/// the same structure.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructuralSignature([u8; 32]);

const STRUCTURE_DOMAIN: &str = "schemix-structure-v1";
const SHAPE_DOMAIN: &str = "schemix-shape-v1";

impl StructuralSignature {
    /// Full structural signature.
    pub fn of(tree: &Tree) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(STRUCTURE_DOMAIN.as_bytes());
        hasher.update(b":");
        feed(&mut hasher, tree, true);
        Self(*hasher.finalize().as_bytes())
    }

    /// Coarse signature: the declared type, the sorted property names, and
    /// the reference target. Used for fuzzy name matching, where the bodies
    /// may have drifted but the outline has not.
    pub fn shape(tree: &Tree) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(SHAPE_DOMAIN.as_bytes());
        hasher.update(b":");
        if let Value::Object(map) = tree {
            for key in ["type", "$ref"] {
                if let Some(value) = map.get(key) {
                    hasher.update(key.as_bytes());
                    feed(&mut hasher, value, false);
                }
            }
            if let Some(Value::Object(props)) = map.get("properties") {
                let mut names: Vec<&String> = props.keys().collect();
                names.sort();
                for name in names {
                    hasher.update(b"p:");
                    hasher.update(name.as_bytes());
                    hasher.update(b"\0");
                }
            }
        } else {
            feed(&mut hasher, tree, false);
        }
        Self(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 8 hex characters, for log lines.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for StructuralSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StructuralSignature({})", self.short_hex())
    }
}

impl fmt::Display for StructuralSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

fn feed(hasher: &mut blake3::Hasher, value: &Value, skip_annotations: bool) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map
                .keys()
                .filter(|k| !(skip_annotations && keywords::is_annotation(k)))
                .collect();
            keys.sort();
            hasher.update(b"{");
            for key in keys {
                hasher.update(key.as_bytes());
                hasher.update(b"\0");
                feed(hasher, &map[key.as_str()], skip_annotations);
            }
            hasher.update(b"}");
        }
        Value::Array(items) => {
            hasher.update(b"[");
            for item in items {
                feed(hasher, item, skip_annotations);
                hasher.update(b",");
            }
            hasher.update(b"]");
        }
        scalar => {
            hasher.update(scalar.to_string().as_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_is_irrelevant() {
        let a = json!({"type": "object", "properties": {"a": {}, "b": {}}});
        let b = json!({"properties": {"b": {}, "a": {}}, "type": "object"});
        assert_eq!(StructuralSignature::of(&a), StructuralSignature::of(&b));
    }

    #[test]
    fn annotations_are_ignored() {
        let a = json!({"type": "string", "description": "old"});
        let b = json!({"type": "string", "description": "new", "x-owner": "team"});
        assert_eq!(StructuralSignature::of(&a), StructuralSignature::of(&b));
    }

    #[test]
    fn structure_changes_signature() {
        let a = json!({"type": "string"});
        let b = json!({"type": "integer"});
        assert_ne!(StructuralSignature::of(&a), StructuralSignature::of(&b));
    }

    #[test]
    fn shape_ignores_constraints() {
        let a = json!({"type": "object", "properties": {"id": {"type": "string"}}});
        let b = json!({"type": "object", "properties": {"id": {"type": "integer"}}, "minProperties": 1});
        assert_eq!(StructuralSignature::shape(&a), StructuralSignature::shape(&b));
        assert_ne!(StructuralSignature::of(&a), StructuralSignature::of(&b));
    }

    #[test]
    fn domains_separate_signatures() {
        let v = json!("x");
        assert_ne!(StructuralSignature::of(&v), StructuralSignature::shape(&v));
    }

    #[test]
    fn hex_forms() {
        let sig = StructuralSignature::of(&json!({}));
        assert_eq!(sig.to_hex().len(), 64);
        assert_eq!(sig.short_hex().len(), 8);
        assert!(sig.to_hex().starts_with(&sig.short_hex()));
    }
}
