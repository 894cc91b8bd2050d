//! Pre-merge compatibility gate.

use serde::{Deserialize, Serialize};

use schemix_types::{Document, DocumentKind, Tree};

/// Outcome of the compatibility gate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityReport {
    pub compatible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CompatibilityReport {
    pub fn ok() -> Self {
        Self {
            compatible: true,
            reason: None,
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            compatible: false,
            reason: Some(reason.into()),
        }
    }
}

const SCHEMA_ROOT_KEYS: &[&str] = &["type", "properties", "definitions", "$defs"];

/// Decide whether a document sequence can be merged.
///
/// Requires at least two documents, one document kind across the sequence,
/// and a recognizable root for that kind. Anything that does not match
/// fails closed.
pub fn check(documents: &[Document]) -> CompatibilityReport {
    if documents.len() < 2 {
        return CompatibilityReport::fail(format!(
            "at least two documents are required, got {}",
            documents.len()
        ));
    }
    let first = &documents[0];
    for doc in &documents[1..] {
        if doc.kind != first.kind {
            return CompatibilityReport::fail(format!(
                "document '{}' is {} but '{}' is {}",
                doc.name, doc.kind, first.name, first.kind
            ));
        }
    }
    for doc in documents {
        if let Err(reason) = check_root(&doc.content, doc.kind) {
            return CompatibilityReport::fail(format!("document '{}': {reason}", doc.name));
        }
    }
    CompatibilityReport::ok()
}

fn check_root(content: &Tree, kind: DocumentKind) -> Result<(), String> {
    let Some(root) = content.as_object() else {
        return Err("root is not an object".into());
    };
    match kind {
        DocumentKind::JsonSchema => {
            if SCHEMA_ROOT_KEYS.iter().any(|k| root.contains_key(*k)) {
                Ok(())
            } else {
                Err("root has none of type, properties, definitions, $defs".into())
            }
        }
        DocumentKind::OpenApi => {
            let versioned = root.contains_key("openapi") || root.contains_key("swagger");
            let has_body = root.contains_key("info") || root.contains_key("paths");
            if versioned && has_body {
                Ok(())
            } else {
                Err("root needs a version field and one of info, paths".into())
            }
        }
    }
}
