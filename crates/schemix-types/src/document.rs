use std::fmt;

use serde::{Deserialize, Serialize};

/// A JSON-like tree: null, boolean, number, string, ordered array, or map.
///
/// Maps keep insertion order (the `preserve_order` feature) so merged output
/// round-trips in the order authors wrote it; comparison ignores key order.
pub type Tree = serde_json::Value;

/// Unique identifier for an input document (UUID v7 for time-ordering).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(uuid::Uuid);

impl DocumentId {
    /// Generate a new time-ordered document ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Short representation (first 8 characters of UUID).
    pub fn short_id(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", self.short_id())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The dialect of a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    #[serde(rename = "json_schema")]
    JsonSchema,
    #[serde(rename = "openapi")]
    OpenApi,
}

impl DocumentKind {
    /// Guess the kind from a root value: an `openapi` or `swagger` key means
    /// OpenAPI, anything else is treated as JSON Schema.
    pub fn detect(content: &Tree) -> Self {
        match content.as_object() {
            Some(map) if map.contains_key("openapi") || map.contains_key("swagger") => {
                Self::OpenApi
            }
            _ => Self::JsonSchema,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JsonSchema => write!(f, "JSON Schema"),
            Self::OpenApi => write!(f, "OpenAPI"),
        }
    }
}

/// An input document. The engine only reads `content`; it never mutates it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub name: String,
    pub content: Tree,
    pub kind: DocumentKind,
}

impl Document {
    /// Create a document with a fresh ID.
    pub fn new(name: impl Into<String>, content: Tree, kind: DocumentKind) -> Self {
        Self {
            id: DocumentId::new(),
            name: name.into(),
            content,
            kind,
        }
    }

    /// Create a document whose kind is detected from its content.
    pub fn detect(name: impl Into<String>, content: Tree) -> Self {
        let kind = DocumentKind::detect(&content);
        Self::new(name, content, kind)
    }
}
