//! Foundation types for schemix.
//!
//! This crate provides the document, path, and conflict types shared by the
//! detector and the merge engine. Every other schemix crate depends on
//! `schemix-types`.
//!
//! # Key Types
//!
//! - [`Tree`] -- A JSON-like value (`serde_json::Value`), the unit of merging
//! - [`Document`] -- An input document with its [`DocumentKind`]
//! - [`Segment`] -- One step of a `/key[index]` path
//! - [`ConflictKind`] -- The closed conflict taxonomy with its lookup tables
//! - [`Conflict`] -- A classified disagreement at a path, plus its resolution
//! - [`MergeResult`] / [`MergeStep`] -- Output of a sequential merge

pub mod conflict;
pub mod document;
pub mod error;
pub mod kind;
pub mod path;
pub mod result;

pub use conflict::{present, Conflict, ConflictSignature, Resolution, Severity};
pub use document::{Document, DocumentId, DocumentKind, Tree};
pub use error::{PathError, PathResult};
pub use kind::{ConflictKind, KindFamily};
pub use path::{
    compare_paths, format_path, get_at_path, is_ancestor, join_index, join_key, normalize_path,
    parent_path, parse_path, path_depth, remove_at_path, set_at_path, write_at_path, Segment,
};
pub use result::{MergeResult, MergeStep, MergeSummary};
