//! Error types for the diff crate.

use schemix_types::PathError;

/// Errors that can occur while diffing or patching trees.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// A patch operation could not be applied at its path.
    #[error("cannot apply {op} at '{path}': {source}")]
    Patch {
        op: &'static str,
        path: String,
        #[source]
        source: PathError,
    },
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
