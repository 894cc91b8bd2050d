//! Error types for the merge crate.

use schemix_diff::DiffError;
use schemix_types::PathError;

/// Errors raised inside the merge engine.
///
/// Public merge operations convert these into conflicts, warnings, or
/// skipped writes; they reach callers only from configuration loading,
/// report serialization, and the path utilities.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("step {step}: {source}")]
    Patch {
        step: usize,
        #[source]
        source: DiffError,
    },

    #[error("path error: {0}")]
    Path(#[from] PathError),

    #[error("invalid step {step}: {reason}")]
    InvalidStep { step: usize, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for merge-engine results.
pub type EngineResult<T> = Result<T, MergeError>;
