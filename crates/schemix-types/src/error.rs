use thiserror::Error;

/// Errors produced by path parsing and tree mutation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("invalid path segment in '{path}': {segment}")]
    InvalidSegment { path: String, segment: String },

    #[error("path not found: {0}")]
    NotFound(String),

    #[error("cannot traverse {found} at '{path}'")]
    TypeMismatch { path: String, found: &'static str },

    #[error("index {index} out of bounds (len {len}) at '{path}'")]
    OutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },
}

/// Convenience alias for path results.
pub type PathResult<T> = Result<T, PathError>;
