//! Error types for the silene index engine.

use thiserror::Error;

/// Result type alias using [`SileneError`].
pub type Result<T> = std::result::Result<T, SileneError>;

/// Errors that can occur in silene.
#[derive(Error, Debug)]
pub enum SileneError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV parse error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Journal error.
    #[error("journal error: {0}")]
    Journal(String),

    /// Index error.
    #[error("index error: {0}")]
    Index(String),

    /// Invalid argument error.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Not found error.
    #[error("not found: {0}")]
    NotFound(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Conversion was cancelled by the external interrupt signal.
    #[error("conversion interrupted")]
    Interrupted,

    /// Other error.
    #[error("error: {0}")]
    Other(String),
}

impl SileneError {
    /// Create a journal error.
    pub fn journal<S: Into<String>>(msg: S) -> Self {
        SileneError::Journal(msg.into())
    }

    /// Create an index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        SileneError::Index(msg.into())
    }

    /// Create an invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        SileneError::InvalidArgument(msg.into())
    }

    /// Create a not found error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        SileneError::NotFound(msg.into())
    }

    /// Create an internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        SileneError::Internal(msg.into())
    }

    /// Create an uncategorized error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        SileneError::Other(msg.into())
    }
}
