//! Error types for wx-grid storage operations.

use thiserror::Error;

/// Result type alias using StoreError.
pub type StoreResult<T> = Result<T, StoreError>;

/// Primary error type for grid storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    // === Store Errors ===
    #[error("Table store unavailable: {0}")]
    Transient(String),

    #[error("Batch of {requested} entities exceeds store limit of {limit}")]
    BatchSizeExceeded { requested: usize, limit: usize },

    // === Data Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to decode stored data: {0}")]
    Decode(String),

    // === Caller Errors ===
    #[error("Invalid value for '{param}': {message}")]
    InvalidArgument { param: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    // === Infrastructure Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    NotFound,
    Decode,
    BatchSizeExceeded,
    InvalidArgument,
    Config,
    Internal,
}

impl StoreError {
    pub fn invalid_argument(param: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::InvalidArgument {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Get the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Transient(_) => ErrorKind::Transient,
            StoreError::BatchSizeExceeded { .. } => ErrorKind::BatchSizeExceeded,
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Decode(_) => ErrorKind::Decode,
            StoreError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            StoreError::Config(_) => ErrorKind::Config,
            StoreError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether retrying the whole operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}
