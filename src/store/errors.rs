//! # Store Errors

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by a document store
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// No document at the given address
    #[error("Document {id} not found in {collection}/{partition_key}")]
    NotFound {
        collection: String,
        partition_key: String,
        id: String,
    },

    /// Current version differs from the caller's expectation
    #[error("Version mismatch for {id}: expected {expected}, found {actual}")]
    VersionMismatch {
        id: String,
        expected: String,
        actual: String,
    },

    /// Continuation token could not be decoded
    #[error("Invalid continuation token: {0}")]
    InvalidContinuation(String),

    /// Stored payload is not a valid document
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Underlying I/O failed
    #[error("I/O error: {0}")]
    Io(String),

    /// Store refused or could not serve the request
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Build a not found error
    pub fn not_found(
        collection: impl Into<String>,
        partition_key: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            collection: collection.into(),
            partition_key: partition_key.into(),
            id: id.into(),
        }
    }

    /// Whether the error signals a lost optimistic-concurrency race
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionMismatch { .. } | Self::NotFound { .. })
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "STORE_NOT_FOUND",
            Self::VersionMismatch { .. } => "STORE_VERSION_MISMATCH",
            Self::InvalidContinuation(_) => "STORE_INVALID_CONTINUATION",
            Self::Serialization(_) => "STORE_SERIALIZATION",
            Self::Io(_) => "STORE_IO_ERROR",
            Self::Unavailable(_) => "STORE_UNAVAILABLE",
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
