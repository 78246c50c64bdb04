//! # Engine Errors
//!
//! Two tiers:
//! - `DocumentError`: confined to one document, absorbed by the `ErrorSink`
//! - `EngineError`: ends the run (query failure, invalid options)

use thiserror::Error;

use crate::document::Document;
use crate::store::StoreError;
use crate::transform::TransformError;

use super::progress::StrandedDocument;

/// Result type for fatal engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Per-document failure
#[derive(Debug, Clone, Error)]
pub enum DocumentError {
    /// Document data violates the transform's assumptions
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Version token no longer matches (or the document vanished)
    #[error("Concurrency conflict on {id}: {source}")]
    ConcurrencyConflict { id: String, source: StoreError },

    /// Source deleted, replacement never written: the document is gone
    #[error(
        "Relocation of {id} from '{from_partition}' to '{to_partition}' deleted the source \
         but failed to write the replacement: {source}"
    )]
    RelocationPartialFailure {
        id: String,
        from_partition: String,
        to_partition: String,
        document: Box<Document>,
        source: StoreError,
    },

    /// Any other store failure; nothing was changed
    #[error("Store error: {0}")]
    Store(StoreError),

    /// The per-document task panicked
    #[error("Worker panicked: {0}")]
    Panicked(String),

    /// The per-document task never reported an outcome
    #[error("Worker aborted: {0}")]
    Aborted(String),
}

impl DocumentError {
    /// Classify a store error raised by a conditional operation
    pub fn from_conditional(id: &str, err: StoreError) -> Self {
        if err.is_conflict() {
            Self::ConcurrencyConflict {
                id: id.to_string(),
                source: err,
            }
        } else {
            Self::Store(err)
        }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transform(_) => "TRANSFORM_ERROR",
            Self::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
            Self::RelocationPartialFailure { .. } => "RELOCATION_PARTIAL_FAILURE",
            Self::Store(_) => "STORE_ERROR",
            Self::Panicked(_) => "WORKER_PANICKED",
            Self::Aborted(_) => "WORKER_ABORTED",
        }
    }

    /// Whether the store no longer holds the document at all
    pub fn is_data_loss(&self) -> bool {
        matches!(self, Self::RelocationPartialFailure { .. })
    }

    /// Whether this is a lost optimistic-concurrency race
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

/// Fatal error: the run stops
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Pager could not open or continue the query; carries the documents
    /// already stranded by earlier pages
    #[error("Query error: {source}")]
    Query {
        source: StoreError,
        stranded: Vec<StrandedDocument>,
    },

    /// Operation mode is not one the engine supports
    #[error("Unknown operation mode '{0}'")]
    UnknownOperationMode(String),

    /// Run options rejected before any store call
    #[error("Invalid run options: {0}")]
    InvalidOptions(String),
}

impl EngineError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Query { .. } => "QUERY_ERROR",
            Self::UnknownOperationMode(_) => "UNKNOWN_OPERATION_MODE",
            Self::InvalidOptions(_) => "INVALID_OPTIONS",
        }
    }

    /// Documents lost mid-relocation before the run stopped
    pub fn stranded(&self) -> &[StrandedDocument] {
        match self {
            Self::Query { stranded, .. } => stranded,
            _ => &[],
        }
    }
}
