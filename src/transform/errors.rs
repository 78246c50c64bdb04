//! # Transform Errors

use thiserror::Error;

/// A document's data, or a transform's configuration, violates the
/// transform's assumptions
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransformError {
    /// Reference value has no entry in the transform's mapping table
    #[error("Unmapped value '{value}' for field '{field}'")]
    UnmappedValue { field: String, value: String },

    /// Required field absent
    #[error("Missing field '{0}'")]
    MissingField(String),

    /// Field present but of the wrong shape
    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    /// No transform registered under this name
    #[error("Unknown transform '{0}'")]
    UnknownTransform(String),

    /// Transform options rejected at construction
    #[error("Invalid options for transform '{transform}': {reason}")]
    InvalidOptions { transform: String, reason: String },
}

impl TransformError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnmappedValue { .. } => "TRANSFORM_UNMAPPED_VALUE",
            Self::MissingField(_) => "TRANSFORM_MISSING_FIELD",
            Self::InvalidField { .. } => "TRANSFORM_INVALID_FIELD",
            Self::UnknownTransform(_) => "TRANSFORM_UNKNOWN",
            Self::InvalidOptions { .. } => "TRANSFORM_INVALID_OPTIONS",
        }
    }
}
