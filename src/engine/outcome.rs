//! Per-document operation outcome

use super::errors::DocumentError;

/// What happened to one document
#[derive(Debug, Clone)]
pub enum OperationOutcome {
    /// A mutation was applied (or would have been, in dry run)
    Written,
    /// Left untouched
    Skipped,
    /// Failed; the error says how and whether data was lost
    Failed(DocumentError),
}

impl OperationOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// The failure, if any
    pub fn error(&self) -> Option<&DocumentError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}
