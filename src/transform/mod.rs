//! Transforms
//!
//! A transform is a unit of business logic: it tells the pager what to
//! select and, for each selected document, produces a replacement or asks
//! for the document to be left alone.
//!
//! `apply` must be a pure function of the document plus whatever static
//! reference data the transform owns. All store I/O belongs to the
//! `ConditionalWriter`.

mod customer;
mod errors;
mod registry;
mod user_status;

pub use customer::CustomerPartitionTransform;
pub use errors::TransformError;
pub use registry::{TransformFactory, TransformRegistry};
pub use user_status::{SelectAllTransform, UserStatusTransform};

use crate::document::{Document, QueryFilter};

/// Output of `Transform::apply`
#[derive(Debug, Clone, PartialEq)]
pub enum TransformResult {
    /// Write this document in place of the original
    Replace(Document),
    /// Leave the stored document untouched
    Skip,
}

impl TransformResult {
    /// Whether the transform asked to skip
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip)
    }
}

/// Per-document business logic
pub trait Transform: Send + Sync {
    /// Registry name, used in diagnostics
    fn name(&self) -> &str;

    /// Documents this transform operates on
    fn query(&self) -> QueryFilter;

    /// Produce a replacement for `document`, or `Skip`
    fn apply(&self, document: &Document) -> Result<TransformResult, TransformError>;
}
