//! Per-document failure sink
//!
//! Every failure is logged once with the document id, the transform name,
//! the message and its code. Failure totals live in the `ProgressTracker`;
//! the sink keeps conflicts and stranded documents. Nothing here returns an
//! error or panics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::observability::{Event, Logger};

use super::errors::DocumentError;
use super::progress::StrandedDocument;

/// Collects per-document failures for the final summary
#[derive(Debug)]
pub struct ErrorSink {
    logger: Logger,
    transform_name: String,
    conflicts: AtomicU64,
    stranded: Mutex<Vec<StrandedDocument>>,
}

impl ErrorSink {
    pub fn new(logger: Logger, transform_name: impl Into<String>) -> Self {
        Self {
            logger,
            transform_name: transform_name.into(),
            conflicts: AtomicU64::new(0),
            stranded: Mutex::new(Vec::new()),
        }
    }

    /// Record one failure
    pub fn record(&self, document_id: &str, error: &DocumentError) {
        let message = error.to_string();

        match error {
            DocumentError::ConcurrencyConflict { .. } => {
                self.conflicts.fetch_add(1, Ordering::Relaxed);
                self.logger.warn(
                    Event::DocumentConflict,
                    &[
                        ("id", document_id),
                        ("handler", &self.transform_name),
                        ("error", &message),
                        ("code", error.code()),
                    ],
                );
            }
            DocumentError::RelocationPartialFailure {
                id,
                from_partition,
                to_partition,
                document,
                source,
            } => {
                let body = document.to_value().to_string();
                self.logger.error(
                    Event::RelocationPartialFailure,
                    &[
                        ("id", id),
                        ("handler", &self.transform_name),
                        ("from_partition", from_partition),
                        ("to_partition", to_partition),
                        ("error", &message),
                        ("code", error.code()),
                        ("document", &body),
                    ],
                );
                if let Ok(mut stranded) = self.stranded.lock() {
                    stranded.push(StrandedDocument {
                        id: id.clone(),
                        from_partition: from_partition.clone(),
                        to_partition: to_partition.clone(),
                        error: source.to_string(),
                        document: document.as_ref().clone(),
                    });
                }
            }
            _ => {
                self.logger.error(
                    Event::DocumentFailed,
                    &[
                        ("id", document_id),
                        ("handler", &self.transform_name),
                        ("error", &message),
                        ("code", error.code()),
                    ],
                );
            }
        }
    }

    pub fn conflicts(&self) -> u64 {
        self.conflicts.load(Ordering::Relaxed)
    }

    /// Documents lost mid-relocation, in the order they were recorded
    pub fn stranded(&self) -> Vec<StrandedDocument> {
        self.stranded
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}
