//! Observable events
//!
//! Every log line names one of these. Events are explicit and typed.

use std::fmt;

/// Observable events in a docshift run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Configuration loaded and validated
    ConfigLoaded,
    /// Batch begins (mode, collection, query)
    BatchBegin,
    /// Batch finished normally
    BatchComplete,
    /// Batch aborted by a fatal error
    BatchFailed,
    /// Batch scope dropped without completion
    BatchIncomplete,
    /// Cancellation observed at a page boundary
    BatchCancelled,

    // Paging
    /// Page fetched from the store
    PageFetched,
    /// Page fully processed; carries running totals
    PageComplete,
    /// Query could not be opened or continued
    QueryFailed,

    // Per-document
    /// Document written (or would have been, in dry run)
    DocumentWritten,
    /// Document deleted
    DocumentDeleted,
    /// Transform asked to leave the document alone
    DocumentSkipped,
    /// Version mismatch on conditional write or delete
    DocumentConflict,
    /// Any other per-document failure
    DocumentFailed,
    /// Relocation deleted the source but never wrote the replacement
    RelocationPartialFailure,

    // Output
    /// Stranded documents written for manual recovery
    StrandedWritten,
    /// Ctrl-C received; the first stops after the current page
    InterruptReceived,
}

impl Event {
    /// Returns the event name as used in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::BatchBegin => "BATCH_BEGIN",
            Event::BatchComplete => "BATCH_COMPLETE",
            Event::BatchFailed => "BATCH_FAILED",
            Event::BatchIncomplete => "BATCH_INCOMPLETE",
            Event::BatchCancelled => "BATCH_CANCELLED",
            Event::PageFetched => "PAGE_FETCHED",
            Event::PageComplete => "PAGE_COMPLETE",
            Event::QueryFailed => "QUERY_FAILED",
            Event::DocumentWritten => "DOCUMENT_WRITTEN",
            Event::DocumentDeleted => "DOCUMENT_DELETED",
            Event::DocumentSkipped => "DOCUMENT_SKIPPED",
            Event::DocumentConflict => "DOCUMENT_CONFLICT",
            Event::DocumentFailed => "DOCUMENT_FAILED",
            Event::RelocationPartialFailure => "RELOCATION_PARTIAL_FAILURE",
            Event::StrandedWritten => "STRANDED_WRITTEN",
            Event::InterruptReceived => "INTERRUPT_RECEIVED",
        }
    }

    /// Whether this event ends the run
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::BatchFailed | Event::QueryFailed)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
