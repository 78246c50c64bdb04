//! Batch progress counters
//!
//! - Counters only, monotonic, reset per run
//! - Updated concurrently by every worker with atomic increments
//! - Dry-run writes are counted as if they happened

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::document::Document;

use super::outcome::OperationOutcome;

/// A relocation whose source was deleted and whose replacement was never written
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrandedDocument {
    pub id: String,
    pub from_partition: String,
    pub to_partition: String,
    pub error: String,
    /// The unwritten replacement, ready to re-insert
    pub document: Document,
}

/// Final report of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub documents_seen: u64,
    pub writes_performed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub conflicts: u64,
    pub pages: u64,
    pub elapsed_ms: u64,
    pub dry_run: bool,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stranded: Vec<StrandedDocument>,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub documents_seen: u64,
    pub writes_performed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub pages: u64,
    pub elapsed_ms: u64,
}

/// Shared counters for one batch
#[derive(Debug)]
pub struct ProgressTracker {
    documents_seen: AtomicU64,
    writes_performed: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    pages: AtomicU64,
    started: Instant,
    started_at: DateTime<Utc>,
    dry_run: bool,
}

impl ProgressTracker {
    pub fn new(dry_run: bool) -> Self {
        Self {
            documents_seen: AtomicU64::new(0),
            writes_performed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            pages: AtomicU64::new(0),
            started: Instant::now(),
            started_at: Utc::now(),
            dry_run,
        }
    }

    /// A page is about to be processed
    pub fn on_page_start(&self) {
        self.pages.fetch_add(1, Ordering::Relaxed);
    }

    /// One document finished, whatever the outcome
    pub fn on_document_processed(&self, outcome: &OperationOutcome) {
        self.documents_seen.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            OperationOutcome::Written => &self.writes_performed,
            OperationOutcome::Skipped => &self.skipped,
            OperationOutcome::Failed(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            documents_seen: self.documents_seen.load(Ordering::Relaxed),
            writes_performed: self.writes_performed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            pages: self.pages.load(Ordering::Relaxed),
            elapsed_ms: self.elapsed_ms(),
        }
    }

    /// Build the final summary
    pub fn summary(
        &self,
        conflicts: u64,
        cancelled: bool,
        stranded: Vec<StrandedDocument>,
    ) -> BatchSummary {
        let snapshot = self.snapshot();
        BatchSummary {
            documents_seen: snapshot.documents_seen,
            writes_performed: snapshot.writes_performed,
            skipped: snapshot.skipped,
            failed: snapshot.failed,
            conflicts,
            pages: snapshot.pages,
            elapsed_ms: snapshot.elapsed_ms,
            dry_run: self.dry_run,
            cancelled,
            started_at: self.started_at,
            finished_at: Utc::now(),
            stranded,
        }
    }
}
