//! Conditional writer
//!
//! Applies a transform's output to the store under optimistic concurrency.
//!
//! - Same address: one conditional replace, guarded by the version captured
//!   at read time.
//! - Changed address (partition key, id, or target collection): a
//!   `Relocation`, i.e. conditional delete of the source followed by an
//!   unconditional upsert of the replacement.
//!
//! # Relocation is not atomic
//!
//! The store offers no cross-partition transaction. If the delete succeeds
//! and the upsert does not (I/O error, process death), the document is gone
//! from the store. That state is reported as
//! `DocumentError::RelocationPartialFailure`, which carries the unwritten
//! replacement so it can be re-inserted by hand.
//!
//! No retries.

use std::sync::Arc;

use crate::crash_point::{self, points};
use crate::document::Document;
use crate::observability::{Event, Logger};
use crate::store::{DocumentStore, StoreError};

use super::errors::DocumentError;
use super::outcome::OperationOutcome;

/// How a replacement reaches the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePath {
    /// Conditional replace at the original address
    InPlace,
    /// Conditional delete, then upsert at the new address
    Relocate,
}

impl WritePath {
    pub fn as_str(&self) -> &'static str {
        match self {
            WritePath::InPlace => "in_place",
            WritePath::Relocate => "relocate",
        }
    }
}

/// Phase of a relocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationPhase {
    /// Nothing done yet
    Pending,
    /// Source removed, replacement not yet written; the document exists
    /// nowhere in the store
    SourceDeleted,
    /// Replacement written
    Completed,
}

/// Two-step move of a document to a new address
pub struct Relocation<'a> {
    store: &'a dyn DocumentStore,
    source_collection: &'a str,
    target_collection: &'a str,
    original: &'a Document,
    replacement: Document,
    phase: RelocationPhase,
}

impl<'a> Relocation<'a> {
    pub fn new(
        store: &'a dyn DocumentStore,
        source_collection: &'a str,
        target_collection: &'a str,
        original: &'a Document,
        replacement: Document,
    ) -> Self {
        Self {
            store,
            source_collection,
            target_collection,
            original,
            replacement,
            phase: RelocationPhase::Pending,
        }
    }

    /// Current phase
    pub fn phase(&self) -> RelocationPhase {
        self.phase
    }

    /// Step 1: delete the source, guarded by the original version
    pub async fn delete_source(&mut self) -> Result<(), DocumentError> {
        if self.phase != RelocationPhase::Pending {
            return Err(self.out_of_order("delete_source"));
        }

        crash_point::maybe_crash(points::RELOCATION_BEFORE_DELETE);
        self.store
            .delete(
                self.source_collection,
                &self.original.partition_key,
                &self.original.id,
                Some(self.original.version.as_str()),
            )
            .await
            .map_err(|e| DocumentError::from_conditional(&self.original.id, e))?;

        self.phase = RelocationPhase::SourceDeleted;
        Ok(())
    }

    /// Step 2: write the replacement at its new address
    pub async fn write_target(&mut self) -> Result<String, DocumentError> {
        if self.phase != RelocationPhase::SourceDeleted {
            return Err(self.out_of_order("write_target"));
        }

        crash_point::maybe_crash(points::RELOCATION_AFTER_DELETE);
        match self
            .store
            .upsert(self.target_collection, &self.replacement)
            .await
        {
            Ok(version) => {
                self.phase = RelocationPhase::Completed;
                Ok(version)
            }
            Err(source) => Err(self.stranded(source)),
        }
    }

    /// Run both steps
    pub async fn run(mut self) -> Result<String, DocumentError> {
        self.delete_source().await?;
        self.write_target().await
    }

    fn stranded(&self, source: StoreError) -> DocumentError {
        DocumentError::RelocationPartialFailure {
            id: self.original.id.clone(),
            from_partition: self.original.partition_key.clone(),
            to_partition: self.replacement.partition_key.clone(),
            document: Box::new(self.replacement.clone()),
            source,
        }
    }

    fn out_of_order(&self, step: &str) -> DocumentError {
        DocumentError::Aborted(format!(
            "relocation step {} invalid in phase {:?}",
            step, self.phase
        ))
    }
}

/// Writes transform output back to the store
pub struct ConditionalWriter {
    store: Arc<dyn DocumentStore>,
    input_collection: String,
    output_collection: String,
    logger: Logger,
}

impl ConditionalWriter {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        input_collection: impl Into<String>,
        output_collection: impl Into<String>,
        logger: Logger,
    ) -> Self {
        Self {
            store,
            input_collection: input_collection.into(),
            output_collection: output_collection.into(),
            logger,
        }
    }

    /// Which path a replacement will take
    pub fn plan(&self, original: &Document, replacement: &Document) -> WritePath {
        if original.changes_partition(replacement)
            || original.id != replacement.id
            || self.input_collection != self.output_collection
        {
            WritePath::Relocate
        } else {
            WritePath::InPlace
        }
    }

    /// Apply `replacement` in place of `original`
    ///
    /// In dry run nothing reaches the store and the outcome is `Written`.
    pub async fn write(
        &self,
        original: &Document,
        replacement: Document,
        dry_run: bool,
    ) -> OperationOutcome {
        let path = self.plan(original, &replacement);

        if dry_run {
            self.logger.trace(
                Event::DocumentWritten,
                &[("id", &original.id), ("path", path.as_str()), ("dry_run", "true")],
            );
            return OperationOutcome::Written;
        }

        let to_partition = replacement.partition_key.clone();
        let result = match path {
            WritePath::InPlace => self.replace(original, &replacement).await,
            WritePath::Relocate => {
                Relocation::new(
                    self.store.as_ref(),
                    &self.input_collection,
                    &self.output_collection,
                    original,
                    replacement,
                )
                .run()
                .await
            }
        };

        match result {
            Ok(version) => {
                self.logger.trace(
                    Event::DocumentWritten,
                    &[
                        ("id", &original.id),
                        ("path", path.as_str()),
                        ("partition_key", &to_partition),
                        ("version", &version),
                    ],
                );
                OperationOutcome::Written
            }
            Err(e) => OperationOutcome::Failed(e),
        }
    }

    /// Unconditionally delete `original` from the input collection
    ///
    /// A document that is already gone is `Skipped`.
    pub async fn delete(&self, original: &Document, dry_run: bool) -> OperationOutcome {
        if dry_run {
            self.logger.trace(
                Event::DocumentDeleted,
                &[("id", &original.id), ("dry_run", "true")],
            );
            return OperationOutcome::Written;
        }

        let result = self
            .store
            .delete(
                &self.input_collection,
                &original.partition_key,
                &original.id,
                None,
            )
            .await;

        match result {
            Ok(()) => {
                self.logger.trace(
                    Event::DocumentDeleted,
                    &[("id", &original.id), ("partition_key", &original.partition_key)],
                );
                OperationOutcome::Written
            }
            Err(StoreError::NotFound { .. }) => {
                self.logger.warn(
                    Event::DocumentSkipped,
                    &[("id", &original.id), ("reason", "already deleted")],
                );
                OperationOutcome::Skipped
            }
            Err(e) => OperationOutcome::Failed(DocumentError::Store(e)),
        }
    }

    async fn replace(
        &self,
        original: &Document,
        replacement: &Document,
    ) -> Result<String, DocumentError> {
        crash_point::maybe_crash(points::REPLACE_BEFORE_WRITE);
        self.store
            .replace(&self.input_collection, replacement, &original.version)
            .await
            .map_err(|e| DocumentError::from_conditional(&original.id, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn setup() -> (Arc<MemoryStore>, ConditionalWriter) {
        let store = Arc::new(MemoryStore::new());
        let writer = ConditionalWriter::new(store.clone(), "c", "c", Logger::disabled());
        (store, writer)
    }

    #[tokio::test]
    async fn test_in_place_replace() {
        let (store, writer) = setup();
        let original = store.insert("c", Document::new("d1", "p1")).unwrap();
        let replacement = original.clone().with_field("status", json!("Closed"));

        assert_eq!(writer.plan(&original, &replacement), WritePath::InPlace);
        let outcome = writer.write(&original, replacement, false).await;
        assert!(outcome.is_written());

        let stored = store.get("c", "p1", "d1").unwrap();
        assert_eq!(stored.body["status"], "Closed");
        assert_ne!(stored.version, original.version);
    }

    #[tokio::test]
    async fn test_stale_version_is_a_conflict() {
        let (store, writer) = setup();
        let original = store.insert("c", Document::new("d1", "p1")).unwrap();

        // Someone else writes after our read
        let concurrent = store
            .upsert("c", &original.clone().with_field("by", json!("other")))
            .await
            .unwrap();

        let outcome = writer
            .write(&original, original.clone().with_field("by", json!("us")), false)
            .await;
        assert!(outcome.error().unwrap().is_conflict());

        let stored = store.get("c", "p1", "d1").unwrap();
        assert_eq!(stored.version, concurrent);
        assert_eq!(stored.body["by"], "other");
    }

    #[tokio::test]
    async fn test_relocation_moves_document() {
        let (store, writer) = setup();
        let original = store.insert("c", Document::new("d1", "old")).unwrap();
        let mut replacement = original.clone();
        replacement.partition_key = "new".to_string();

        assert_eq!(writer.plan(&original, &replacement), WritePath::Relocate);
        assert!(writer.write(&original, replacement, false).await.is_written());

        assert!(store.get("c", "old", "d1").is_none());
        assert!(store.get("c", "new", "d1").is_some());
    }

    #[tokio::test]
    async fn test_relocation_phases() {
        let store = MemoryStore::new();
        let original = store.insert("c", Document::new("d1", "old")).unwrap();
        let mut replacement = original.clone();
        replacement.partition_key = "new".to_string();

        let mut relocation = Relocation::new(&store, "c", "c", &original, replacement);
        assert_eq!(relocation.phase(), RelocationPhase::Pending);
        assert!(relocation.write_target().await.is_err());

        relocation.delete_source().await.unwrap();
        assert_eq!(relocation.phase(), RelocationPhase::SourceDeleted);
        // Intermediate state: the document is nowhere
        assert!(store.find_by_id("c", "d1").is_empty());

        relocation.write_target().await.unwrap();
        assert_eq!(relocation.phase(), RelocationPhase::Completed);
        assert_eq!(store.find_by_id("c", "d1").len(), 1);
    }

    #[tokio::test]
    async fn test_relocation_conflict_keeps_source() {
        let (store, writer) = setup();
        let mut original = store.insert("c", Document::new("d1", "old")).unwrap();
        original.version = "stale".to_string();
        let mut replacement = original.clone();
        replacement.partition_key = "new".to_string();

        let outcome = writer.write(&original, replacement, false).await;
        assert!(outcome.error().unwrap().is_conflict());
        assert!(store.get("c", "old", "d1").is_some());
        assert!(store.get("c", "new", "d1").is_none());
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let (store, writer) = setup();
        let original = store.insert("c", Document::new("d1", "old")).unwrap();
        let mut replacement = original.clone();
        replacement.partition_key = "new".to_string();

        assert!(writer.write(&original, replacement, true).await.is_written());
        assert!(writer.delete(&original, true).await.is_written());
        assert_eq!(store.get("c", "old", "d1").unwrap(), original);
    }

    #[tokio::test]
    async fn test_delete_polarity() {
        let (store, writer) = setup();
        let original = store.insert("c", Document::new("d1", "p")).unwrap();

        assert!(writer.delete(&original, false).await.is_written());
        assert!(store.get("c", "p", "d1").is_none());
        assert!(writer.delete(&original, false).await.is_skipped());
    }

    #[tokio::test]
    async fn test_different_output_collection_relocates() {
        let store = Arc::new(MemoryStore::new());
        let writer = ConditionalWriter::new(store.clone(), "in", "out", Logger::disabled());
        let original = store.insert("in", Document::new("d1", "p")).unwrap();
        let replacement = original.clone().with_field("migrated", json!(true));

        assert_eq!(writer.plan(&original, &replacement), WritePath::Relocate);
        assert!(writer.write(&original, replacement, false).await.is_written());
        assert_eq!(store.count("in"), 0);
        assert_eq!(store.get("out", "p", "d1").unwrap().body["migrated"], true);
    }
}
