//! Document store boundary
//!
//! The engine consumes these primitives; it never implements a store of its
//! own. Two implementations ship with the crate:
//! - `MemoryStore`: in-process, used by tests
//! - `DirectoryStore`: one JSON file per document on local disk
//!
//! # Contract
//!
//! - `replace` succeeds only if the stored version equals `if_match`
//! - `delete` returning `Ok(())` means a document was removed; an absent
//!   document is `StoreError::NotFound`
//! - `upsert` is unconditional
//! - every successful write assigns a fresh version token

mod cursor;
mod directory;
mod errors;
mod memory;

pub use cursor::Cursor;
pub use directory::DirectoryStore;
pub use errors::{StoreError, StoreResult};
pub use memory::MemoryStore;

use std::future::Future;
use std::pin::Pin;

use crate::document::{Document, QueryFilter};

/// Boxed future returned by store operations
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = StoreResult<T>> + Send + 'a>>;

/// One page of a query result
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Documents in store order, at most the requested page size
    pub documents: Vec<Document>,
    /// `None` on the final page
    pub continuation: Option<String>,
}

impl Page {
    /// Number of documents in the page
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the page holds no documents
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Whether this is the last page
    pub fn is_final(&self) -> bool {
        self.continuation.is_none()
    }
}

/// Read/query/write primitives of a partitioned document store
pub trait DocumentStore: Send + Sync {
    /// Fetch one page of documents matching `filter`
    fn query_page<'a>(
        &'a self,
        collection: &'a str,
        filter: &'a QueryFilter,
        page_size: usize,
        continuation: Option<&'a str>,
    ) -> StoreFuture<'a, Page>;

    /// Replace the document at `(document.partition_key, document.id)`
    /// if its current version equals `if_match`; returns the new version
    fn replace<'a>(
        &'a self,
        collection: &'a str,
        document: &'a Document,
        if_match: &'a str,
    ) -> StoreFuture<'a, String>;

    /// Delete the document at `(partition_key, id)`, optionally requiring
    /// its current version to equal `if_match`
    fn delete<'a>(
        &'a self,
        collection: &'a str,
        partition_key: &'a str,
        id: &'a str,
        if_match: Option<&'a str>,
    ) -> StoreFuture<'a, ()>;

    /// Insert or overwrite the document; returns the new version
    fn upsert<'a>(&'a self, collection: &'a str, document: &'a Document)
        -> StoreFuture<'a, String>;
}

/// Fresh version token
pub(crate) fn next_version() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Check an optimistic-concurrency expectation
pub(crate) fn check_version(id: &str, expected: Option<&str>, actual: &str) -> StoreResult<()> {
    match expected {
        Some(expected) if expected != actual => Err(StoreError::VersionMismatch {
            id: id.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }),
        _ => Ok(()),
    }
}
