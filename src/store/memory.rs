//! In-memory document store
//!
//! Documents live in a per-collection `BTreeMap` keyed by
//! `(partitionKey, id)`, which gives the key order the cursor relies on.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::RwLock;

use crate::document::{Document, QueryFilter};

use super::cursor::Cursor;
use super::errors::{StoreError, StoreResult};
use super::{check_version, next_version, DocumentStore, Page, StoreFuture};

type Key = (String, String);
type Collections = HashMap<String, BTreeMap<Key, Document>>;

/// In-memory partitioned store
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document, assigning it a version; returns the stored copy
    pub fn insert(&self, collection: &str, mut document: Document) -> StoreResult<Document> {
        let mut data = self.write_lock()?;
        document.version = next_version();
        data.entry(collection.to_string()).or_default().insert(
            (document.partition_key.clone(), document.id.clone()),
            document.clone(),
        );
        Ok(document)
    }

    /// Read a document by address
    pub fn get(&self, collection: &str, partition_key: &str, id: &str) -> Option<Document> {
        let data = self.data.read().ok()?;
        data.get(collection)
            .and_then(|c| c.get(&(partition_key.to_string(), id.to_string())))
            .cloned()
    }

    /// Find a document by id in any partition
    pub fn find_by_id(&self, collection: &str, id: &str) -> Vec<Document> {
        let Ok(data) = self.data.read() else {
            return Vec::new();
        };
        data.get(collection)
            .map(|c| c.values().filter(|d| d.id == id).cloned().collect())
            .unwrap_or_default()
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: &str) -> usize {
        self.data
            .read()
            .map(|d| d.get(collection).map(BTreeMap::len).unwrap_or(0))
            .unwrap_or(0)
    }

    fn write_lock(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, Collections>> {
        self.data
            .write()
            .map_err(|_| StoreError::Unavailable("Lock poisoned".into()))
    }

    fn query_sync(
        &self,
        collection: &str,
        filter: &QueryFilter,
        page_size: usize,
        continuation: Option<&str>,
    ) -> StoreResult<Page> {
        let start = continuation.map(Cursor::decode).transpose()?;
        let data = self
            .data
            .read()
            .map_err(|_| StoreError::Unavailable("Lock poisoned".into()))?;

        let Some(coll) = data.get(collection) else {
            return Ok(Page::default());
        };

        let lower = match start {
            Some(c) => Bound::Excluded((c.partition_key, c.id)),
            None => Bound::Unbounded,
        };

        let page_size = page_size.max(1);
        let mut documents: Vec<Document> = coll
            .range((lower, Bound::Unbounded))
            .map(|(_, doc)| doc)
            .filter(|doc| filter.matches(doc))
            .take(page_size + 1)
            .cloned()
            .collect();

        let continuation = if documents.len() > page_size {
            documents.truncate(page_size);
            documents
                .last()
                .map(|d| Cursor::new(d.partition_key.clone(), d.id.clone()).encode())
        } else {
            None
        };

        Ok(Page {
            documents,
            continuation,
        })
    }

    fn replace_sync(
        &self,
        collection: &str,
        document: &Document,
        if_match: &str,
    ) -> StoreResult<String> {
        let mut data = self.write_lock()?;
        let key = (document.partition_key.clone(), document.id.clone());

        let current = data
            .get_mut(collection)
            .and_then(|c| c.get_mut(&key))
            .ok_or_else(|| {
                StoreError::not_found(collection, &document.partition_key, &document.id)
            })?;

        check_version(&document.id, Some(if_match), &current.version)?;

        let mut stored = document.clone();
        stored.version = next_version();
        *current = stored;
        Ok(current.version.clone())
    }

    fn delete_sync(
        &self,
        collection: &str,
        partition_key: &str,
        id: &str,
        if_match: Option<&str>,
    ) -> StoreResult<()> {
        let mut data = self.write_lock()?;
        let key = (partition_key.to_string(), id.to_string());

        let coll = data
            .get_mut(collection)
            .ok_or_else(|| StoreError::not_found(collection, partition_key, id))?;
        let current = coll
            .get(&key)
            .ok_or_else(|| StoreError::not_found(collection, partition_key, id))?;

        check_version(id, if_match, &current.version)?;
        coll.remove(&key);
        Ok(())
    }

    fn upsert_sync(&self, collection: &str, document: &Document) -> StoreResult<String> {
        let mut data = self.write_lock()?;
        let mut stored = document.clone();
        stored.version = next_version();
        let version = stored.version.clone();

        data.entry(collection.to_string())
            .or_default()
            .insert((stored.partition_key.clone(), stored.id.clone()), stored);

        Ok(version)
    }
}

impl DocumentStore for MemoryStore {
    fn query_page<'a>(
        &'a self,
        collection: &'a str,
        filter: &'a QueryFilter,
        page_size: usize,
        continuation: Option<&'a str>,
    ) -> StoreFuture<'a, Page> {
        Box::pin(async move { self.query_sync(collection, filter, page_size, continuation) })
    }

    fn replace<'a>(
        &'a self,
        collection: &'a str,
        document: &'a Document,
        if_match: &'a str,
    ) -> StoreFuture<'a, String> {
        Box::pin(async move { self.replace_sync(collection, document, if_match) })
    }

    fn delete<'a>(
        &'a self,
        collection: &'a str,
        partition_key: &'a str,
        id: &'a str,
        if_match: Option<&'a str>,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move { self.delete_sync(collection, partition_key, id, if_match) })
    }

    fn upsert<'a>(
        &'a self,
        collection: &'a str,
        document: &'a Document,
    ) -> StoreFuture<'a, String> {
        Box::pin(async move { self.upsert_sync(collection, document) })
    }
}
