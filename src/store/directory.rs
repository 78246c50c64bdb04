//! Directory-backed document store
//!
//! Layout: `<root>/<collection>/<b64(partitionKey)>/<b64(id)>.json`.
//!
//! Writes go to a temp file that is renamed over the target, so readers
//! never observe a partial document. Compare-and-write sequences are
//! serialized by a single async mutex; this store is meant for one
//! process at a time.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use tokio::fs;
use tokio::sync::Mutex;

use crate::document::{Document, QueryFilter};

use super::cursor::Cursor;
use super::errors::{StoreError, StoreResult};
use super::{check_version, next_version, DocumentStore, Page, StoreFuture};

const DOCUMENT_EXT: &str = "json";

/// File-per-document store rooted at a directory
#[derive(Debug)]
pub struct DirectoryStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl DirectoryStore {
    /// Open a store rooted at `root`; the directory is created on first write
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read a document by address
    pub async fn get(
        &self,
        collection: &str,
        partition_key: &str,
        id: &str,
    ) -> StoreResult<Option<Document>> {
        read_document(&self.document_path(collection, partition_key, id)).await
    }

    /// Seed a document, assigning it a version; returns the stored copy
    pub async fn insert(&self, collection: &str, mut document: Document) -> StoreResult<Document> {
        let _guard = self.write_lock.lock().await;
        document.version = next_version();
        self.write_document(collection, &document).await?;
        Ok(document)
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.root.join(collection)
    }

    fn document_path(&self, collection: &str, partition_key: &str, id: &str) -> PathBuf {
        self.collection_path(collection)
            .join(encode_name(partition_key))
            .join(format!("{}.{}", encode_name(id), DOCUMENT_EXT))
    }

    async fn write_document(&self, collection: &str, document: &Document) -> StoreResult<()> {
        let path = self.document_path(collection, &document.partition_key, &document.id);
        let dir = path
            .parent()
            .ok_or_else(|| StoreError::Io(format!("No parent for {}", path.display())))?;
        fs::create_dir_all(dir).await?;

        let temp_path = dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        let bytes = serde_json::to_vec_pretty(document)?;
        fs::write(&temp_path, bytes).await?;
        fs::rename(&temp_path, &path).await?;
        Ok(())
    }

    /// All keys in a collection, in cursor order
    ///
    /// Re-lists the whole collection for every page: O(collection) memory
    /// per call and quadratic directory reads over a run. Acceptable for
    /// local stores; a store with an ordered index should page from it.
    async fn list_keys(&self, collection: &str) -> StoreResult<BTreeSet<(String, String)>> {
        let mut keys = BTreeSet::new();

        let mut partitions = match fs::read_dir(self.collection_path(collection)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(e.into()),
        };

        while let Some(partition) = partitions.next_entry().await? {
            if !partition.file_type().await?.is_dir() {
                continue;
            }
            let Some(partition_key) = decode_name(&partition.file_name().to_string_lossy())
            else {
                continue;
            };

            let mut files = fs::read_dir(partition.path()).await?;
            while let Some(file) = files.next_entry().await? {
                let path = file.path();
                if path.extension().and_then(|e| e.to_str()) != Some(DOCUMENT_EXT) {
                    continue;
                }
                let Some(id) = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(decode_name)
                else {
                    continue;
                };
                keys.insert((partition_key.clone(), id));
            }
        }

        Ok(keys)
    }

    async fn query(
        &self,
        collection: &str,
        filter: &QueryFilter,
        page_size: usize,
        continuation: Option<&str>,
    ) -> StoreResult<Page> {
        let start = continuation.map(Cursor::decode).transpose()?;
        let page_size = page_size.max(1);
        let keys = self.list_keys(collection).await?;

        let mut documents = Vec::with_capacity(page_size + 1);
        for (partition_key, id) in keys {
            if let Some(ref start) = start {
                if (partition_key.as_str(), id.as_str()) <= start.key() {
                    continue;
                }
            }
            // Removed between listing and reading
            let Some(doc) =
                read_document(&self.document_path(collection, &partition_key, &id)).await?
            else {
                continue;
            };
            if filter.matches(&doc) {
                documents.push(doc);
                if documents.len() > page_size {
                    break;
                }
            }
        }

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

    async fn replace_document(
        &self,
        collection: &str,
        document: &Document,
        if_match: &str,
    ) -> StoreResult<String> {
        let _guard = self.write_lock.lock().await;
        let path = self.document_path(collection, &document.partition_key, &document.id);

        let current = read_document(&path).await?.ok_or_else(|| {
            StoreError::not_found(collection, &document.partition_key, &document.id)
        })?;
        check_version(&document.id, Some(if_match), &current.version)?;

        let mut stored = document.clone();
        stored.version = next_version();
        self.write_document(collection, &stored).await?;
        Ok(stored.version)
    }

    async fn delete_document(
        &self,
        collection: &str,
        partition_key: &str,
        id: &str,
        if_match: Option<&str>,
    ) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.document_path(collection, partition_key, id);

        let current = read_document(&path)
            .await?
            .ok_or_else(|| StoreError::not_found(collection, partition_key, id))?;
        check_version(id, if_match, &current.version)?;

        fs::remove_file(&path).await?;
        Ok(())
    }

    async fn upsert_document(&self, collection: &str, document: &Document) -> StoreResult<String> {
        let _guard = self.write_lock.lock().await;
        let mut stored = document.clone();
        stored.version = next_version();
        self.write_document(collection, &stored).await?;
        Ok(stored.version)
    }
}

impl DocumentStore for DirectoryStore {
    fn query_page<'a>(
        &'a self,
        collection: &'a str,
        filter: &'a QueryFilter,
        page_size: usize,
        continuation: Option<&'a str>,
    ) -> StoreFuture<'a, Page> {
        Box::pin(self.query(collection, filter, page_size, continuation))
    }

    fn replace<'a>(
        &'a self,
        collection: &'a str,
        document: &'a Document,
        if_match: &'a str,
    ) -> StoreFuture<'a, String> {
        Box::pin(self.replace_document(collection, document, if_match))
    }

    fn delete<'a>(
        &'a self,
        collection: &'a str,
        partition_key: &'a str,
        id: &'a str,
        if_match: Option<&'a str>,
    ) -> StoreFuture<'a, ()> {
        Box::pin(self.delete_document(collection, partition_key, id, if_match))
    }

    fn upsert<'a>(
        &'a self,
        collection: &'a str,
        document: &'a Document,
    ) -> StoreFuture<'a, String> {
        Box::pin(self.upsert_document(collection, document))
    }
}

async fn read_document(path: &Path) -> StoreResult<Option<Document>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn encode_name(name: &str) -> String {
    URL_SAFE_NO_PAD.encode(name)
}

fn decode_name(encoded: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}
