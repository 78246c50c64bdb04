//! Shared test utilities
//!
//! `InstrumentedStore` wraps a `MemoryStore` and records every call, the
//! number of write/delete calls in flight, and can inject failures.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use docshift::document::{Document, QueryFilter};
use docshift::engine::CancellationFlag;
use docshift::store::{DocumentStore, MemoryStore, Page, StoreError, StoreFuture};
use serde_json::json;

/// One observed store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Query,
    Replace { id: String, partition_key: String },
    Delete { id: String, partition_key: String },
    Upsert { id: String, partition_key: String },
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Call::Query)
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Call::Query => None,
            Call::Replace { id, .. } | Call::Delete { id, .. } | Call::Upsert { id, .. } => {
                Some(id)
            }
        }
    }
}

/// Store double with call log, concurrency high-water mark and fault injection
#[derive(Debug, Default)]
pub struct InstrumentedStore {
    pub inner: MemoryStore,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    high_water: AtomicUsize,
    write_delay_ms: AtomicUsize,
    fail_upserts: AtomicBool,
    /// Query calls allowed before every further query fails; 0 = never fail
    queries_before_failure: AtomicUsize,
    query_count: AtomicUsize,
    /// Simulate a concurrent writer touching the document right before replace
    race_replaces: AtomicBool,
    /// Cancelled as soon as the first delete is issued
    cancel_on_delete: Mutex<Option<CancellationFlag>>,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl InstrumentedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_write_delay(self, millis: usize) -> Self {
        self.write_delay_ms.store(millis, Ordering::SeqCst);
        self
    }

    pub fn fail_upserts(&self) {
        self.fail_upserts.store(true, Ordering::SeqCst);
    }

    pub fn fail_queries_after(&self, successful_queries: usize) {
        self.queries_before_failure
            .store(successful_queries, Ordering::SeqCst);
    }

    pub fn race_replaces(&self) {
        self.race_replaces.store(true, Ordering::SeqCst);
    }

    pub fn cancel_on_delete(&self, flag: CancellationFlag) {
        *self.cancel_on_delete.lock().unwrap() = Some(flag);
    }

    pub fn query_calls(&self) -> usize {
        self.calls().iter().filter(|c| **c == Call::Query).count()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn calls_for(&self, id: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.id() == Some(id))
            .collect()
    }

    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    async fn enter(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water.fetch_max(now, Ordering::SeqCst);
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        InFlight(&self.in_flight)
    }
}

impl DocumentStore for InstrumentedStore {
    fn query_page<'a>(
        &'a self,
        collection: &'a str,
        filter: &'a QueryFilter,
        page_size: usize,
        continuation: Option<&'a str>,
    ) -> StoreFuture<'a, Page> {
        Box::pin(async move {
            self.record(Call::Query);
            let count = self.query_count.fetch_add(1, Ordering::SeqCst);
            let limit = self.queries_before_failure.load(Ordering::SeqCst);
            if limit > 0 && count >= limit {
                return Err(StoreError::Unavailable("injected query failure".into()));
            }
            self.inner
                .query_page(collection, filter, page_size, continuation)
                .await
        })
    }

    fn replace<'a>(
        &'a self,
        collection: &'a str,
        document: &'a Document,
        if_match: &'a str,
    ) -> StoreFuture<'a, String> {
        Box::pin(async move {
            self.record(Call::Replace {
                id: document.id.clone(),
                partition_key: document.partition_key.clone(),
            });
            let _guard = self.enter().await;
            if self.race_replaces.load(Ordering::SeqCst) {
                if let Some(current) =
                    self.inner
                        .get(collection, &document.partition_key, &document.id)
                {
                    self.inner
                        .upsert(collection, &current.with_field("touchedBy", json!("other")))
                        .await?;
                }
            }
            self.inner.replace(collection, document, if_match).await
        })
    }

    fn delete<'a>(
        &'a self,
        collection: &'a str,
        partition_key: &'a str,
        id: &'a str,
        if_match: Option<&'a str>,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.record(Call::Delete {
                id: id.to_string(),
                partition_key: partition_key.to_string(),
            });
            let flag = self.cancel_on_delete.lock().unwrap().clone();
            if let Some(flag) = flag {
                flag.cancel();
            }
            let _guard = self.enter().await;
            self.inner
                .delete(collection, partition_key, id, if_match)
                .await
        })
    }

    fn upsert<'a>(
        &'a self,
        collection: &'a str,
        document: &'a Document,
    ) -> StoreFuture<'a, String> {
        Box::pin(async move {
            self.record(Call::Upsert {
                id: document.id.clone(),
                partition_key: document.partition_key.clone(),
            });
            let _guard = self.enter().await;
            if self.fail_upserts.load(Ordering::SeqCst) {
                return Err(StoreError::Io("injected upsert failure".into()));
            }
            self.inner.upsert(collection, document).await
        })
    }
}

/// Seed `count` timesheets, alternating between the given customer names
pub fn seed_timesheets(store: &MemoryStore, collection: &str, customers: &[&str], count: usize) {
    for i in 0..count {
        let customer = customers[i % customers.len()];
        store
            .insert(
                collection,
                Document::new(format!("ts{:03}", i), "legacy")
                    .with_field("_type", json!("Timesheet"))
                    .with_field("customer", json!(customer))
                    .with_field("hours", json!(i % 9)),
            )
            .unwrap();
    }
}

/// Seed `count` closed B2C users in one partition
pub fn seed_users(store: &MemoryStore, collection: &str, count: usize) {
    for i in 0..count {
        store
            .insert(
                collection,
                Document::new(format!("user{:03}", i), "users")
                    .with_field("_type", json!("MT.Users.B2C"))
                    .with_field("userId", json!(format!("u-{}", i)))
                    .with_field("closed", json!(true)),
            )
            .unwrap();
    }
}
