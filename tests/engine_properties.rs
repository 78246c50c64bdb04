//! Engine behaviour tests
//!
//! Drives `MutationEngine` against an instrumented store and checks the
//! observable guarantees:
//! - skipped documents are never written
//! - same-partition edits are exactly one conditional replace
//! - relocations are exactly delete-then-upsert, and a failed upsert is
//!   reported as data loss with the original gone
//! - dry run issues no mutation yet counts writes
//! - every page is counted and every document seen once
//! - write/delete concurrency never exceeds the configured bound
//! - per-document failures never abort the batch; query failures do, and
//!   still hand back the documents stranded so far
//! - cancellation stops between pages and never splits a relocation

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::{seed_timesheets, seed_users, Call, InstrumentedStore};
use docshift::document::{Document, QueryFilter};
use docshift::engine::{
    BatchSummary, CancellationFlag, EngineError, MutationEngine, OperationMode, RunOptions,
};
use docshift::observability::{Event, Logger};
use docshift::transform::{
    SelectAllTransform, Transform, TransformError, TransformRegistry, TransformResult,
    UserStatusTransform,
};
use serde_json::json;

// =============================================================================
// Test Utilities
// =============================================================================

const TIMESHEETS: &str = "timesheets";
const USERS: &str = "users";

fn options(collection: &str, page_size: usize, max_concurrency: usize) -> RunOptions {
    let mut options = RunOptions::new(collection);
    options.dry_run = false;
    options.page_size = page_size;
    options.max_concurrency = max_concurrency;
    options
}

fn customer_transform() -> Arc<dyn Transform> {
    TransformRegistry::builtin()
        .create(
            "customer-partition",
            &json!({ "document_type": "Timesheet", "mapping": { "Acme": "K1", "Globex": "K2" } }),
        )
        .unwrap()
}

async fn run(
    store: &Arc<InstrumentedStore>,
    transform: Arc<dyn Transform>,
    options: RunOptions,
    logger: &Logger,
) -> Result<BatchSummary, EngineError> {
    MutationEngine::new(store.clone(), transform, options, logger.clone())
        .unwrap()
        .run()
        .await
}

/// Panics on one document, rewrites the rest
struct PanickyTransform {
    poison: String,
}

impl Transform for PanickyTransform {
    fn name(&self) -> &str {
        "panicky"
    }

    fn query(&self) -> QueryFilter {
        QueryFilter::all()
    }

    fn apply(&self, document: &Document) -> Result<TransformResult, TransformError> {
        if document.id == self.poison {
            panic!("cannot handle {}", document.id);
        }
        Ok(TransformResult::Replace(
            document.clone().with_field("touched", json!(true)),
        ))
    }
}

// =============================================================================
// Skip
// =============================================================================

#[tokio::test]
async fn test_skip_issues_no_write() {
    let store = Arc::new(InstrumentedStore::new());
    seed_users(&store.inner, USERS, 12);

    let summary = run(&store, Arc::new(SelectAllTransform), options(USERS, 5, 4), &Logger::disabled())
        .await
        .unwrap();

    assert_eq!(summary.documents_seen, 12);
    assert_eq!(summary.skipped, 12);
    assert_eq!(summary.writes_performed, 0);
    assert!(store.mutations().is_empty());
}

// =============================================================================
// In-place replace
// =============================================================================

#[tokio::test]
async fn test_same_partition_edit_is_one_replace() {
    let store = Arc::new(InstrumentedStore::new());
    seed_users(&store.inner, USERS, 7);

    let summary = run(&store, Arc::new(UserStatusTransform), options(USERS, 3, 2), &Logger::disabled())
        .await
        .unwrap();

    assert_eq!(summary.writes_performed, 7);
    for i in 0..7 {
        let id = format!("user{:03}", i);
        let calls = store.calls_for(&id);
        assert_eq!(calls.len(), 1, "calls for {}: {:?}", id, calls);
        assert!(matches!(calls[0], Call::Replace { .. }));

        let stored = store.inner.get(USERS, "users", &id).unwrap();
        assert_eq!(stored.body["status"], "Closed");
        assert_eq!(stored.body["userIdentifier"], json!(format!("u-{}", i)));
        assert!(stored.body.get("userId").is_none());
    }
}

#[tokio::test]
async fn test_lost_race_is_a_conflict_and_keeps_concurrent_write() {
    let store = Arc::new(InstrumentedStore::new());
    seed_users(&store.inner, USERS, 4);
    store.race_replaces();

    let logger = Logger::memory();
    let summary = run(&store, Arc::new(UserStatusTransform), options(USERS, 10, 2), &logger)
        .await
        .unwrap();

    assert_eq!(summary.documents_seen, 4);
    assert_eq!(summary.conflicts, 4);
    assert_eq!(summary.failed, 4);
    assert_eq!(summary.writes_performed, 0);
    assert_eq!(logger.lines_for(Event::DocumentConflict).len(), 4);

    // The concurrent writer's version survives untouched
    let stored = store.inner.get(USERS, "users", "user000").unwrap();
    assert_eq!(stored.body["touchedBy"], "other");
    assert!(stored.body.get("status").is_none());
    assert_eq!(stored.body["userId"], "u-0");
}

// =============================================================================
// Relocation
// =============================================================================

#[tokio::test]
async fn test_relocation_is_delete_then_upsert() {
    let store = Arc::new(InstrumentedStore::new());
    seed_timesheets(&store.inner, TIMESHEETS, &["Acme", "Globex"], 9);

    let summary = run(&store, customer_transform(), options(TIMESHEETS, 4, 3), &Logger::disabled())
        .await
        .unwrap();

    assert_eq!(summary.documents_seen, 9);
    assert_eq!(summary.writes_performed, 9);

    for i in 0..9 {
        let id = format!("ts{:03}", i);
        let calls = store.calls_for(&id);
        assert_eq!(calls.len(), 2, "calls for {}: {:?}", id, calls);
        assert_eq!(
            calls[0],
            Call::Delete {
                id: id.clone(),
                partition_key: "legacy".into()
            }
        );
        assert!(matches!(&calls[1], Call::Upsert { partition_key, .. } if partition_key.starts_with('K')));

        assert!(store.inner.get(TIMESHEETS, "legacy", &id).is_none());
        let moved = store.inner.find_by_id(TIMESHEETS, &id);
        assert_eq!(moved.len(), 1);
        assert!(moved[0].body.get("customer").is_none());
        assert_eq!(moved[0].body["customerId"], json!(moved[0].partition_key));
    }
}

#[tokio::test]
async fn test_failed_upsert_is_reported_as_data_loss() {
    let store = Arc::new(InstrumentedStore::new());
    seed_timesheets(&store.inner, TIMESHEETS, &["Acme"], 3);
    store.fail_upserts();

    let logger = Logger::memory();
    let summary = run(&store, customer_transform(), options(TIMESHEETS, 10, 1), &logger)
        .await
        .unwrap();

    assert_eq!(summary.failed, 3);
    assert_eq!(summary.writes_performed, 0);
    assert_eq!(summary.stranded.len(), 3);
    assert_eq!(logger.lines_for(Event::RelocationPartialFailure).len(), 3);

    for stranded in &summary.stranded {
        // The hazard is real: the document exists nowhere in the store
        assert!(store.inner.find_by_id(TIMESHEETS, &stranded.id).is_empty());
        assert_eq!(stranded.from_partition, "legacy");
        assert_eq!(stranded.to_partition, "K1");
        assert_eq!(stranded.document.body["customerId"], "K1");
    }
}

#[tokio::test]
async fn test_relocation_into_other_collection() {
    let store = Arc::new(InstrumentedStore::new());
    seed_timesheets(&store.inner, TIMESHEETS, &["Globex"], 2);

    let mut opts = options(TIMESHEETS, 10, 1);
    opts.output_collection = "timesheets_v2".into();
    let summary = run(&store, customer_transform(), opts, &Logger::disabled())
        .await
        .unwrap();

    assert_eq!(summary.writes_performed, 2);
    assert_eq!(store.inner.count(TIMESHEETS), 0);
    assert!(store.inner.get("timesheets_v2", "K2", "ts001").is_some());
}

// =============================================================================
// Dry run
// =============================================================================

#[tokio::test]
async fn test_dry_run_issues_no_mutation_but_counts_writes() {
    let store = Arc::new(InstrumentedStore::new());
    seed_timesheets(&store.inner, TIMESHEETS, &["Acme", "Globex"], 6);
    let before: Vec<Document> = (0..6)
        .map(|i| store.inner.get(TIMESHEETS, "legacy", &format!("ts{:03}", i)).unwrap())
        .collect();

    let mut opts = options(TIMESHEETS, 4, 2);
    opts.dry_run = true;
    let summary = run(&store, customer_transform(), opts, &Logger::disabled())
        .await
        .unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.writes_performed, 6);
    assert!(store.mutations().is_empty());
    for doc in before {
        assert_eq!(store.inner.get(TIMESHEETS, "legacy", &doc.id).unwrap(), doc);
    }
}

#[tokio::test]
async fn test_dry_run_delete_mode_keeps_documents() {
    let store = Arc::new(InstrumentedStore::new());
    seed_users(&store.inner, USERS, 5);

    let mut opts = options(USERS, 2, 2);
    opts.dry_run = true;
    opts.mode = OperationMode::DeleteDocuments;
    let summary = run(&store, Arc::new(SelectAllTransform), opts, &Logger::disabled())
        .await
        .unwrap();

    assert_eq!(summary.writes_performed, 5);
    assert_eq!(store.inner.count(USERS), 5);
    assert!(store.mutations().is_empty());
}

// =============================================================================
// Paging
// =============================================================================

#[tokio::test]
async fn test_documents_seen_equals_sum_of_pages() {
    let store = Arc::new(InstrumentedStore::new());
    seed_users(&store.inner, USERS, 23);

    let logger = Logger::memory();
    let summary = run(&store, Arc::new(SelectAllTransform), options(USERS, 5, 3), &logger)
        .await
        .unwrap();

    assert_eq!(summary.pages, 5);
    assert_eq!(summary.documents_seen, 23);
    let queries = store.calls().iter().filter(|c| **c == Call::Query).count();
    assert_eq!(queries, 5);

    let page_lines = logger.lines_for(Event::PageComplete);
    assert_eq!(page_lines.len(), 5);
    let last: serde_json::Value = serde_json::from_str(page_lines.last().unwrap()).unwrap();
    assert_eq!(last["documents_seen"], "23");
}

#[tokio::test]
async fn test_empty_result_processes_nothing() {
    let store = Arc::new(InstrumentedStore::new());

    let summary = run(&store, Arc::new(UserStatusTransform), options(USERS, 5, 3), &Logger::disabled())
        .await
        .unwrap();

    assert_eq!(summary.documents_seen, 0);
    assert_eq!(summary.pages, 1);
    assert!(store.mutations().is_empty());
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_in_flight_writes_respect_bound() {
    let store = Arc::new(InstrumentedStore::new().with_write_delay(5));
    seed_users(&store.inner, USERS, 30);

    let summary = run(&store, Arc::new(UserStatusTransform), options(USERS, 10, 3), &Logger::disabled())
        .await
        .unwrap();

    assert_eq!(summary.writes_performed, 30);
    assert!(store.high_water() <= 3, "observed {} in flight", store.high_water());
    assert!(store.high_water() >= 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_worker_is_sequential() {
    let store = Arc::new(InstrumentedStore::new().with_write_delay(2));
    seed_timesheets(&store.inner, TIMESHEETS, &["Acme"], 8);

    run(&store, customer_transform(), options(TIMESHEETS, 4, 1), &Logger::disabled())
        .await
        .unwrap();

    assert_eq!(store.high_water(), 1);
}

// =============================================================================
// Failure isolation
// =============================================================================

#[tokio::test]
async fn test_unmapped_customer_fails_alone() {
    let store = Arc::new(InstrumentedStore::new());
    let acme = store
        .inner
        .insert(
            TIMESHEETS,
            Document::new("t-acme", "legacy")
                .with_field("_type", json!("Timesheet"))
                .with_field("customer", json!("Acme")),
        )
        .unwrap();
    let unknown = store
        .inner
        .insert(
            TIMESHEETS,
            Document::new("t-unknown", "legacy")
                .with_field("_type", json!("Timesheet"))
                .with_field("customer", json!("Unknown")),
        )
        .unwrap();

    let logger = Logger::memory();
    let summary = run(&store, customer_transform(), options(TIMESHEETS, 10, 2), &logger)
        .await
        .unwrap();

    assert_eq!(summary.documents_seen, 2);
    assert_eq!(summary.writes_performed, 1);
    assert_eq!(summary.failed, 1);

    let moved = store.inner.get(TIMESHEETS, "K1", &acme.id).unwrap();
    assert_eq!(moved.body["customerId"], "K1");
    assert!(moved.body.get("customer").is_none());
    assert_eq!(moved.body["_type"], "Timesheet");

    assert_eq!(store.inner.get(TIMESHEETS, "legacy", &unknown.id).unwrap(), unknown);
    assert!(store.calls_for(&unknown.id).is_empty());

    let failures = logger.lines_for(Event::DocumentFailed);
    assert_eq!(failures.len(), 1);
    let line: serde_json::Value = serde_json::from_str(&failures[0]).unwrap();
    assert_eq!(line["id"], "t-unknown");
    assert_eq!(line["handler"], "customer-partition");
    assert!(line["error"].as_str().unwrap().contains("Unknown"));
}

#[tokio::test]
async fn test_panicking_transform_is_isolated() {
    let store = Arc::new(InstrumentedStore::new());
    seed_users(&store.inner, USERS, 6);

    let transform = Arc::new(PanickyTransform {
        poison: "user003".into(),
    });
    let logger = Logger::memory();
    let summary = run(&store, transform, options(USERS, 4, 3), &logger)
        .await
        .unwrap();

    assert_eq!(summary.documents_seen, 6);
    assert_eq!(summary.writes_performed, 5);
    assert_eq!(summary.failed, 1);

    let failures = logger.lines_for(Event::DocumentFailed);
    assert_eq!(failures.len(), 1);
    let line: serde_json::Value = serde_json::from_str(&failures[0]).unwrap();
    assert_eq!(line["id"], "user003");
    assert_eq!(line["code"], "WORKER_PANICKED");
}

#[tokio::test]
async fn test_query_failure_is_fatal() {
    let store = Arc::new(InstrumentedStore::new());
    seed_users(&store.inner, USERS, 10);
    store.fail_queries_after(1);

    let logger = Logger::memory();
    let err = run(&store, Arc::new(SelectAllTransform), options(USERS, 4, 2), &logger)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "QUERY_ERROR");
    assert_eq!(logger.lines_for(Event::QueryFailed).len(), 1);
    assert!(logger.lines_for(Event::BatchComplete).is_empty());
}

#[tokio::test]
async fn test_query_failure_still_returns_stranded_documents() {
    let store = Arc::new(InstrumentedStore::new());
    seed_timesheets(&store.inner, TIMESHEETS, &["Acme"], 6);
    store.fail_upserts();
    store.fail_queries_after(1);

    let err = run(&store, customer_transform(), options(TIMESHEETS, 3, 1), &Logger::memory())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "QUERY_ERROR");
    let stranded = err.stranded();
    assert_eq!(stranded.len(), 3);
    // The first page was deleted and never rewritten; the error is the only record
    assert_eq!(store.inner.count(TIMESHEETS), 3);
    for lost in stranded {
        assert!(store.inner.find_by_id(TIMESHEETS, &lost.id).is_empty());
        assert_eq!(lost.document.body["customerId"], "K1");
    }
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_mid_page_finishes_relocations_and_stops() {
    let store = Arc::new(InstrumentedStore::new().with_write_delay(10));
    seed_timesheets(&store.inner, TIMESHEETS, &["Acme", "Globex"], 12);
    let flag = CancellationFlag::new();
    store.cancel_on_delete(flag.clone());

    let logger = Logger::memory();
    let summary = MutationEngine::new(
        store.clone(),
        customer_transform(),
        options(TIMESHEETS, 4, 2),
        logger.clone(),
    )
    .unwrap()
    .with_cancellation(flag)
    .run()
    .await
    .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.pages, 1);
    assert_eq!(summary.documents_seen, 4);
    assert_eq!(summary.writes_performed, 4);
    assert_eq!(store.query_calls(), 1);
    assert_eq!(logger.lines_for(Event::BatchCancelled).len(), 1);

    let mut touched = HashSet::new();
    for call in store.mutations() {
        if let Some(id) = call.id() {
            touched.insert(id.to_string());
        }
    }
    assert_eq!(touched.len(), 4);
    for id in &touched {
        let calls = store.calls_for(id);
        assert_eq!(calls.len(), 2, "calls for {}: {:?}", id, calls);
        assert!(matches!(calls[0], Call::Delete { .. }));
        assert!(matches!(calls[1], Call::Upsert { .. }));
        assert_eq!(store.inner.find_by_id(TIMESHEETS, id).len(), 1);
    }
    assert!(store.inner.get(TIMESHEETS, "legacy", "ts011").is_some());
}

// =============================================================================
// Delete mode
// =============================================================================

#[tokio::test]
async fn test_delete_mode_removes_every_selected_document() {
    let store = Arc::new(InstrumentedStore::new());
    seed_users(&store.inner, USERS, 9);

    let mut opts = options(USERS, 4, 3);
    opts.mode = OperationMode::DeleteDocuments;
    let summary = run(&store, Arc::new(SelectAllTransform), opts, &Logger::disabled())
        .await
        .unwrap();

    assert_eq!(summary.documents_seen, 9);
    assert_eq!(summary.writes_performed, 9);
    assert_eq!(store.inner.count(USERS), 0);

    let deleted: HashSet<String> = store
        .mutations()
        .into_iter()
        .map(|c| match c {
            Call::Delete { id, .. } => id,
            other => panic!("unexpected mutation {:?}", other),
        })
        .collect();
    assert_eq!(deleted.len(), 9);
}
