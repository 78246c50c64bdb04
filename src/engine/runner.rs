//! Batch driver
//!
//! A single task pulls pages in order; each page is fanned out to the
//! bounded pool and fully drained before the next page is requested.
//! Memory is bounded to one page.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::document::Document;
use crate::observability::{Event, Logger, ObservationScope};
use crate::store::DocumentStore;
use crate::transform::{Transform, TransformResult};

use super::errors::{DocumentError, EngineError, EngineResult};
use super::outcome::OperationOutcome;
use super::pager::QueryPager;
use super::pool::run_bounded;
use super::progress::{BatchSummary, ProgressTracker};
use super::sink::ErrorSink;
use super::writer::ConditionalWriter;

/// What the engine does with each selected document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMode {
    /// Transform, then write back
    EditDocuments,
    /// Unconditional delete; the transform only selects
    DeleteDocuments,
}

impl OperationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationMode::EditDocuments => "edit_documents",
            OperationMode::DeleteDocuments => "delete_documents",
        }
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "edit_documents" | "EditDocuments" => Ok(OperationMode::EditDocuments),
            "delete_documents" | "DeleteDocuments" => Ok(OperationMode::DeleteDocuments),
            other => Err(EngineError::UnknownOperationMode(other.to_string())),
        }
    }
}

/// Knobs for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub input_collection: String,
    pub output_collection: String,
    pub dry_run: bool,
    pub page_size: usize,
    pub max_concurrency: usize,
    pub mode: OperationMode,
}

impl RunOptions {
    /// Defaults: dry run, page size 20, one worker, edit mode, output = input
    pub fn new(input_collection: impl Into<String>) -> Self {
        let input_collection = input_collection.into();
        Self {
            output_collection: input_collection.clone(),
            input_collection,
            dry_run: true,
            page_size: 20,
            max_concurrency: 1,
            mode: OperationMode::EditDocuments,
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.input_collection.is_empty() {
            return Err(EngineError::InvalidOptions(
                "input collection must not be empty".into(),
            ));
        }
        if self.output_collection.is_empty() {
            return Err(EngineError::InvalidOptions(
                "output collection must not be empty".into(),
            ));
        }
        if self.page_size == 0 {
            return Err(EngineError::InvalidOptions("page size must be positive".into()));
        }
        if self.max_concurrency == 0 {
            return Err(EngineError::InvalidOptions(
                "max concurrency must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Cooperative stop request, honored between pages only
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything one document task needs; shared read-only across workers
struct DocumentContext {
    transform: Arc<dyn Transform>,
    writer: ConditionalWriter,
    mode: OperationMode,
    dry_run: bool,
    tracker: Arc<ProgressTracker>,
    sink: Arc<ErrorSink>,
    logger: Logger,
}

impl DocumentContext {
    async fn process(&self, document: Document) -> OperationOutcome {
        match self.mode {
            OperationMode::DeleteDocuments => self.writer.delete(&document, self.dry_run).await,
            OperationMode::EditDocuments => match self.transform.apply(&document) {
                Ok(TransformResult::Replace(replacement)) => {
                    self.writer.write(&document, replacement, self.dry_run).await
                }
                Ok(TransformResult::Skip) => {
                    self.logger
                        .trace(Event::DocumentSkipped, &[("id", &document.id)]);
                    OperationOutcome::Skipped
                }
                Err(e) => OperationOutcome::Failed(e.into()),
            },
        }
    }

    fn observe(&self, id: &str, outcome: &OperationOutcome) {
        if let Some(error) = outcome.error() {
            self.sink.record(id, error);
        }
        self.tracker.on_document_processed(outcome);
    }
}

/// Pages through a query and applies a transform to every result
pub struct MutationEngine {
    store: Arc<dyn DocumentStore>,
    transform: Arc<dyn Transform>,
    options: RunOptions,
    logger: Logger,
    cancellation: CancellationFlag,
}

impl MutationEngine {
    /// Build an engine; options are validated before any store call
    pub fn new(
        store: Arc<dyn DocumentStore>,
        transform: Arc<dyn Transform>,
        options: RunOptions,
        logger: Logger,
    ) -> EngineResult<Self> {
        options.validate()?;
        Ok(Self {
            store,
            transform,
            options,
            logger,
            cancellation: CancellationFlag::new(),
        })
    }

    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = flag;
        self
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Run the batch to completion
    ///
    /// Per-document failures are absorbed and counted. Only a query
    /// failure ends the run early; the error still carries any stranded
    /// documents.
    pub async fn run(&self) -> EngineResult<BatchSummary> {
        let options = &self.options;
        let filter = self.transform.query();
        let query_text = filter.to_string();
        let page_size = options.page_size.to_string();
        let max_concurrency = options.max_concurrency.to_string();

        let scope = ObservationScope::new(
            &self.logger,
            Event::BatchBegin,
            &[
                ("mode", options.mode.as_str()),
                ("collection", &options.input_collection),
                ("output_collection", &options.output_collection),
                ("transform", self.transform.name()),
                ("query", &query_text),
                ("dry_run", bool_str(options.dry_run)),
                ("page_size", &page_size),
                ("max_concurrency", &max_concurrency),
            ],
        );

        let tracker = Arc::new(ProgressTracker::new(options.dry_run));
        let sink = Arc::new(ErrorSink::new(self.logger.clone(), self.transform.name()));
        let context = Arc::new(DocumentContext {
            transform: Arc::clone(&self.transform),
            writer: ConditionalWriter::new(
                Arc::clone(&self.store),
                options.input_collection.clone(),
                options.output_collection.clone(),
                self.logger.clone(),
            ),
            mode: options.mode,
            dry_run: options.dry_run,
            tracker: Arc::clone(&tracker),
            sink: Arc::clone(&sink),
            logger: self.logger.clone(),
        });

        let mut pager = QueryPager::open(
            Arc::clone(&self.store),
            options.input_collection.clone(),
            filter,
            options.page_size,
        );
        let mut cancelled = false;

        while pager.has_next() {
            if self.cancellation.is_cancelled() {
                cancelled = true;
                let pages = tracker.snapshot().pages.to_string();
                self.logger
                    .warn(Event::BatchCancelled, &[("pages_completed", &pages)]);
                break;
            }

            let page = match pager.next_page().await {
                Ok(Some(page)) => page,
                Ok(None) => break,
                Err(e) => {
                    let reason = format!("{} ({})", e, e.code());
                    scope.fail(Event::QueryFailed, &reason);
                    return Err(EngineError::Query {
                        source: e,
                        stranded: sink.stranded(),
                    });
                }
            };

            tracker.on_page_start();
            let ids: Vec<String> = page.documents.iter().map(|d| d.id.clone()).collect();
            let fetched = ids.len().to_string();
            self.logger
                .trace(Event::PageFetched, &[("documents", &fetched)]);

            let worker_context = Arc::clone(&context);
            let outcomes = run_bounded(page.documents, options.max_concurrency, move |document| {
                let context = Arc::clone(&worker_context);
                async move {
                    let id = document.id.clone();
                    let outcome = context.process(document).await;
                    context.observe(&id, &outcome);
                    outcome
                }
            })
            .await;

            // Outcomes the pool synthesized never passed through `observe`
            for (id, outcome) in ids.iter().zip(&outcomes) {
                if matches!(
                    outcome.error(),
                    Some(DocumentError::Panicked(_)) | Some(DocumentError::Aborted(_))
                ) {
                    context.observe(id, outcome);
                }
            }

            self.log_page_complete(&tracker);
        }

        let summary = tracker.summary(sink.conflicts(), cancelled, sink.stranded());
        let documents_seen = summary.documents_seen.to_string();
        let writes = summary.writes_performed.to_string();
        let skipped = summary.skipped.to_string();
        let failed = summary.failed.to_string();
        let conflicts = summary.conflicts.to_string();
        let stranded = summary.stranded.len().to_string();
        let elapsed = summary.elapsed_ms.to_string();

        scope.complete(
            Event::BatchComplete,
            &[
                ("documents_seen", &documents_seen),
                ("writes_performed", &writes),
                ("skipped", &skipped),
                ("failed", &failed),
                ("conflicts", &conflicts),
                ("stranded", &stranded),
                ("elapsed_ms", &elapsed),
                ("cancelled", bool_str(cancelled)),
            ],
        );

        Ok(summary)
    }

    fn log_page_complete(&self, tracker: &ProgressTracker) {
        let snapshot = tracker.snapshot();
        let page = snapshot.pages.to_string();
        let seen = snapshot.documents_seen.to_string();
        let writes = snapshot.writes_performed.to_string();
        let elapsed = snapshot.elapsed_ms.to_string();
        self.logger.info(
            Event::PageComplete,
            &[
                ("page", &page),
                ("documents_seen", &seen),
                ("writes_performed", &writes),
                ("elapsed_ms", &elapsed),
            ],
        );
    }
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}
