//! Bounded worker pool
//!
//! Runs one action per item with at most `max_concurrency` in flight.
//! The pool is scoped to a single call: nothing carries over between pages.
//!
//! Every item is attempted exactly once and yields exactly one outcome, in
//! item order. A panicking action becomes `Failed(Panicked)` and never
//! disturbs its siblings.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::errors::DocumentError;
use super::outcome::OperationOutcome;

/// Run `action` over `items` with bounded concurrency
pub async fn run_bounded<T, F, Fut>(
    items: Vec<T>,
    max_concurrency: usize,
    action: F,
) -> Vec<OperationOutcome>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = OperationOutcome> + Send + 'static,
{
    let mut outcomes: Vec<Option<OperationOutcome>> = vec![None; items.len()];
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let action = Arc::new(action);
    let mut join_set = JoinSet::new();

    for (index, item) in items.into_iter().enumerate() {
        // Permit taken before spawning: at most `max_concurrency` live tasks
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                outcomes[index] = Some(OperationOutcome::Failed(DocumentError::Aborted(
                    e.to_string(),
                )));
                continue;
            }
        };

        let action = Arc::clone(&action);
        join_set.spawn(async move {
            let result = AssertUnwindSafe(async move { action(item).await })
                .catch_unwind()
                .await;
            drop(permit);

            let outcome = match result {
                Ok(outcome) => outcome,
                Err(payload) => {
                    OperationOutcome::Failed(DocumentError::Panicked(panic_message(&*payload)))
                }
            };
            (index, outcome)
        });
    }

    while let Some(joined) = join_set.join_next().await {
        if let Ok((index, outcome)) = joined {
            outcomes[index] = Some(outcome);
        }
    }

    outcomes
        .into_iter()
        .map(|o| {
            o.unwrap_or_else(|| {
                OperationOutcome::Failed(DocumentError::Aborted(
                    "task ended without reporting an outcome".to_string(),
                ))
            })
        })
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
