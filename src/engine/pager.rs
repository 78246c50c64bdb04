//! Query pager
//!
//! Lazy, finite, non-restartable sequence of pages driven by the store's
//! continuation token. A page is only fetched when the caller asks for it.
//! Once exhausted (or after an error) a new pager must be opened.

use std::sync::Arc;

use crate::document::QueryFilter;
use crate::store::{DocumentStore, Page, StoreResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum PagerState {
    Start,
    Continue(String),
    Exhausted,
}

/// Continuation-token driven page iterator
pub struct QueryPager {
    store: Arc<dyn DocumentStore>,
    collection: String,
    filter: QueryFilter,
    page_size: usize,
    state: PagerState,
}

impl QueryPager {
    /// Open a pager; no store call happens until the first `next_page`
    pub fn open(
        store: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
        filter: QueryFilter,
        page_size: usize,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            filter,
            page_size: page_size.max(1),
            state: PagerState::Start,
        }
    }

    /// Whether another page may be fetched
    pub fn has_next(&self) -> bool {
        self.state != PagerState::Exhausted
    }

    /// Fetch the next page; `Ok(None)` once exhausted
    ///
    /// A store failure is returned as-is and ends the sequence. No empty
    /// page is ever synthesized in its place.
    pub async fn next_page(&mut self) -> StoreResult<Option<Page>> {
        let token = match &self.state {
            PagerState::Exhausted => return Ok(None),
            PagerState::Start => None,
            PagerState::Continue(token) => Some(token.clone()),
        };

        let result = self
            .store
            .query_page(&self.collection, &self.filter, self.page_size, token.as_deref())
            .await;

        match result {
            Ok(page) => {
                self.state = match &page.continuation {
                    Some(next) => PagerState::Continue(next.clone()),
                    None => PagerState::Exhausted,
                };
                Ok(Some(page))
            }
            Err(e) => {
                self.state = PagerState::Exhausted;
                Err(e)
            }
        }
    }
}
