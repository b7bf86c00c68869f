//! Paginated fetch engine — walks the remote catalog page by page.
//!
//! The first request is built from the query; every following request uses
//! the server-supplied next-page link verbatim. The walk stops when there is
//! no next link, when the page ceiling is reached, or when the cancellation
//! token fires.

use geosync_domain::error::FetchError;
use geosync_domain::event::Event;
use geosync_domain::query::EventQuery;
use tokio_util::sync::CancellationToken;

use crate::ports::{EventSource, PageRequest};

/// Page ceiling used unless configured otherwise.
pub const DEFAULT_MAX_PAGES: usize = 3;

/// Result of a page walk that did not fail.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOutcome {
    /// Events of every page fetched, page order then provider order.
    pub events: Vec<Event>,
    /// Number of pages actually received.
    pub pages: usize,
    /// The walk was cut short by cancellation; `events` is partial.
    pub cancelled: bool,
}

/// Executes an [`EventQuery`] against an [`EventSource`], merging pages.
pub struct PaginatedFetcher<S> {
    source: S,
    max_pages: usize,
}

impl<S: EventSource> PaginatedFetcher<S> {
    /// Create a fetcher with the default page ceiling.
    pub fn new(source: S) -> Self {
        Self {
            source,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Override the page ceiling (at least one page is always fetched).
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    #[must_use]
    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    /// Fetch every page of `query`, up to the page ceiling.
    ///
    /// A query with no categories matches nothing and returns an empty
    /// outcome without touching the source. Cancellation is not an error:
    /// the events gathered so far are returned with `cancelled` set.
    ///
    /// # Errors
    ///
    /// Returns the first [`FetchError`] raised by any page. Pages received
    /// before the failure are discarded.
    pub async fn fetch(
        &self,
        query: &EventQuery,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome, FetchError> {
        let mut outcome = FetchOutcome::default();
        if query.matches_nothing() {
            tracing::debug!("query has no categories, skipping fetch");
            return Ok(outcome);
        }

        let mut request = PageRequest::First(query.clone());
        loop {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }

            let page = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    outcome.cancelled = true;
                    break;
                }
                page = self.source.fetch_page(request) => page.inspect_err(|err| {
                    tracing::warn!(%err, page = outcome.pages + 1, "event page fetch failed");
                })?,
            };

            outcome.pages += 1;
            tracing::debug!(
                page = outcome.pages,
                events = page.events.len(),
                has_next = page.next.is_some(),
                "fetched event page"
            );
            outcome.events.extend(page.events);

            match page.next {
                Some(next) if outcome.pages < self.max_pages => request = PageRequest::Next(next),
                _ => break,
            }
        }

        if outcome.cancelled {
            tracing::debug!(
                pages = outcome.pages,
                events = outcome.events.len(),
                "event fetch cancelled"
            );
        } else {
            tracing::info!(
                pages = outcome.pages,
                events = outcome.events.len(),
                "event fetch complete"
            );
        }
        Ok(outcome)
    }
}
