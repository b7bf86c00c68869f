//! Event source port — page-level access to the remote event catalog.

use std::future::Future;

use geosync_domain::error::FetchError;
use geosync_domain::event::EventPage;
use geosync_domain::query::EventQuery;

/// Which page of the catalog to fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum PageRequest {
    /// The first page, addressed by the query's parameters.
    First(EventQuery),
    /// A follow-up page, addressed by the server-supplied link, used verbatim.
    Next(String),
}

/// Remote catalog of natural events.
///
/// Implementations issue exactly one request per call. Dropping the returned
/// future before it resolves should abort the underlying transfer where the
/// transport supports it.
pub trait EventSource {
    /// Fetch one page.
    ///
    /// Returns [`FetchError::RemoteFetch`] for a non-success HTTP status and
    /// [`FetchError::Transport`] when no usable response was obtained.
    fn fetch_page(
        &self,
        request: PageRequest,
    ) -> impl Future<Output = Result<EventPage, FetchError>> + Send;
}

impl<T: EventSource + Send + Sync> EventSource for std::sync::Arc<T> {
    fn fetch_page(
        &self,
        request: PageRequest,
    ) -> impl Future<Output = Result<EventPage, FetchError>> + Send {
        (**self).fetch_page(request)
    }
}
