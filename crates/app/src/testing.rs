//! Test doubles shared by the engine, client and controller tests.

use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use geosync_domain::error::FetchError;
use geosync_domain::event::{Coordinates, Event, EventCategory, EventPage, Geometry, GeometryKind};
use geosync_domain::filter::{CanonicalQuery, FilterState};
use geosync_domain::query::{EventQuery, EventStatus};

use crate::ports::{EventSource, PageRequest};

type Responder = Box<dyn Fn(&PageRequest, usize) -> Result<EventPage, FetchError> + Send + Sync>;

/// In-memory [`EventSource`] answering from a closure.
///
/// The closure receives the request and the zero-based call index. Every call
/// is counted and recorded when issued, before any simulated latency.
pub(crate) struct ScriptedSource {
    responder: Responder,
    delay: Duration,
    calls: AtomicUsize,
    requests: Mutex<Vec<PageRequest>>,
}

impl ScriptedSource {
    pub(crate) fn new(
        responder: impl Fn(&PageRequest, usize) -> Result<EventPage, FetchError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Simulated latency per page.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Queries of every first-page request, in issue order.
    pub(crate) fn first_page_queries(&self) -> Vec<EventQuery> {
        self.requests()
            .into_iter()
            .filter_map(|request| match request {
                PageRequest::First(query) => Some(query),
                PageRequest::Next(_) => None,
            })
            .collect()
    }
}

impl EventSource for ScriptedSource {
    fn fetch_page(
        &self,
        request: PageRequest,
    ) -> impl Future<Output = Result<EventPage, FetchError>> + Send {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let response = (self.responder)(&request, index);
        self.requests.lock().unwrap().push(request);
        let delay = self.delay;
        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            response
        }
    }
}

pub(crate) fn event(id: &str, category: &str) -> Event {
    Event {
        id: id.to_string(),
        title: format!("Event {id}"),
        description: None,
        link: None,
        closed: None,
        categories: vec![EventCategory {
            id: category.to_string(),
            title: category.to_string(),
        }],
        sources: Vec::new(),
        geometry: vec![Geometry {
            date: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            kind: GeometryKind::Point,
            coordinates: Coordinates::Position([-120.0, 38.0]),
            magnitude_value: None,
            magnitude_unit: None,
        }],
    }
}

/// `count` events with ids `{prefix}-0`, `{prefix}-1`, …
pub(crate) fn events(prefix: &str, count: usize) -> Vec<Event> {
    (0..count)
        .map(|i| event(&format!("{prefix}-{i}"), "wildfires"))
        .collect()
}

pub(crate) fn page(events: Vec<Event>, next: Option<&str>) -> EventPage {
    EventPage {
        events,
        next: next.map(ToString::to_string),
    }
}

pub(crate) fn ids(events: &[Event]) -> Vec<String> {
    events.iter().map(|e| e.id.clone()).collect()
}

pub(crate) fn filters(categories: &[&str]) -> FilterState {
    FilterState {
        start: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        end: chrono::NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        categories: categories.iter().map(ToString::to_string).collect(),
        viewport_only: false,
        status: EventStatus::All,
        limit: None,
    }
}

pub(crate) fn canonical(categories: &[&str]) -> CanonicalQuery {
    filters(categories).canonicalize(None).unwrap()
}
