//! Events client — cache-first, single-flight execution of canonical queries.
//!
//! Every network fetch runs as a *flight* on its own task, keyed by the
//! query's [`CacheKey`]. Callers asking for a key that is already in flight
//! join it instead of issuing a second request. A flight is cancelled when
//! its last waiter goes away, unless it is a background revalidation, which
//! always runs to completion and refreshes the cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use geosync_domain::error::FetchError;
use geosync_domain::event::Event;
use geosync_domain::filter::CanonicalQuery;
use geosync_domain::query::CacheKey;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cache::{CacheLookup, ResultCache};
use crate::fetch_engine::PaginatedFetcher;
use crate::ports::EventSource;

/// How [`EventsClient::query`] treats the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchPolicy {
    /// Serve fresh entries directly, serve stale entries and revalidate.
    #[default]
    CacheFirst,
    /// Always go to the network (joining an identical flight if one is running).
    NetworkOnly,
}

/// Where a [`Snapshot`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOrigin {
    /// The query matches nothing; no lookup or fetch was made.
    Empty,
    Fresh,
    /// Served from an aging cache entry while a background refresh runs.
    Stale,
    Network,
}

/// Events answering a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub events: Arc<Vec<Event>>,
    pub origin: SnapshotOrigin,
}

/// Result of [`EventsClient::query`] that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Ready(Snapshot),
    /// The caller's token fired before the events arrived.
    Cancelled,
}

type FlightResult = Result<Arc<Vec<Event>>, FetchError>;

struct Flight {
    id: u64,
    result: watch::Receiver<Option<FlightResult>>,
    waiters: usize,
    detached: bool,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Flights {
    next_id: u64,
    by_key: HashMap<CacheKey, Flight>,
}

struct Inner<S> {
    fetcher: PaginatedFetcher<S>,
    cache: Arc<ResultCache>,
    flights: Mutex<Flights>,
}

/// Executes canonical queries against a shared [`ResultCache`].
pub struct EventsClient<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for EventsClient<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> EventsClient<S>
where
    S: EventSource + Send + Sync + 'static,
{
    pub fn new(fetcher: PaginatedFetcher<S>, cache: Arc<ResultCache>) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                cache,
                flights: Mutex::new(Flights::default()),
            }),
        }
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.inner.cache
    }

    /// Number of flights currently running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner
            .flights
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_key
            .len()
    }

    /// Answer `canonical` according to `policy`.
    ///
    /// # Errors
    ///
    /// Returns the [`FetchError`] of the network fetch, if one was needed
    /// and failed.
    pub async fn query(
        &self,
        canonical: &CanonicalQuery,
        policy: FetchPolicy,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome, FetchError> {
        if canonical.query.matches_nothing() {
            return Ok(QueryOutcome::Ready(Snapshot {
                events: Arc::default(),
                origin: SnapshotOrigin::Empty,
            }));
        }

        if policy == FetchPolicy::CacheFirst {
            match self.inner.cache.get(&canonical.key) {
                CacheLookup::Fresh(events) => {
                    return Ok(QueryOutcome::Ready(Snapshot {
                        events,
                        origin: SnapshotOrigin::Fresh,
                    }));
                }
                CacheLookup::Stale(events) => {
                    self.revalidate(canonical);
                    return Ok(QueryOutcome::Ready(Snapshot {
                        events,
                        origin: SnapshotOrigin::Stale,
                    }));
                }
                CacheLookup::Miss => {}
            }
        }

        Ok(match self.load(canonical, cancel).await? {
            Some(events) => QueryOutcome::Ready(Snapshot {
                events,
                origin: SnapshotOrigin::Network,
            }),
            None => QueryOutcome::Cancelled,
        })
    }

    /// Fetch `canonical` from the network, joining an identical flight if
    /// one is running. Successful results are written to the cache.
    ///
    /// Returns `Ok(None)` when `cancel` fires first. The flight itself is
    /// cancelled once no caller is waiting on it any more.
    ///
    /// # Errors
    ///
    /// Returns the [`FetchError`] the flight failed with.
    pub async fn load(
        &self,
        canonical: &CanonicalQuery,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<Vec<Event>>>, FetchError> {
        let (id, mut result) = self.join(canonical, false);
        let _waiter = Waiter {
            flights: &self.inner.flights,
            key: &canonical.key,
            id,
        };

        let settled = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(None),
            settled = result.wait_for(Option::is_some) => settled.map(|value| Option::clone(&value)),
        };

        match settled {
            Ok(Some(result)) => result.map(Some),
            Ok(None) | Err(_) => Err(FetchError::transport("event fetch was abandoned")),
        }
    }

    /// Refresh `canonical` in the background. The refresh is not cancelled
    /// by callers leaving, and its failure leaves the cache untouched.
    pub fn revalidate(&self, canonical: &CanonicalQuery) {
        tracing::debug!(key = %canonical.key, "revalidating stale cache entry");
        self.join(canonical, true);
    }

    fn join(
        &self,
        canonical: &CanonicalQuery,
        detached: bool,
    ) -> (u64, watch::Receiver<Option<FlightResult>>) {
        let mut flights = self
            .inner
            .flights
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(flight) = flights.by_key.get_mut(&canonical.key) {
            if detached {
                flight.detached = true;
            } else {
                flight.waiters += 1;
            }
            tracing::trace!(key = %canonical.key, waiters = flight.waiters, "joined running fetch");
            return (flight.id, flight.result.clone());
        }

        flights.next_id += 1;
        let id = flights.next_id;
        let (tx, rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        flights.by_key.insert(
            canonical.key.clone(),
            Flight {
                id,
                result: rx.clone(),
                waiters: usize::from(!detached),
                detached,
                cancel: cancel.clone(),
            },
        );

        let inner = Arc::clone(&self.inner);
        let canonical = canonical.clone();
        tokio::spawn(async move { inner.fly(id, canonical, cancel, tx).await });
        (id, rx)
    }
}

impl<S> Inner<S>
where
    S: EventSource + Send + Sync + 'static,
{
    async fn fly(
        &self,
        id: u64,
        canonical: CanonicalQuery,
        cancel: CancellationToken,
        result: watch::Sender<Option<FlightResult>>,
    ) {
        let generation = self.cache.next_generation();
        tracing::debug!(key = %canonical.key, generation, "starting event fetch");

        match self.fetcher.fetch(&canonical.query, &cancel).await {
            Ok(outcome) if outcome.cancelled => {
                tracing::debug!(key = %canonical.key, "event fetch cancelled, result discarded");
            }
            Ok(outcome) => {
                let events = Arc::new(outcome.events);
                self.cache.set(
                    canonical.key.clone(),
                    Arc::clone(&events),
                    generation,
                    Instant::now(),
                );
                result.send_replace(Some(Ok(events)));
            }
            Err(err) => {
                result.send_replace(Some(Err(err)));
            }
        }
        self.finish(&canonical.key, id);
    }

    fn finish(&self, key: &CacheKey, id: u64) {
        let mut flights = self.flights.lock().unwrap_or_else(PoisonError::into_inner);
        if flights.by_key.get(key).is_some_and(|flight| flight.id == id) {
            flights.by_key.remove(key);
        }
    }
}

/// Registration of one caller on a flight, released on drop.
struct Waiter<'a> {
    flights: &'a Mutex<Flights>,
    key: &'a CacheKey,
    id: u64,
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        let mut flights = self.flights.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(flight) = flights.by_key.get_mut(self.key) else {
            return;
        };
        if flight.id != self.id {
            return;
        }

        flight.waiters = flight.waiters.saturating_sub(1);
        if flight.waiters == 0 && !flight.detached && flight.result.borrow().is_none() {
            flight.cancel.cancel();
            flights.by_key.remove(self.key);
            tracing::debug!(key = %self.key, "no caller left, event fetch cancelled");
        }
    }
}
