//! Events controller — binds changing filter and viewport input to fetches.
//!
//! The controller runs as a small state machine on its own task:
//!
//! ```text
//! Idle ──input──▶ Pending ──quiet period──▶ Fetching ──settled──▶ Idle
//!                  ▲   │ input re-arms the timer     │
//!                  └───┘                             └─ input ─▶ Pending
//! ```
//!
//! Starting a fetch cancels the previous one, and a result is only applied
//! if it belongs to the most recently issued query. Consumers read the
//! published [`FetchState`] through a `watch` channel.

use std::sync::Arc;
use std::time::Duration;

use geosync_domain::error::{FetchError, ValidationError};
use geosync_domain::event::Event;
use geosync_domain::filter::{CanonicalQuery, FilterState};
use geosync_domain::query::CacheKey;
use geosync_domain::viewport::Viewport;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;

use crate::cache::CacheLookup;
use crate::ports::EventSource;
use crate::services::events_client::{EventsClient, FetchPolicy};

/// Quiet period suited to map camera movement.
pub const CAMERA_PAN_DEBOUNCE: Duration = Duration::from_millis(75);
/// Quiet period suited to filter edits.
pub const FILTER_EDIT_DEBOUNCE: Duration = Duration::from_millis(400);

/// What a consumer sees.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchState {
    /// Last known-good events, provider order.
    pub events: Arc<Vec<Event>>,
    pub loading: bool,
    /// Failure of the most recent fetch, if it failed.
    pub error: Option<FetchError>,
    /// Key of the query `events` answers.
    pub query: Option<CacheKey>,
}

#[derive(Debug)]
enum Command {
    Filters(FilterState),
    Viewport(Viewport),
    Refetch,
    Shutdown,
}

/// Handle to a running controller.
///
/// Dropping the handle stops the controller and cancels any outstanding
/// fetch; [`EventsController::shutdown`] does the same but waits for it.
pub struct EventsController {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<FetchState>,
    task: Option<JoinHandle<()>>,
}

impl EventsController {
    /// Start a controller for `filters`. The first fetch is issued once the
    /// `debounce` quiet period has elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidRange`] when the date range is
    /// inverted.
    pub fn spawn<S>(
        client: EventsClient<S>,
        filters: FilterState,
        debounce: Duration,
    ) -> Result<Self, ValidationError>
    where
        S: EventSource + Send + Sync + 'static,
    {
        filters.validate()?;

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (completions, completion_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(FetchState::default());

        let machine = Machine::new(client, filters, debounce, state_tx, completions);
        let task = tokio::spawn(machine.run(command_rx, completion_rx));

        Ok(Self {
            commands,
            state,
            task: Some(task),
        })
    }

    /// Replace the filter selection.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidRange`] when the date range is
    /// inverted; the previous selection stays in effect.
    pub fn set_filters(&self, filters: FilterState) -> Result<(), ValidationError> {
        filters.validate()?;
        self.send(Command::Filters(filters));
        Ok(())
    }

    /// Report the visible map region.
    pub fn set_viewport(&self, viewport: Viewport) {
        self.send(Command::Viewport(viewport));
    }

    /// Fetch the current query now, bypassing cache freshness.
    pub fn refetch(&self) {
        self.send(Command::Refetch);
    }

    #[must_use]
    pub fn state(&self) -> FetchState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FetchState> {
        self.state.clone()
    }

    /// Stream of published states, starting with the current one.
    #[must_use]
    pub fn updates(&self) -> WatchStream<FetchState> {
        WatchStream::new(self.state.clone())
    }

    /// Stop the controller, cancelling any outstanding fetch, and wait for
    /// its task to finish.
    pub async fn shutdown(mut self) {
        self.send(Command::Shutdown);
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::warn!(%err, "events controller task failed");
            }
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!("events controller already stopped");
        }
    }
}

impl Drop for EventsController {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Pending,
    Fetching,
}

/// The fetch this controller is waiting on. Dropping it cancels the fetch.
struct ActiveFetch {
    generation: u64,
    key: CacheKey,
    /// Revalidation of data already on screen; its failure is not reported.
    background: bool,
    cancel: CancellationToken,
}

impl Drop for ActiveFetch {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Completion {
    generation: u64,
    result: Result<Arc<Vec<Event>>, FetchError>,
}

struct Machine<S> {
    client: EventsClient<S>,
    filters: FilterState,
    viewport: Option<Viewport>,
    debounce: Duration,
    deadline: Option<Instant>,
    active: Option<ActiveFetch>,
    generation: u64,
    state: watch::Sender<FetchState>,
    completions: mpsc::UnboundedSender<Completion>,
}

impl<S> Machine<S>
where
    S: EventSource + Send + Sync + 'static,
{
    fn new(
        client: EventsClient<S>,
        filters: FilterState,
        debounce: Duration,
        state: watch::Sender<FetchState>,
        completions: mpsc::UnboundedSender<Completion>,
    ) -> Self {
        Self {
            client,
            filters,
            viewport: None,
            debounce,
            deadline: None,
            active: None,
            generation: 0,
            state,
            completions,
        }
    }

    /// Pending while the quiet period runs, Fetching while a foreground
    /// fetch is outstanding. A background revalidation leaves the machine
    /// Idle.
    fn phase(&self) -> Phase {
        if self.deadline.is_some() {
            Phase::Pending
        } else if self.active.as_ref().is_some_and(|active| !active.background) {
            Phase::Fetching
        } else {
            Phase::Idle
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
    ) {
        self.arm();
        loop {
            let deadline = self.deadline;
            let from = self.phase();
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.deadline = None;
                    self.start(FetchPolicy::CacheFirst);
                }
                Some(completion) = completions.recv() => self.apply(completion),
            }
            let to = self.phase();
            if from != to {
                tracing::trace!(?from, ?to, "events controller transition");
            }
        }

        self.deadline = None;
        self.active = None;
        tracing::debug!("events controller stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Filters(filters) => {
                if filters == self.filters {
                    return;
                }
                self.filters = filters;
                self.arm();
            }
            Command::Viewport(viewport) => {
                let moved = self.viewport.as_ref().map(Viewport::quantize) != Some(viewport.quantize());
                self.viewport = Some(viewport);
                if moved && self.filters.viewport_only {
                    self.arm();
                }
            }
            Command::Refetch => {
                self.deadline = None;
                self.start(FetchPolicy::NetworkOnly);
            }
            Command::Shutdown => {}
        }
    }

    /// (Re)start the quiet period.
    fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.debounce);
    }

    fn start(&mut self, policy: FetchPolicy) {
        let canonical = match self.filters.canonicalize(self.viewport.as_ref()) {
            Ok(canonical) => canonical,
            Err(err) => {
                tracing::warn!(%err, "filters rejected, fetch skipped");
                return;
            }
        };

        if policy == FetchPolicy::CacheFirst
            && self
                .active
                .as_ref()
                .is_some_and(|active| active.key == canonical.key)
        {
            tracing::trace!(key = %canonical.key, "identical fetch already running");
            return;
        }

        self.active = None;
        self.generation += 1;
        let key = canonical.key.clone();

        if canonical.query.matches_nothing() {
            self.settle(Arc::default(), key);
            return;
        }

        if policy == FetchPolicy::CacheFirst {
            match self.client.cache().get(&key) {
                CacheLookup::Fresh(events) => {
                    tracing::debug!(%key, "serving fresh cached events");
                    self.settle(events, key);
                    return;
                }
                CacheLookup::Stale(events) => {
                    tracing::debug!(%key, "serving stale cached events, revalidating");
                    self.settle(events, key);
                    self.spawn_fetch(canonical, true);
                    return;
                }
                CacheLookup::Miss => {}
            }
        }

        self.publish(|state| {
            state.loading = true;
            state.error = None;
        });
        self.spawn_fetch(canonical, false);
    }

    fn spawn_fetch(&mut self, canonical: CanonicalQuery, background: bool) {
        let generation = self.generation;
        let cancel = CancellationToken::new();
        let client = self.client.clone();
        let completions = self.completions.clone();
        let token = cancel.clone();
        let key = canonical.key.clone();

        tokio::spawn(async move {
            let result = match client.load(&canonical, &token).await {
                Ok(Some(events)) => Ok(events),
                Ok(None) => return,
                Err(err) => Err(err),
            };
            // The controller may have stopped in the meantime.
            let _ = completions.send(Completion { generation, result });
        });

        self.active = Some(ActiveFetch {
            generation,
            key,
            background,
            cancel,
        });
    }

    fn apply(&mut self, completion: Completion) {
        let Some(active) = self
            .active
            .take_if(|active| active.generation == completion.generation)
        else {
            tracing::trace!(generation = completion.generation, "discarding superseded result");
            return;
        };

        match completion.result {
            Ok(events) => self.settle(events, active.key.clone()),
            Err(err) if active.background => {
                tracing::warn!(%err, key = %active.key, "background refresh failed, keeping cached events");
            }
            Err(err) => {
                tracing::warn!(%err, key = %active.key, "event fetch failed");
                self.publish(|state| {
                    state.loading = false;
                    state.error = Some(err);
                });
            }
        }
    }

    /// Replace the visible events wholesale and go idle.
    fn settle(&self, events: Arc<Vec<Event>>, key: CacheKey) {
        self.publish(|state| {
            state.events = events;
            state.loading = false;
            state.error = None;
            state.query = Some(key);
        });
    }

    fn publish(&self, update: impl FnOnce(&mut FetchState)) {
        self.state.send_if_modified(|state| {
            let before = state.clone();
            update(state);
            *state != before
        });
    }
}
