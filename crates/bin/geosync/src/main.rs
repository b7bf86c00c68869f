//! # geosync — natural-event sync driver
//!
//! Composition root that wires the event source, fetch engine, result cache
//! and controller together, and drives the controller from stdin.
//!
//! ## Responsibilities
//! - Parse configuration (env vars, config file)
//! - Install the `tracing` subscriber
//! - Construct the EONET adapter and the paginated fetcher on top of it
//! - Construct the shared result cache and the events client
//! - Spawn the debounced controller and print every settled state
//! - Translate stdin commands into filter, viewport and refetch inputs
//! - Shut the controller down and clear the cache on `quit`, EOF or Ctrl-C
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod command;
mod config;

use std::sync::Arc;

use anyhow::Context;
use geosync_adapter_eonet::EonetSource;
use geosync_app::cache::ResultCache;
use geosync_app::fetch_engine::PaginatedFetcher;
use geosync_app::services::events_client::EventsClient;
use geosync_app::services::events_controller::{EventsController, FetchState};
use geosync_domain::event::Event;
use geosync_domain::timeline;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

use crate::command::Action;
use crate::config::Config;

const TIMELINE_BUCKETS: usize = 24;
const SPARKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .with_writer(std::io::stderr)
        .init();

    // Event source
    let source = EonetSource::new(&config.source).context("failed to build event source")?;
    let fetcher = PaginatedFetcher::new(source).with_max_pages(config.fetch.max_pages);

    // Cache, shared by every client for the lifetime of the process
    let cache = Arc::new(ResultCache::new(config.cache_policy()));
    let client = EventsClient::new(fetcher, Arc::clone(&cache));

    // Controller
    let mut filters = config.initial_filters();
    let controller = EventsController::spawn(client, filters.clone(), config.debounce())
        .context("invalid initial filters")?;
    let reporter = tokio::spawn(report(controller.updates()));

    tracing::info!(
        base_url = %config.source.base_url,
        max_pages = config.fetch.max_pages,
        debounce_ms = config.controller.debounce_ms,
        "geosync started"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        let command = match command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                eprintln!("error: {err}");
                continue;
            }
        };

        match command.resolve(&filters) {
            Action::Filters(next) => match controller.set_filters(next.clone()) {
                Ok(()) => filters = next,
                Err(err) => eprintln!("error: {err}"),
            },
            Action::Viewport(viewport) => controller.set_viewport(viewport),
            Action::Refetch => controller.refetch(),
            Action::Quit => break,
        }
    }

    controller.shutdown().await;
    if let Err(err) = reporter.await {
        tracing::warn!(%err, "state reporter failed");
    }
    cache.clear();
    tracing::info!("geosync stopped");
    Ok(())
}

/// Print every settled state until the controller stops.
async fn report(updates: impl tokio_stream::Stream<Item = FetchState>) {
    tokio::pin!(updates);
    while let Some(state) = updates.next().await {
        if !state.loading {
            println!("{}", summary(&state));
        }
    }
}

fn summary(state: &FetchState) -> String {
    let markers = state.events.iter().filter_map(Event::marker).count();
    let open = state.events.iter().filter(|event| event.is_open()).count();
    let mut line = format!(
        "{} events ({open} open, {markers} on map)",
        state.events.len()
    );

    if let Some(key) = &state.query {
        let buckets = timeline::distribution(&state.events, key.start, key.end, TIMELINE_BUCKETS);
        line.push_str(" | ");
        line.extend(buckets.into_iter().map(spark));
    }
    if let Some(err) = &state.error {
        line.push_str(" | error: ");
        line.push_str(&err.to_string());
    }
    line
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn spark(level: f64) -> char {
    if level <= 0.0 {
        return ' ';
    }
    let index = (level * (SPARKS.len() - 1) as f64).round() as usize;
    SPARKS[index.min(SPARKS.len() - 1)]
}
