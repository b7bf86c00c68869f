//! # geosync-app
//!
//! Application layer — the event synchronization engine and its **port
//! definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `EventSource` — fetch one page of the remote event catalog
//! - Provide the **engine** that walks a paginated catalog:
//!   - `PaginatedFetcher` — follow next-page links up to a page ceiling,
//!     cooperatively cancellable
//! - Provide **in-process infrastructure** that doesn't need IO:
//!   - `ResultCache` — per-query results with freshness and eviction windows
//! - Re-export `tokio_util`'s `CancellationToken`, the per-fetch cancellation handle
//! - Define **driving/inbound** use-cases:
//!   - `EventsClient` — cache-first, single-flight query execution
//!   - `EventsController` — debounced, cancelling binding of UI state to fetches
//!
//! ## Dependency rule
//! Depends on `geosync-domain` only (plus `tokio` and `tokio-util` for tasks, timers, channels and cancellation).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod cache;
pub mod fetch_engine;
pub mod ports;
pub mod services;

pub use tokio_util::sync::CancellationToken;

#[cfg(test)]
pub(crate) mod testing;
