//! # geosync-adapter-eonet
//!
//! Event source adapter for EONET-compatible natural-event catalogs, built on
//! [reqwest](https://docs.rs/reqwest).
//!
//! ## Responsibilities
//! - Implement the `EventSource` port: one HTTP `GET` per page
//! - Build first-page URLs from an `EventQuery` (`status`, `start`, `end`,
//!   `category`, `bbox`, `limit`)
//! - Request follow-up pages through the server-supplied link, verbatim
//! - Map non-success statuses to `FetchError::RemoteFetch` and everything
//!   else that prevents a usable response to `FetchError::Transport`
//!
//! ## Dependency rule
//! Depends on `geosync-app` (for the port trait) and `geosync-domain` (for
//! the query and page types). Never leaks reqwest types past the port.

pub mod config;
pub mod error;
mod source;

pub use config::EonetConfig;
pub use error::EonetError;
pub use source::EonetSource;
