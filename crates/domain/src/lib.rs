//! # geosync-domain
//!
//! Pure domain model for the geosync event synchronization engine.
//!
//! ## Responsibilities
//! - Foundational types: error taxonomy, timestamps and calendar dates
//! - Map **viewports** and their **bounding boxes**, plus viewport quantization
//! - The **category catalog** of the remote natural-event provider
//! - **Filter state** as supplied by the settings UI, and its canonicalization
//!   into an [`EventQuery`](query::EventQuery) + [`CacheKey`](query::CacheKey)
//! - **Event** records and the paginated **page envelope** returned by the provider
//! - Derived views over events (map markers, timeline distribution)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod time;

pub mod category;
pub mod event;
pub mod filter;
pub mod query;
pub mod timeline;
pub mod viewport;
