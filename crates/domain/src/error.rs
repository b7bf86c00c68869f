//! Common error types used across the workspace.
//!
//! Each failure kind is its own typed error and converts into the umbrella
//! [`GeoSyncError`] via `#[from]`. There is no cancellation variant: a
//! superseded fetch is an outcome, not a failure.

use chrono::NaiveDate;

/// Top-level error for the geosync workspace.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeoSyncError {
    /// The filter state could not be turned into a query.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// The remote catalog could not be fetched.
    #[error("fetch error")]
    Fetch(#[from] FetchError),
}

/// Rejections raised before any network call is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The start of the date range is after its end.
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
}

/// Failures of a (possibly multi-page) fetch against the remote endpoint.
///
/// Any failure aborts the whole page sequence; pages fetched before it are
/// discarded by the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The endpoint answered with a non-success HTTP status.
    #[error("remote events endpoint returned status {status}")]
    RemoteFetch { status: u16 },

    /// The request never produced an HTTP response (DNS, connect, timeout,
    /// reset) or its body could not be read.
    #[error("transport failure: {message}")]
    Transport { message: String },
}

impl FetchError {
    /// Build a [`FetchError::Transport`] from any displayable cause.
    pub fn transport(cause: impl std::fmt::Display) -> Self {
        Self::Transport {
            message: cause.to_string(),
        }
    }

    /// HTTP status carried by a [`FetchError::RemoteFetch`].
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RemoteFetch { status } => Some(*status),
            Self::Transport { .. } => None,
        }
    }
}
