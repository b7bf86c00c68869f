//! Canonical event queries and the cache keys derived from them.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::viewport::{BoundingBox, ViewportKey};

/// Page size requested when the query does not set one.
pub const DEFAULT_LIMIT: u32 = 100;

/// Which events to include by lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Open,
    Closed,
    #[default]
    All,
}

impl EventStatus {
    /// Wire value of the `status` query parameter.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::All => "all",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`EventStatus`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event status `{0}`")]
pub struct UnknownStatus(pub String);

impl FromStr for EventStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            "all" => Ok(Self::All),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// An immutable, normalized request for events.
///
/// Built by [`FilterState::canonicalize`](crate::filter::FilterState::canonicalize):
/// `categories` is sorted and deduplicated, `start <= end`.
#[derive(Debug, Clone, PartialEq)]
pub struct EventQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub categories: Vec<String>,
    pub bbox: Option<BoundingBox>,
    pub status: EventStatus,
    pub limit: Option<u32>,
}

impl EventQuery {
    /// Page size sent to the provider.
    #[must_use]
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT)
    }

    /// Whether the query is defined to match nothing.
    #[must_use]
    pub fn matches_nothing(&self) -> bool {
        self.categories.is_empty()
    }

    /// Query-string parameters for the first page request, in wire order.
    ///
    /// `category` is omitted for an empty category list and `bbox` when the
    /// viewport restriction is off.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("status", self.status.to_string()),
            ("start", self.start.format("%Y-%m-%d").to_string()),
            ("end", self.end.format("%Y-%m-%d").to_string()),
        ];
        if !self.categories.is_empty() {
            pairs.push(("category", self.categories.join(",")));
        }
        if let Some(bbox) = &self.bbox {
            pairs.push(("bbox", bbox.to_string()));
        }
        pairs.push(("limit", self.effective_limit().to_string()));
        pairs
    }
}

/// Viewport component of a [`CacheKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ViewportScope {
    /// Viewport restriction disabled: every map position shares one entry.
    Unrestricted,
    /// Viewport restriction enabled, snapped to the quantization grid.
    Region(ViewportKey),
}

impl fmt::Display for ViewportScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unrestricted => f.write_str("none"),
            Self::Region(key) => key.fmt(f),
        }
    }
}

/// Deterministic identity of a canonical query, used to key the result cache.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub categories: Vec<String>,
    pub status: EventStatus,
    pub limit: u32,
    pub viewport: ViewportScope,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "events|{}|{}|{}|{}|{}|{}",
            self.start,
            self.end,
            self.categories.join(","),
            self.status,
            self.limit,
            self.viewport
        )
    }
}
