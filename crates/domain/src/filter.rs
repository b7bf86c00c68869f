//! Filter state — the selection the settings UI hands the engine, and its
//! canonicalization into a query plus cache key.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::category;
use crate::error::ValidationError;
use crate::query::{CacheKey, EventQuery, EventStatus, ViewportScope};
use crate::time;
use crate::viewport::Viewport;

/// Years covered by the default date range.
pub const DEFAULT_RANGE_YEARS: u32 = 5;

/// User-facing filter selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterState {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub categories: Vec<String>,
    /// Restrict results to the visible map region.
    pub viewport_only: bool,
    pub status: EventStatus,
    pub limit: Option<u32>,
}

/// A canonical query together with its cache key.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalQuery {
    pub query: EventQuery,
    pub key: CacheKey,
}

impl Default for FilterState {
    /// Five years back from today, every known category, whole map.
    fn default() -> Self {
        let end = time::today();
        Self {
            start: time::years_before(end, DEFAULT_RANGE_YEARS),
            end,
            categories: category::default_selection(),
            viewport_only: false,
            status: EventStatus::All,
            limit: None,
        }
    }
}

impl FilterState {
    /// Check that the date range is ordered.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidRange`] when `start` is after `end`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.start > self.end {
            return Err(ValidationError::InvalidRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    /// Build the canonical query and cache key for this filter state.
    ///
    /// Categories are deduplicated and sorted. When `viewport_only` is set
    /// and a viewport is known, the viewport is snapped to the quantization
    /// grid and the bounding box is taken from the snapped region, so equal
    /// keys always produce equal requests. Otherwise the query carries no
    /// bounding box and the key uses [`ViewportScope::Unrestricted`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidRange`] when `start` is after `end`.
    pub fn canonicalize(&self, viewport: Option<&Viewport>) -> Result<CanonicalQuery, ValidationError> {
        self.validate()?;

        let categories: Vec<String> = self
            .categories
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(ToString::to_string)
            .collect();

        let region = viewport
            .filter(|_| self.viewport_only)
            .map(Viewport::quantize);

        let query = EventQuery {
            start: self.start,
            end: self.end,
            categories: categories.clone(),
            bbox: region.map(|key| key.to_viewport().to_bbox()),
            status: self.status,
            limit: self.limit,
        };
        let key = CacheKey {
            start: self.start,
            end: self.end,
            categories,
            status: self.status,
            limit: query.effective_limit(),
            viewport: region.map_or(ViewportScope::Unrestricted, ViewportScope::Region),
        };
        Ok(CanonicalQuery { query, key })
    }
}
