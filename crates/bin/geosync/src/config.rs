//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `geosync.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use chrono::NaiveDate;
use geosync_adapter_eonet::EonetConfig;
use geosync_app::cache::CachePolicy;
use geosync_app::fetch_engine::DEFAULT_MAX_PAGES;
use geosync_app::services::events_controller::FILTER_EDIT_DEBOUNCE;
use geosync_domain::error::ValidationError;
use geosync_domain::filter::FilterState;
use geosync_domain::query::{DEFAULT_LIMIT, EventStatus};
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote event catalog.
    pub source: EonetConfig,
    /// Pagination and request shaping.
    pub fetch: FetchConfig,
    /// Result cache windows.
    pub cache: CacheConfig,
    /// Debounce timing.
    pub controller: ControllerConfig,
    /// Initial filter selection.
    pub filters: FilterConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Maximum number of pages fetched per query.
    pub max_pages: usize,
    /// Page size sent to the provider.
    pub limit: u32,
    pub status: EventStatus,
}

/// Initial selection. Status and page size live under `[fetch]` only, so
/// setting them here is rejected.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub categories: Vec<String>,
    pub viewport_only: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub fresh_secs: u64,
    pub max_age_secs: u64,
    pub max_entries: usize,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Quiet period before a changed selection is fetched, in milliseconds.
    pub debounce_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `geosync.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("geosync.toml")?;
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("GEOSYNC_BASE_URL") {
            self.source.base_url = val;
        }
        if let Some(val) = var("GEOSYNC_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.source.timeout_secs = secs;
            }
        }
        if let Some(val) = var("GEOSYNC_DEBOUNCE_MS") {
            if let Ok(ms) = val.parse() {
                self.controller.debounce_ms = ms;
            }
        }
        if let Some(val) = var("GEOSYNC_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.max_pages == 0 {
            return Err(ConfigError::Validation("max_pages must be at least 1".to_string()));
        }
        if self.cache.fresh_secs > self.cache.max_age_secs {
            return Err(ConfigError::Validation(
                "fresh_secs must not exceed max_age_secs".to_string(),
            ));
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::Validation("max_entries must be at least 1".to_string()));
        }
        self.initial_filters().validate()?;
        Ok(())
    }

    #[must_use]
    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            fresh_for: Duration::from_secs(self.cache.fresh_secs),
            max_age: Duration::from_secs(self.cache.max_age_secs),
            max_entries: self.cache.max_entries,
        }
    }

    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.controller.debounce_ms)
    }

    /// The `[filters]` selection shaped by the `[fetch]` status and limit.
    #[must_use]
    pub fn initial_filters(&self) -> FilterState {
        FilterState {
            start: self.filters.start,
            end: self.filters.end,
            categories: self.filters.categories.clone(),
            viewport_only: self.filters.viewport_only,
            status: self.fetch.status,
            limit: Some(self.fetch.limit),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            limit: DEFAULT_LIMIT,
            status: EventStatus::All,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        let FilterState {
            start,
            end,
            categories,
            viewport_only,
            ..
        } = FilterState::default();
        Self {
            start,
            end,
            categories,
            viewport_only,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        let policy = CachePolicy::default();
        Self {
            fresh_secs: policy.fresh_for.as_secs(),
            max_age_secs: policy.max_age.as_secs(),
            max_entries: policy.max_entries,
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: u64::try_from(FILTER_EDIT_DEBOUNCE.as_millis()).unwrap_or(400),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "geosync=info,geosync_app=info,geosync_adapter_eonet=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// The initial filter selection is invalid.
    #[error("invalid initial filters")]
    Filters(#[from] ValidationError),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
