//! Event source configuration.

use std::time::Duration;

use serde::Deserialize;

/// Public EONET v3 events endpoint.
pub const DEFAULT_BASE_URL: &str = "https://eonet.gsfc.nasa.gov/api/v3/events";

/// Configuration for the EONET event source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EonetConfig {
    /// Events endpoint; first-page parameters are appended to it.
    pub base_url: String,
    /// Per-request timeout, in seconds.
    pub timeout_secs: u64,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for EonetConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            user_agent: concat!("geosync/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl EonetConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
