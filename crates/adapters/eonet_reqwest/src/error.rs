//! Event source adapter error types.

use geosync_domain::error::FetchError;

/// Errors specific to the EONET adapter.
#[derive(Debug, thiserror::Error)]
pub enum EonetError {
    /// The HTTP client could not be built from the configuration.
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),

    /// The configured endpoint is not a valid URL.
    #[error("invalid event source URL {url:?}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The server answered with a non-success status.
    #[error("event source answered with status {status}")]
    Status { status: u16 },

    /// No usable response: connection, timeout, or body decoding failure.
    #[error("event source request failed")]
    Http(#[source] reqwest::Error),
}

impl From<reqwest::Error> for EonetError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err)
    }
}

impl From<EonetError> for FetchError {
    fn from(err: EonetError) -> Self {
        match err {
            EonetError::Status { status } => Self::RemoteFetch { status },
            other => Self::transport(describe(&other)),
        }
    }
}

/// Render an error with its whole source chain.
fn describe(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
