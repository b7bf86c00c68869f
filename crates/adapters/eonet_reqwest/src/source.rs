use std::future::Future;

use geosync_app::ports::{EventSource, PageRequest};
use geosync_domain::error::FetchError;
use geosync_domain::event::EventPage;
use geosync_domain::query::EventQuery;
use url::Url;

use crate::config::EonetConfig;
use crate::error::EonetError;

/// [`EventSource`] fetching pages from an EONET-compatible endpoint.
#[derive(Debug, Clone)]
pub struct EonetSource {
    client: reqwest::Client,
    base_url: Url,
}

impl EonetSource {
    /// Build a source from its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EonetError::InvalidUrl`] when `base_url` does not parse and
    /// [`EonetError::Client`] when the HTTP client cannot be built.
    pub fn new(config: &EonetConfig) -> Result<Self, EonetError> {
        let base_url = Url::parse(&config.base_url).map_err(|source| EonetError::InvalidUrl {
            url: config.base_url.clone(),
            source,
        })?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(EonetError::Client)?;

        Ok(Self { client, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// First-page URL for `query`.
    #[must_use]
    pub fn build_url(&self, query: &EventQuery) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().extend_pairs(query.query_pairs());
        url
    }

    async fn fetch(&self, request: PageRequest) -> Result<EventPage, EonetError> {
        let url = match request {
            PageRequest::First(query) => self.build_url(&query),
            PageRequest::Next(link) => Url::parse(&link).map_err(|source| EonetError::InvalidUrl {
                url: link.clone(),
                source,
            })?,
        };

        tracing::debug!(%url, "requesting event page");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EonetError::Status {
                status: status.as_u16(),
            });
        }
        Ok(response.json::<EventPage>().await?)
    }
}

impl EventSource for EonetSource {
    fn fetch_page(
        &self,
        request: PageRequest,
    ) -> impl Future<Output = Result<EventPage, FetchError>> + Send {
        async move { self.fetch(request).await.map_err(FetchError::from) }
    }
}
