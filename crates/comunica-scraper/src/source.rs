//! Where page payloads come from.

use crate::error::Result;
use crate::filter::RecordFilter;
use crate::rate_limiter::AdaptiveRateLimiter;
use crate::transport::HttpTransport;
use crate::url_builder::{build_page_url, PageRequest};
use async_trait::async_trait;
use comunica_core::RunConfig;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Source of raw page payloads.
///
/// The orchestrator only sees this trait, so tests can script page contents
/// and failures without a network.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch the raw bytes of one page.
    ///
    /// Implementations pace themselves through `limiter` and stop early when
    /// `cancel` fires.
    ///
    /// # Errors
    /// Returns error if the page cannot be obtained after local retries.
    async fn fetch_page(
        &self,
        limiter: &AdaptiveRateLimiter,
        request: &PageRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>>;
}

/// [`PageSource`] backed by the upstream HTTP API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    transport: HttpTransport,
    base_url: Url,
    filter: RecordFilter,
}

impl ApiClient {
    /// Create a client querying `base_url` with `filter` as query parameters.
    #[must_use]
    pub fn new(transport: HttpTransport, base_url: Url, filter: RecordFilter) -> Self {
        Self {
            transport,
            base_url,
            filter,
        }
    }

    /// Build the client, transport and filter from the run configuration.
    ///
    /// # Errors
    /// Returns error if the base URL is invalid or the HTTP client cannot be
    /// created.
    pub fn from_config(config: &RunConfig) -> Result<Self> {
        Ok(Self::new(
            HttpTransport::from_config(config)?,
            Url::parse(&config.api.base_url)?,
            RecordFilter::from_config(&config.api),
        ))
    }

    /// Full URL of one page.
    #[must_use]
    pub fn page_url(&self, request: &PageRequest) -> Url {
        build_page_url(&self.base_url, request, &self.filter)
    }
}

#[async_trait]
impl PageSource for ApiClient {
    async fn fetch_page(
        &self,
        limiter: &AdaptiveRateLimiter,
        request: &PageRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let url = self.page_url(request);
        let body = self.transport.fetch(limiter, &url, cancel).await?;
        Ok(body.bytes)
    }
}
