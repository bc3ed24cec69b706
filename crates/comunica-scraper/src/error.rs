use comunica_core::TribunalCode;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while fetching, caching, or decoding upstream pages.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("rate limited by upstream (HTTP 429)")]
    RateLimited,

    #[error("upstream returned HTTP {status}")]
    TransientServer { status: u16 },

    #[error("request failed after {attempts} attempts: {last}")]
    Transport { attempts: u32, last: Box<ScanError> },

    #[error("malformed JSON for {tribunal} page {page}: {source}")]
    Decode {
        tribunal: TribunalCode,
        page: u32,
        #[source]
        source: serde_json::Error,
    },

    #[error("empty response body for {tribunal} page {page}")]
    EmptyBody { tribunal: TribunalCode, page: u32 },

    #[error("discovery failed for {tribunal}: status={status}, message={message}")]
    Discovery {
        tribunal: TribunalCode,
        status: String,
        message: String,
    },

    #[error("cache error: {0}")]
    Cache(#[from] std::io::Error),

    #[error("invalid upstream URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl ScanError {
    /// Errors the transport retries locally before giving up.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout(_) | Self::RateLimited | Self::TransientServer { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
