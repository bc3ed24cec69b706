//! HTTP transport with local retries.
//!
//! Every attempt waits on the tribunal's rate limiter, runs under a
//! per-attempt timeout and reports its outcome back to the limiter. A logical
//! request makes at most `max_retries` attempts; there is no sleep after the
//! last one.

use crate::backoff::{backoff_delay, parse_retry_after, throttle_delay};
use crate::error::{Result, ScanError};
use crate::rate_limiter::AdaptiveRateLimiter;
use comunica_core::RunConfig;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

/// Idle connections kept per host.
const POOL_MAX_IDLE_PER_HOST: usize = 10;

/// How long an idle pooled connection is kept.
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Characters of an unexpected response body echoed to the log.
const BODY_SNIPPET_CHARS: usize = 200;

/// A successful (2xx) response.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub status: u16,
    pub bytes: Vec<u8>,
}

struct Reply {
    status: StatusCode,
    retry_after: Option<Duration>,
    bytes: Vec<u8>,
}

/// Pooled HTTP client plus retry policy.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    max_retries: u32,
    timeout: Duration,
}

impl HttpTransport {
    /// Build a transport sending `user_agent` and `Accept: application/json`.
    ///
    /// # Errors
    /// Returns [`ScanError::Client`] if the header or the client is invalid.
    pub fn new(user_agent: &str, timeout: Duration, max_retries: u32) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .map_err(|e| ScanError::Client(format!("invalid user agent: {e}")))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .build()
            .map_err(|e| ScanError::Client(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_retries: max_retries.max(1),
            timeout,
        })
    }

    /// Build from the run configuration.
    ///
    /// # Errors
    /// See [`HttpTransport::new`].
    pub fn from_config(config: &RunConfig) -> Result<Self> {
        Self::new(
            &config.api.user_agent,
            config.request_timeout(),
            config.transport.max_retries,
        )
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// GET `url` until a 2xx arrives, the attempts run out, or `cancel` fires.
    ///
    /// # Errors
    /// [`ScanError::Cancelled`] on cancellation, otherwise
    /// [`ScanError::Transport`] carrying the last attempt's failure.
    pub async fn fetch(
        &self,
        limiter: &AdaptiveRateLimiter,
        url: &Url,
        cancel: &CancellationToken,
    ) -> Result<FetchedBody> {
        let mut attempt: u32 = 0;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ScanError::Cancelled),
                () = limiter.acquire() => {}
            }

            let started = Instant::now();
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ScanError::Cancelled),
                outcome = self.send_once(url) => outcome,
            };
            let elapsed_ms = started.elapsed().as_millis();

            let (error, delay) = match outcome {
                Ok(reply) if reply.status.is_success() => {
                    limiter.report_success().await;
                    debug!(
                        url = %url,
                        attempt = attempt + 1,
                        status = reply.status.as_u16(),
                        elapsed_ms,
                        "Request succeeded"
                    );
                    return Ok(FetchedBody {
                        status: reply.status.as_u16(),
                        bytes: reply.bytes,
                    });
                }
                Ok(reply) if reply.status == StatusCode::TOO_MANY_REQUESTS => {
                    limiter.report_throttled().await;
                    (
                        ScanError::RateLimited,
                        throttle_delay(reply.retry_after, attempt),
                    )
                }
                Ok(reply) => {
                    let status = reply.status.as_u16();
                    if !matches!(status, 502..=504) {
                        warn!(
                            url = %url,
                            status,
                            body = %snippet(&reply.bytes),
                            "Unexpected HTTP status"
                        );
                    }
                    (ScanError::TransientServer { status }, backoff_delay(attempt))
                }
                Err(e) => (e, backoff_delay(attempt)),
            };

            attempt += 1;
            if attempt >= self.max_retries {
                return Err(ScanError::Transport {
                    attempts: attempt,
                    last: Box::new(error),
                });
            }

            warn!(
                url = %url,
                attempt,
                max_retries = self.max_retries,
                elapsed_ms,
                "Request failed ({}), retrying in {:?}",
                error,
                delay
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ScanError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One attempt: send and read the whole body under the timeout.
    async fn send_once(&self, url: &Url) -> Result<Reply> {
        let exchange = async {
            let response = self.client.get(url.clone()).send().await?;
            let status = response.status();
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let bytes = response.bytes().await?.to_vec();
            Ok::<_, ScanError>(Reply {
                status,
                retry_after,
                bytes,
            })
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ScanError::Timeout(self.timeout))?
    }
}

fn snippet(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .take(BODY_SNIPPET_CHARS)
        .collect()
}
