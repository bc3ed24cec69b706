//! Scrape orchestrator.
//!
//! Runs up to `tribunal_workers` tribunals at once. Each tribunal discovers
//! its page count from page 1, then hands the page numbers to a bounded
//! queue drained by `page_workers` workers; a single aggregator collects the
//! filtered records. A failed page is counted and skipped, a failed tribunal
//! never affects its siblings.

use crate::cache::ResponseCache;
use crate::error::{Result, ScanError};
use crate::filter::RecordFilter;
use crate::model::{ApiPage, Record};
use crate::rate_limiter::AdaptiveRateLimiter;
use crate::source::{ApiClient, PageSource};
use crate::url_builder::PageRequest;
use comunica_core::{RunConfig, TribunalCode};
use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use std::convert::Infallible;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// A progress line is logged every this many completed pages.
pub const PROGRESS_EVERY: u32 = 10;

/// Number of pages needed for `count` items; 0 when either input is not
/// positive.
#[must_use]
pub fn total_pages(count: i64, items_per_page: i64) -> u32 {
    if count <= 0 || items_per_page <= 0 {
        return 0;
    }
    let pages = (count - 1) / items_per_page + 1;
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Result of scraping one tribunal.
#[derive(Debug)]
pub struct TribunalOutcome {
    /// Tribunal that was scraped
    pub tribunal: TribunalCode,
    /// Filtered records, in no particular order
    pub records: Vec<Record>,
    /// Pages reported by discovery
    pub total_pages: u32,
    /// Pages that failed after retries or could not be decoded
    pub page_errors: u32,
    /// Tribunal-level failure (discovery, cache directory)
    pub error: Option<ScanError>,
    /// Whether the run or the tribunal deadline stopped this tribunal early
    pub cancelled: bool,
    /// Wall-clock time spent on this tribunal
    pub elapsed: Duration,
}

impl TribunalOutcome {
    fn empty(tribunal: TribunalCode) -> Self {
        Self {
            tribunal,
            records: Vec::new(),
            total_pages: 0,
            page_errors: 0,
            error: None,
            cancelled: false,
            elapsed: Duration::ZERO,
        }
    }

    /// Completed without a tribunal-level error or cancellation.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && !self.cancelled
    }
}

#[derive(Debug, Default)]
struct Collected {
    records: Vec<Record>,
    total_pages: u32,
    page_errors: u32,
}

/// Everything a page worker needs to load one page.
struct PageContext<'a> {
    source: &'a dyn PageSource,
    cache: &'a ResponseCache,
    limiter: &'a AdaptiveRateLimiter,
    cancel: &'a CancellationToken,
}

impl PageContext<'_> {
    /// Cache first, then the source. Fresh payloads are decoded before
    /// they are cached, and only pages reporting success are written, so a
    /// resumed run never replays an upstream refusal.
    async fn load_page(&self, request: &PageRequest) -> Result<ApiPage> {
        let key = request.cache_key();
        if let Some(bytes) = self.cache.read(&key).await {
            match ApiPage::from_slice(&bytes) {
                Ok(page) if page.is_success() => return Ok(page),
                Ok(page) => debug!(
                    tribunal = %request.tribunal,
                    page = request.page,
                    status = %page.status,
                    "Cached page is not a success, refetching"
                ),
                Err(e) => warn!(
                    tribunal = %request.tribunal,
                    page = request.page,
                    "Cached payload is unreadable, refetching: {}",
                    e
                ),
            }
        }

        let bytes = self
            .source
            .fetch_page(self.limiter, request, self.cancel)
            .await?;
        if bytes.is_empty() {
            return Err(ScanError::EmptyBody {
                tribunal: request.tribunal.clone(),
                page: request.page,
            });
        }

        let page = ApiPage::from_slice(&bytes).map_err(|source| ScanError::Decode {
            tribunal: request.tribunal.clone(),
            page: request.page,
            source,
        })?;

        if !page.is_success() {
            return Ok(page);
        }
        if let Err(e) = self.cache.write(&key, &bytes).await {
            warn!(
                tribunal = %request.tribunal,
                page = request.page,
                "Failed to write cache entry: {}",
                e
            );
        }
        Ok(page)
    }
}

/// Orchestrates scraping across tribunals and pages.
pub struct ScrapeOrchestrator {
    config: Arc<RunConfig>,
    source: Arc<dyn PageSource>,
    filter: RecordFilter,
    run_stamp: String,
    cancel: CancellationToken,
}

impl ScrapeOrchestrator {
    /// Create an orchestrator reading pages from `source`.
    ///
    /// The run stamp is taken from the configuration (resume stamp or the
    /// local clock) at construction time.
    #[must_use]
    pub fn new(config: Arc<RunConfig>, source: Arc<dyn PageSource>) -> Self {
        Self {
            filter: RecordFilter::from_config(&config.api),
            run_stamp: config.run_stamp(),
            cancel: CancellationToken::new(),
            config,
            source,
        }
    }

    /// Create an orchestrator talking to the upstream API.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built from `config`.
    pub fn from_config(config: Arc<RunConfig>) -> Result<Self> {
        let client = ApiClient::from_config(&config)?;
        Ok(Self::new(config, Arc::new(client)))
    }

    /// Override the run stamp naming the cache directories.
    #[must_use]
    pub fn with_run_stamp(mut self, run_stamp: impl Into<String>) -> Self {
        self.run_stamp = run_stamp.into();
        self
    }

    /// Stop work when `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Stamp naming this run's cache directories.
    #[must_use]
    pub fn run_stamp(&self) -> &str {
        &self.run_stamp
    }

    /// Configuration this orchestrator runs with.
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Scrape every configured tribunal.
    ///
    /// Outcomes arrive in completion order. Tribunals not started before
    /// cancellation are reported as cancelled with no records.
    pub async fn scrape_all(&self) -> Vec<TribunalOutcome> {
        let limit = self.config.concurrency.tribunal_workers.max(1);
        let mut futures = FuturesUnordered::new();
        let mut outcomes = Vec::with_capacity(self.config.tribunals.len());

        for tribunal in &self.config.tribunals {
            if self.cancel.is_cancelled() {
                debug!(tribunal = %tribunal, "Run cancelled, skipping tribunal");
                let mut outcome = TribunalOutcome::empty(tribunal.clone());
                outcome.cancelled = true;
                outcomes.push(outcome);
                continue;
            }

            futures.push(self.scrape_tribunal(tribunal));

            // Respect concurrency limit
            while futures.len() >= limit {
                if let Some(outcome) = futures.next().await {
                    outcomes.push(outcome);
                }
            }
        }

        while let Some(outcome) = futures.next().await {
            outcomes.push(outcome);
        }

        outcomes
    }

    /// Scrape one tribunal to completion, failure, or cancellation.
    #[instrument(skip(self, tribunal), fields(tribunal = %tribunal))]
    pub async fn scrape_tribunal(&self, tribunal: &TribunalCode) -> TribunalOutcome {
        let started = Instant::now();
        let cancel = self.cancel.child_token();

        let deadline = async {
            if let Some(limit) = self.config.tribunal_timeout() {
                tokio::time::sleep(limit).await;
                warn!("Tribunal exceeded its {:?} budget, cancelling", limit);
                cancel.cancel();
            }
            std::future::pending::<Infallible>().await
        };

        info!("Starting tribunal");
        let result = tokio::select! {
            result = self.run_tribunal(tribunal, &cancel) => result,
            never = deadline => match never {},
        };

        let mut outcome = TribunalOutcome::empty(tribunal.clone());
        outcome.cancelled = cancel.is_cancelled();
        match result {
            Ok(collected) => {
                outcome.records = collected.records;
                outcome.total_pages = collected.total_pages;
                outcome.page_errors = collected.page_errors;
            }
            Err(ScanError::Cancelled) => outcome.cancelled = true,
            Err(e) => {
                error!("Tribunal failed: {}", e);
                outcome.error = Some(e);
            }
        }
        outcome.elapsed = started.elapsed();

        info!(
            records = outcome.records.len(),
            page_errors = outcome.page_errors,
            cancelled = outcome.cancelled,
            elapsed_ms = outcome.elapsed.as_millis(),
            "Tribunal finished"
        );
        outcome
    }

    async fn run_tribunal(
        &self,
        tribunal: &TribunalCode,
        cancel: &CancellationToken,
    ) -> Result<Collected> {
        let cache = ResponseCache::open(self.config.cache_dir_for_run(tribunal, &self.run_stamp));
        cache.ensure_dir().await?;
        if let Some(dir) = cache.dir() {
            info!(cache = %dir.display(), "Using cache directory");
        }

        let limiter = AdaptiveRateLimiter::new(self.config.concurrency.requests_per_second);
        let ctx = PageContext {
            source: self.source.as_ref(),
            cache: &cache,
            limiter: &limiter,
            cancel,
        };

        let first_request = PageRequest {
            tribunal: tribunal.clone(),
            page: 1,
            items_per_page: self.config.api.items_per_page,
            start: self.config.period.start,
            end: self.config.period.end,
        };

        let first = ctx.load_page(&first_request).await?;
        if !first.is_success() {
            return Err(ScanError::Discovery {
                tribunal: tribunal.clone(),
                status: first.status,
                message: first.message,
            });
        }

        let total = total_pages(first.count, i64::from(self.config.api.items_per_page));
        info!(count = first.count, total_pages = total, "Discovered page count");
        if total == 0 {
            return Ok(Collected::default());
        }

        Ok(self.collect_pages(&ctx, &first_request, total, first).await)
    }

    /// Fan pages `1..=total` out to the page workers and gather their records.
    ///
    /// `first` is the already-decoded discovery page, served to whichever
    /// worker dequeues page 1.
    async fn collect_pages(
        &self,
        ctx: &PageContext<'_>,
        template: &PageRequest,
        total: u32,
        first: ApiPage,
    ) -> Collected {
        let workers = self.config.concurrency.page_workers.max(1);
        let (page_tx, page_rx) = mpsc::channel::<u32>(workers * 2);
        let (batch_tx, mut batch_rx) = mpsc::channel::<Vec<Record>>(workers);

        let page_rx = &Mutex::new(page_rx);
        let primed = &Mutex::new(Some(first));
        let processed = &AtomicU32::new(0);
        let failed = &AtomicU32::new(0);
        let filter = &self.filter;

        let producer = async move {
            for page in 1..=total {
                tokio::select! {
                    biased;
                    () = ctx.cancel.cancelled() => break,
                    sent = page_tx.send(page) => if sent.is_err() { break },
                }
            }
        };

        let page_workers: Vec<_> = (0..workers)
            .map(|_| {
                let batch_tx = batch_tx.clone();
                async move {
                    loop {
                        let next = page_rx.lock().await.recv().await;
                        let Some(page) = next else { break };
                        if ctx.cancel.is_cancelled() {
                            continue;
                        }

                        let reused = if page == 1 {
                            primed.lock().await.take()
                        } else {
                            None
                        };
                        let result = match reused {
                            Some(api_page) => Ok(api_page),
                            None => ctx.load_page(&template.for_page(page)).await,
                        };

                        match result {
                            Ok(api_page) => {
                                let batch: Vec<Record> = api_page
                                    .items
                                    .iter()
                                    .filter(|item| filter.matches(item))
                                    .map(Record::from_item)
                                    .collect();
                                debug!(page, matched = batch.len(), "Page processed");
                                if !batch.is_empty() && batch_tx.send(batch).await.is_err() {
                                    break;
                                }
                            }
                            Err(ScanError::Cancelled) => continue,
                            Err(e) => {
                                failed.fetch_add(1, Ordering::Relaxed);
                                warn!(page, "Page failed: {}", e);
                            }
                        }

                        let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                        if done % PROGRESS_EVERY == 0 || done == total {
                            info!(
                                processed = done,
                                total,
                                errors = failed.load(Ordering::Relaxed),
                                "Progress: {}/{} pages ({:.1}%)",
                                done,
                                total,
                                f64::from(done) / f64::from(total) * 100.0
                            );
                        }
                    }
                }
            })
            .collect();
        drop(batch_tx);

        let aggregator = async move {
            let mut records = Vec::new();
            while let Some(batch) = batch_rx.recv().await {
                records.extend(batch);
            }
            records
        };

        let ((), _, records) = tokio::join!(producer, join_all(page_workers), aggregator);

        Collected {
            records,
            total_pages: total,
            page_errors: failed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(250, 100), 3);
        assert_eq!(total_pages(200, 100), 2);
        assert_eq!(total_pages(1, 100), 1);
        assert_eq!(total_pages(0, 100), 0);
        assert_eq!(total_pages(-5, 100), 0);
        assert_eq!(total_pages(250, 0), 0);
        assert_eq!(total_pages(250, -1), 0);
        assert_eq!(total_pages(i64::MAX, 1), u32::MAX);
    }

    #[test]
    fn test_outcome_completeness() {
        let tribunal = TribunalCode::new("TJAM").expect("valid code");
        let mut outcome = TribunalOutcome::empty(tribunal);
        assert!(outcome.is_complete());

        outcome.cancelled = true;
        assert!(!outcome.is_complete());

        outcome.cancelled = false;
        outcome.error = Some(ScanError::Cancelled);
        assert!(!outcome.is_complete());
    }
}
