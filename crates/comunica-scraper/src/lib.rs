//! Comunica Scraper - paginated scraping of the judicial-communications API.
//!
//! This crate fetches every page of every configured tribunal's listing for a
//! date window, filters the items, and normalizes them into [`Record`]s. It is
//! built to stay polite under upstream rate limits while keeping enough
//! requests in flight to finish large tribunals in reasonable time.
//!
//! # Features
//!
//! - Two-level worker pools: tribunals in parallel, pages in parallel
//! - Adaptive token-bucket rate limiting per tribunal, driven by HTTP 429s
//! - Local retries with exponential backoff and jitter
//! - Content-addressed response cache, resumable across runs
//! - Despacho-date extraction from free text
//! - Cooperative cancellation with an optional per-tribunal deadline
//!
//! # Example
//!
//! ```rust,ignore
//! use comunica_core::RunConfig;
//! use comunica_scraper::ScrapeOrchestrator;
//! use std::sync::Arc;
//!
//! let config = Arc::new(RunConfig::load_default()?);
//! let orchestrator = ScrapeOrchestrator::from_config(config)?
//!     .with_cancellation(cancel.clone());
//!
//! for outcome in orchestrator.scrape_all().await {
//!     println!("{}: {} records", outcome.tribunal, outcome.records.len());
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod backoff;
#[allow(missing_docs)]
pub mod cache;
#[allow(missing_docs)]
pub mod error;
pub mod extract;
#[allow(missing_docs)]
pub mod filter;
#[allow(missing_docs)]
pub mod model;
pub mod orchestrator;
pub mod rate_limiter;
#[allow(missing_docs)]
pub mod reprocess;
pub mod source;
#[allow(missing_docs)]
pub mod transport;
#[allow(missing_docs)]
pub mod url_builder;

// Re-export commonly used types
pub use cache::{CacheKey, ResponseCache};
pub use error::{Result, ScanError};
pub use extract::extract_despacho_date;
pub use filter::RecordFilter;
pub use model::{ApiItem, ApiPage, Record};
pub use orchestrator::{total_pages, ScrapeOrchestrator, TribunalOutcome};
pub use rate_limiter::{AdaptiveRateLimiter, LimiterSnapshot};
pub use reprocess::{list_runs, reprocess_run, CacheRun, ReprocessSummary};
pub use source::{ApiClient, PageSource};
pub use transport::{FetchedBody, HttpTransport};
pub use url_builder::{build_page_url, PageRequest};
