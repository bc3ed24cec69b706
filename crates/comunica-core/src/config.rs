//! Run configuration.
//!
//! A [`RunConfig`] is built once at startup (TOML file, then environment,
//! then command-line flags), validated, and handed read-only to every
//! component. Nothing downstream keeps global or mutable configuration.

use crate::error::{ConfigError, ConfigResult};
use crate::types::TribunalCode;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default upstream endpoint.
pub const DEFAULT_BASE_URL: &str = "https://comunicaapi.pje.jus.br/api/v1/comunicacao";

/// Largest page size the upstream accepts.
pub const MAX_ITEMS_PER_PAGE: u32 = 100;

/// Format of the per-run directory suffix, e.g. `TJSP_2025-11-11_17-45-30`.
pub const RUN_STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Complete configuration of one scraping run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Upstream API and filter settings
    pub api: ApiConfig,
    /// Availability-date window
    pub period: PeriodConfig,
    /// Worker pool sizes and request rate
    pub concurrency: ConcurrencyConfig,
    /// Retry and timeout settings
    pub transport: TransportConfig,
    /// Response cache settings
    pub cache: CacheConfig,
    /// Output settings
    pub output: OutputConfig,
    /// Tribunals to scrape
    pub tribunals: Vec<TribunalCode>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            period: PeriodConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            transport: TransportConfig::default(),
            cache: CacheConfig::default(),
            output: OutputConfig::default(),
            tribunals: vec![TribunalCode::new("TJAM").expect("valid default tribunal")],
        }
    }
}

impl RunConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns error if the file is missing, unreadable, or not valid TOML.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }
        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Load configuration from the platform config directory, falling back to
    /// defaults when no file exists there.
    pub fn load_default() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Get the path to the default configuration file.
    ///
    /// Uses XDG base directories: `~/.config/comunica/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("br", "comunica", "comunica").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Apply environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `COMUNICA_RPS`: initial requests per second
    /// - `COMUNICA_PAGE_WORKERS`: page workers per tribunal
    /// - `COMUNICA_TRIBUNAL_WORKERS`: concurrent tribunals
    /// - `COMUNICA_CACHE_ENABLED`: `true`/`false`
    /// - `COMUNICA_TRIBUNALS`: comma-separated tribunal codes
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        if let Ok(val) = std::env::var("COMUNICA_RPS") {
            if let Ok(rps) = val.parse() {
                self.concurrency.requests_per_second = rps;
                tracing::debug!("Override requests_per_second from env: {}", rps);
            }
        }

        if let Ok(val) = std::env::var("COMUNICA_PAGE_WORKERS") {
            if let Ok(workers) = val.parse() {
                self.concurrency.page_workers = workers;
                tracing::debug!("Override page_workers from env: {}", workers);
            }
        }

        if let Ok(val) = std::env::var("COMUNICA_TRIBUNAL_WORKERS") {
            if let Ok(workers) = val.parse() {
                self.concurrency.tribunal_workers = workers;
                tracing::debug!("Override tribunal_workers from env: {}", workers);
            }
        }

        if let Ok(val) = std::env::var("COMUNICA_CACHE_ENABLED") {
            if let Ok(enabled) = val.parse() {
                self.cache.enabled = enabled;
                tracing::debug!("Override cache.enabled from env: {}", enabled);
            }
        }

        if let Ok(val) = std::env::var("COMUNICA_TRIBUNALS") {
            self.tribunals = TribunalCode::parse_list(&val)
                .map_err(|e| ConfigError::invalid("tribunals", e.to_string()))?;
            tracing::debug!("Override tribunals from env: {}", val);
        }

        Ok(())
    }

    /// Check every invariant the pipeline relies on.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] for the first offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.api.items_per_page == 0 || self.api.items_per_page > MAX_ITEMS_PER_PAGE {
            return Err(ConfigError::invalid(
                "api.items_per_page",
                format!("must be between 1 and {MAX_ITEMS_PER_PAGE}"),
            ));
        }
        if url::Url::parse(&self.api.base_url).is_err() {
            return Err(ConfigError::invalid("api.base_url", "not a valid URL"));
        }
        if self.period.start > self.period.end {
            return Err(ConfigError::invalid(
                "period",
                format!("start {} is after end {}", self.period.start, self.period.end),
            ));
        }
        if self.concurrency.tribunal_workers == 0 {
            return Err(ConfigError::invalid(
                "concurrency.tribunal_workers",
                "must be at least 1",
            ));
        }
        if self.concurrency.page_workers == 0 {
            return Err(ConfigError::invalid(
                "concurrency.page_workers",
                "must be at least 1",
            ));
        }
        if !(self.concurrency.requests_per_second.is_finite()
            && self.concurrency.requests_per_second > 0.0)
        {
            return Err(ConfigError::invalid(
                "concurrency.requests_per_second",
                "must be a positive number",
            ));
        }
        if self.transport.max_retries == 0 {
            return Err(ConfigError::invalid(
                "transport.max_retries",
                "must be at least 1",
            ));
        }
        if self.transport.timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "transport.timeout_secs",
                "must be at least 1",
            ));
        }
        if self.tribunals.is_empty() {
            return Err(ConfigError::invalid("tribunals", "at least one is required"));
        }
        if let Some(stamp) = self.cache.resume_run.as_deref().map(str::trim) {
            // Joined into the cache path, so only a bare stamp is accepted.
            if !stamp.is_empty()
                && NaiveDateTime::parse_from_str(stamp, RUN_STAMP_FORMAT).is_err()
            {
                return Err(ConfigError::invalid(
                    "cache.resume_run",
                    format!("expected a run stamp like 2025-11-11_17-45-30, got '{stamp}'"),
                ));
            }
        }
        Ok(())
    }

    /// Per-attempt request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.transport.timeout_secs)
    }

    /// Optional wall-clock budget for a single tribunal.
    #[must_use]
    pub fn tribunal_timeout(&self) -> Option<Duration> {
        self.concurrency
            .tribunal_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Run stamp for this run: the configured resume stamp, or `now`.
    #[must_use]
    pub fn run_stamp_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        match &self.cache.resume_run {
            Some(stamp) if !stamp.trim().is_empty() => stamp.trim().to_string(),
            _ => now.format(RUN_STAMP_FORMAT).to_string(),
        }
    }

    /// Run stamp based on the local clock.
    #[must_use]
    pub fn run_stamp(&self) -> String {
        self.run_stamp_at(&Local::now())
    }

    /// Cache directory for one tribunal in one run, or `None` when caching
    /// is disabled. Layout: `<base_dir>/<TRIBUNAL>_<run stamp>`.
    #[must_use]
    pub fn cache_dir_for_run(&self, tribunal: &TribunalCode, run_stamp: &str) -> Option<PathBuf> {
        self.cache
            .enabled
            .then(|| self.cache.base_dir.join(format!("{tribunal}_{run_stamp}")))
    }
}

/// Upstream API and filter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Endpoint queried for every page
    pub base_url: String,
    /// `User-Agent` header sent with every request
    pub user_agent: String,
    /// Page size (`itensPorPagina`)
    pub items_per_page: u32,
    /// Exact-match `tipoComunicacao` filter; empty disables it
    pub communication_type: String,
    /// Exact-match `codigoClasse` filter; empty disables it
    pub class_code: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36"
                .to_string(),
            items_per_page: MAX_ITEMS_PER_PAGE,
            communication_type: "Lista de distribuição".to_string(),
            class_code: "12154".to_string(),
        }
    }
}

/// Availability-date window, inclusive on both ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodConfig {
    /// `dataDisponibilizacaoInicio`
    pub start: NaiveDate,
    /// `dataDisponibilizacaoFim`
    pub end: NaiveDate,
}

impl Default for PeriodConfig {
    fn default() -> Self {
        let today = Local::now().date_naive();
        Self {
            start: today,
            end: today,
        }
    }
}

/// Worker pool sizes and request rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Tribunals scraped at the same time
    pub tribunal_workers: usize,
    /// Page workers per tribunal
    pub page_workers: usize,
    /// Initial request rate per tribunal (req/s)
    pub requests_per_second: f64,
    /// Optional budget per tribunal in seconds; unset or 0 means unbounded
    pub tribunal_timeout_secs: Option<u64>,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            tribunal_workers: 1,
            page_workers: 3,
            requests_per_second: 3.0,
            tribunal_timeout_secs: None,
        }
    }
}

/// Retry and timeout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Attempts per logical request
    pub max_retries: u32,
    /// Per-attempt timeout in seconds
    pub timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout_secs: 30,
        }
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether responses are cached at all
    pub enabled: bool,
    /// Root holding one directory per tribunal and run
    pub base_dir: PathBuf,
    /// Reuse the run stamp of an earlier, interrupted run
    pub resume_run: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_dir: PathBuf::from("cache"),
            resume_run: None,
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving one `<TRIBUNAL>.json` per tribunal
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("resultados"),
        }
    }
}
