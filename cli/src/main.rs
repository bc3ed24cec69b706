//! `comunica` - scrape judicial communications into per-tribunal JSON files.
//!
//! Configuration is layered: TOML file, then `COMUNICA_*` environment
//! variables, then command-line flags.

mod driver;
mod output;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use comunica_core::{tribunals, RunConfig, TribunalCode, TribunalGroup};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "comunica", version)]
#[command(about = "Scrape the judicial-communications API, one JSON file per tribunal")]
struct Cli {
    /// TOML configuration file (defaults to the platform config directory)
    #[arg(long, global = true, env = "COMUNICA_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    scrape: ScrapeArgs,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List cached runs under the cache directory
    Runs,
    /// Re-derive records from a cached run without touching the network
    Reprocess(ReprocessArgs),
}

#[derive(Debug, Args)]
struct ScrapeArgs {
    /// Comma-separated tribunal codes, e.g. TJSP,TRF3
    #[arg(short, long)]
    tribunals: Option<String>,

    /// Scrape a whole group instead: tj, trf or all
    #[arg(long, conflicts_with = "tribunals")]
    group: Option<TribunalGroup>,

    /// First availability date (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last availability date (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Items per page (1-100)
    #[arg(long)]
    items_per_page: Option<u32>,

    /// Page workers per tribunal
    #[arg(long)]
    page_workers: Option<usize>,

    /// Tribunals scraped at the same time
    #[arg(long)]
    tribunal_workers: Option<usize>,

    /// Initial requests per second per tribunal
    #[arg(long)]
    rps: Option<f64>,

    /// Attempts per request
    #[arg(long)]
    retries: Option<u32>,

    /// Per-attempt timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Budget per tribunal in seconds (0 disables)
    #[arg(long)]
    tribunal_timeout: Option<u64>,

    /// Disable the response cache
    #[arg(long, default_value_t = false)]
    no_cache: bool,

    /// Root of the response cache
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Resume an interrupted run by its stamp, e.g. 2025-11-11_17-45-30
    #[arg(long)]
    resume_run: Option<String>,

    /// Directory receiving <TRIBUNAL>.json files
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Exact communication type to keep (empty keeps all)
    #[arg(long)]
    communication_type: Option<String>,

    /// Exact class code to keep (empty keeps all)
    #[arg(long)]
    class_code: Option<String>,
}

impl ScrapeArgs {
    /// Apply flags on top of file and environment settings.
    fn apply(self, config: &mut RunConfig) -> Result<()> {
        if let Some(list) = self.tribunals {
            config.tribunals = TribunalCode::parse_list(&list).context("invalid --tribunals")?;
        }
        if let Some(group) = self.group {
            config.tribunals = tribunals::codes_for(group);
        }
        if let Some(start) = self.start {
            config.period.start = start;
        }
        if let Some(end) = self.end {
            config.period.end = end;
        }
        if let Some(items) = self.items_per_page {
            config.api.items_per_page = items;
        }
        if let Some(workers) = self.page_workers {
            config.concurrency.page_workers = workers;
        }
        if let Some(workers) = self.tribunal_workers {
            config.concurrency.tribunal_workers = workers;
        }
        if let Some(rps) = self.rps {
            config.concurrency.requests_per_second = rps;
        }
        if let Some(retries) = self.retries {
            config.transport.max_retries = retries;
        }
        if let Some(timeout) = self.timeout {
            config.transport.timeout_secs = timeout;
        }
        if let Some(budget) = self.tribunal_timeout {
            config.concurrency.tribunal_timeout_secs = Some(budget);
        }
        if self.no_cache {
            config.cache.enabled = false;
        }
        if let Some(dir) = self.cache_dir {
            config.cache.base_dir = dir;
        }
        if let Some(stamp) = self.resume_run {
            config.cache.resume_run = Some(stamp);
        }
        if let Some(dir) = self.output_dir {
            config.output.dir = dir;
        }
        if let Some(kind) = self.communication_type {
            config.api.communication_type = kind;
        }
        if let Some(code) = self.class_code {
            config.api.class_code = code;
        }
        Ok(())
    }
}

#[derive(Debug, Args)]
struct ReprocessArgs {
    /// Run directory, either a path or a name under the cache directory
    run: String,

    /// Exact communication type to keep (empty keeps all)
    #[arg(long)]
    communication_type: Option<String>,

    /// Exact class code to keep (empty keeps all)
    #[arg(long)]
    class_code: Option<String>,

    /// Directory receiving the re-derived file
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

/// Initialize tracing subscriber for logging
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,comunica=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<RunConfig> {
    let mut config = match path {
        Some(path) => RunConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => RunConfig::load_default().context("failed to load config")?,
    };
    config
        .apply_env_overrides()
        .context("invalid environment override")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    info!("Starting comunica v{}", env!("CARGO_PKG_VERSION"));
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Some(Command::Runs) => driver::list_cached_runs(&config).await,
        Some(Command::Reprocess(args)) => {
            let request = driver::ReprocessRequest {
                run: args.run,
                communication_type: args
                    .communication_type
                    .unwrap_or_else(|| config.api.communication_type.clone()),
                class_code: args
                    .class_code
                    .unwrap_or_else(|| config.api.class_code.clone()),
                output_dir: args.output_dir.unwrap_or_else(|| config.output.dir.clone()),
            };
            driver::reprocess(&config, request).await
        }
        None => {
            cli.scrape.apply(&mut config)?;
            config.validate().context("invalid configuration")?;

            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, stopping after in-flight requests");
                    trigger.cancel();
                }
            });

            let summary = driver::run(config, cancel).await?;
            if summary.failed > 0 {
                warn!("{} tribunal(s) failed", summary.failed);
            }
            Ok(())
        }
    }
}
