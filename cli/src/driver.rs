//! Run driver: scrape, write one file per tribunal, summarize.

use crate::output;
use anyhow::{Context, Result};
use comunica_core::{tribunals, RunConfig};
use comunica_scraper::{
    list_runs, reprocess_run, CacheRun, RecordFilter, ScrapeOrchestrator, TribunalOutcome,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Totals over one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub tribunals: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub records: usize,
    pub page_errors: u32,
    pub files_written: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    fn record(&mut self, outcome: &TribunalOutcome) {
        self.tribunals += 1;
        self.records += outcome.records.len();
        self.page_errors += outcome.page_errors;
        if outcome.error.is_some() {
            self.failed += 1;
        } else if outcome.cancelled {
            self.cancelled += 1;
        } else {
            self.completed += 1;
        }
    }
}

/// Scrape every configured tribunal and write `<TRIBUNAL>.json` files.
///
/// Only configuration and output-directory problems are errors here; a
/// tribunal that fails is logged and counted.
pub async fn run(config: RunConfig, cancel: CancellationToken) -> Result<RunSummary> {
    let started = Instant::now();
    std::fs::create_dir_all(&config.output.dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            config.output.dir.display()
        )
    })?;

    let config = Arc::new(config);
    let orchestrator = ScrapeOrchestrator::from_config(config.clone())
        .context("failed to build HTTP client")?
        .with_cancellation(cancel);

    info!(
        run = orchestrator.run_stamp(),
        tribunals = config.tribunals.len(),
        start = %config.period.start,
        end = %config.period.end,
        cache = config.cache.enabled,
        "Starting run"
    );

    let mut summary = RunSummary::default();
    for outcome in orchestrator.scrape_all().await {
        summary.record(&outcome);
        let name = tribunals::lookup(&outcome.tribunal).map_or("", |t| t.name);

        if let Some(e) = &outcome.error {
            error!(tribunal = %outcome.tribunal, "{} failed: {}", name, e);
            continue;
        }
        if outcome.cancelled && outcome.records.is_empty() {
            warn!(tribunal = %outcome.tribunal, "Cancelled before any records were collected");
            continue;
        }

        let written =
            output::write_records(&config.output.dir, outcome.tribunal.as_str(), &outcome.records);
        match written {
            Ok(path) => {
                summary.files_written += 1;
                info!(
                    tribunal = %outcome.tribunal,
                    records = outcome.records.len(),
                    page_errors = outcome.page_errors,
                    partial = outcome.cancelled,
                    elapsed_ms = outcome.elapsed.as_millis(),
                    "{} saved to {}",
                    name,
                    path.display()
                );
            }
            Err(e) => error!(tribunal = %outcome.tribunal, "Failed to write output: {:#}", e),
        }
    }
    summary.elapsed = started.elapsed();

    info!(
        tribunals = summary.tribunals,
        completed = summary.completed,
        failed = summary.failed,
        cancelled = summary.cancelled,
        records = summary.records,
        page_errors = summary.page_errors,
        elapsed_secs = summary.elapsed.as_secs(),
        "Run finished"
    );
    Ok(summary)
}

/// Print the cached runs, one per line.
pub async fn list_cached_runs(config: &RunConfig) -> Result<()> {
    let runs = list_runs(&config.cache.base_dir).await.with_context(|| {
        format!(
            "failed to list cache directory {}",
            config.cache.base_dir.display()
        )
    })?;

    if runs.is_empty() {
        info!(cache = %config.cache.base_dir.display(), "No cached runs");
    }
    for run in runs {
        let tribunal = run.tribunal.as_ref().map_or("?", |t| t.as_str());
        println!(
            "{}\t{}\t{}",
            tribunal,
            run.stamp.as_deref().unwrap_or("-"),
            run.dir.display()
        );
    }
    Ok(())
}

/// What to re-derive and where to put it.
#[derive(Debug, Clone)]
pub struct ReprocessRequest {
    pub run: String,
    pub communication_type: String,
    pub class_code: String,
    pub output_dir: PathBuf,
}

/// Re-derive records from a cached run and write them to
/// `<output_dir>/<TRIBUNAL>_<stamp>.json`.
pub async fn reprocess(config: &RunConfig, request: ReprocessRequest) -> Result<()> {
    let given = PathBuf::from(&request.run);
    let dir = if given.is_dir() {
        given
    } else {
        config.cache.base_dir.join(&request.run)
    };

    let filter = RecordFilter::new(Some(request.communication_type), Some(request.class_code));
    let summary = reprocess_run(&dir, &filter)
        .await
        .with_context(|| format!("failed to read cached run {}", dir.display()))?;

    let run = CacheRun::from_dir(dir);
    let stem = match (&run.tribunal, &run.stamp) {
        (Some(tribunal), Some(stamp)) => format!("{tribunal}_{stamp}"),
        _ => run
            .dir
            .file_name()
            .map_or_else(|| "reprocessed".to_string(), |n| n.to_string_lossy().into_owned()),
    };

    std::fs::create_dir_all(&request.output_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            request.output_dir.display()
        )
    })?;
    let path = output::write_records(&request.output_dir, &stem, &summary.records)?;

    info!(
        files = summary.files,
        items = summary.items,
        unreadable = summary.unreadable,
        records = summary.records.len(),
        "Reprocessed {} into {}",
        run.dir.display(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use comunica_core::TribunalCode;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_cancelled_run_writes_nothing() {
        let tmp = TempDir::new().expect("create temp dir");
        let mut config = RunConfig::default();
        config.tribunals = TribunalCode::parse_list("TJAM,TJSP").expect("valid list");
        config.cache.base_dir = tmp.path().join("cache");
        config.output.dir = tmp.path().join("resultados");

        let cancel = CancellationToken::new();
        cancel.cancel();
        let summary = run(config, cancel).await.expect("run completes");

        assert_eq!(summary.tribunals, 2);
        assert_eq!(summary.cancelled, 2);
        assert_eq!(summary.files_written, 0);
        assert!(tmp.path().join("resultados").is_dir());
    }

    #[tokio::test]
    async fn test_reprocess_writes_stamped_file() {
        let tmp = TempDir::new().expect("create temp dir");
        let mut config = RunConfig::default();
        config.cache.base_dir = tmp.path().join("cache");
        let run_dir = config.cache.base_dir.join("TJSP_2025-11-12_14-44-35");
        std::fs::create_dir_all(&run_dir).expect("mkdir");
        std::fs::write(
            run_dir.join("page.json"),
            r#"{"status":"success","count":2,"items":[
                {"id":1,"tipoComunicacao":"Intimação","codigoClasse":"1"},
                {"id":2,"tipoComunicacao":"Edital","codigoClasse":"1"}]}"#,
        )
        .expect("write page");

        let request = ReprocessRequest {
            run: "TJSP_2025-11-12_14-44-35".to_string(),
            communication_type: "Intimação".to_string(),
            class_code: String::new(),
            output_dir: tmp.path().join("out"),
        };
        reprocess(&config, request).await.expect("reprocess");

        let written = tmp.path().join("out").join("TJSP_2025-11-12_14-44-35.json");
        let records: Vec<serde_json::Value> =
            serde_json::from_slice(&std::fs::read(written).expect("read output"))
                .expect("valid json");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["id"], "1");
    }
}
