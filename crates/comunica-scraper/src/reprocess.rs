//! Offline reprocessing of cached runs.
//!
//! A run directory holds the raw pages of one tribunal run, so its records
//! can be re-derived (possibly under a different filter) without touching
//! the network.

use crate::cache::CACHE_FILE_EXTENSION;
use crate::error::Result;
use crate::filter::RecordFilter;
use crate::model::{ApiPage, Record};
use comunica_core::TribunalCode;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One `<TRIBUNAL>_<run stamp>` directory under the cache root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CacheRun {
    pub dir: PathBuf,
    /// `None` when the directory name does not start with a tribunal code
    pub tribunal: Option<TribunalCode>,
    pub stamp: Option<String>,
}

impl CacheRun {
    #[must_use]
    pub fn from_dir(dir: PathBuf) -> Self {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stamp = name
            .split_once('_')
            .map(|(_, stamp)| stamp.to_string())
            .filter(|s| !s.is_empty());
        Self {
            tribunal: tribunal_from_dir_name(&name),
            stamp,
            dir,
        }
    }
}

/// Tribunal code at the front of a run directory name,
/// e.g. `TJSP_2025-11-12_14-44-35` gives `TJSP`.
#[must_use]
pub fn tribunal_from_dir_name(name: &str) -> Option<TribunalCode> {
    let prefix = name.split('_').next()?;
    TribunalCode::new(prefix).ok()
}

/// Every run directory under `base`, sorted by name. A missing root yields
/// an empty list.
///
/// # Errors
/// Returns error if `base` exists but cannot be listed.
pub async fn list_runs(base: &Path) -> Result<Vec<CacheRun>> {
    let mut entries = match tokio::fs::read_dir(base).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut runs = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            runs.push(CacheRun::from_dir(entry.path()));
        }
    }
    runs.sort();
    Ok(runs)
}

/// Records re-derived from one run directory.
#[derive(Debug, Default)]
pub struct ReprocessSummary {
    pub records: Vec<Record>,
    /// Cached pages read
    pub files: usize,
    /// Items seen across all pages, before filtering
    pub items: usize,
    /// Total size of the cached pages in bytes
    pub bytes: u64,
    /// Pages that could not be read or decoded
    pub unreadable: usize,
}

/// Re-derive the records of a cached run under `filter`.
///
/// Pages are visited in file-name order. Unreadable pages are counted and
/// skipped.
///
/// # Errors
/// Returns error if `dir` cannot be listed.
pub async fn reprocess_run(dir: &Path, filter: &RecordFilter) -> Result<ReprocessSummary> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == CACHE_FILE_EXTENSION) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut summary = ReprocessSummary::default();
    for path in paths {
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), "Failed to read cached page: {}", e);
                summary.unreadable += 1;
                continue;
            }
        };
        summary.files += 1;
        summary.bytes += bytes.len() as u64;

        match ApiPage::from_slice(&bytes) {
            Ok(page) => {
                summary.items += page.items.len();
                summary.records.extend(
                    page.items
                        .iter()
                        .filter(|item| filter.matches(item))
                        .map(Record::from_item),
                );
            }
            Err(e) => {
                warn!(path = %path.display(), "Skipping undecodable cached page: {}", e);
                summary.unreadable += 1;
            }
        }
    }

    debug!(
        dir = %dir.display(),
        files = summary.files,
        records = summary.records.len(),
        "Reprocessed cached run"
    );
    Ok(summary)
}
