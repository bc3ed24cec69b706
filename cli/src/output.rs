//! Output files.

use anyhow::{Context, Result};
use comunica_scraper::Record;
use std::path::{Path, PathBuf};

/// `<dir>/<stem>.json`
pub fn output_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{stem}.json"))
}

/// Write `records` as a pretty-printed JSON array, replacing any previous
/// file of the same name.
pub fn write_records(dir: &Path, stem: &str, records: &[Record]) -> Result<PathBuf> {
    let path = output_path(dir, stem);
    let json = serde_json::to_string_pretty(records).context("failed to serialize records")?;
    std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use comunica_scraper::ApiItem;
    use tempfile::TempDir;

    #[test]
    fn test_write_records() {
        let tmp = TempDir::new().expect("create temp dir");
        let record = Record::from_item(&ApiItem {
            id: Some("42".to_string()),
            numeroprocessocommascara: Some("0001234-56.2025.8.04.0001".to_string()),
            texto: Some("DATA DE EXPEDIENTE: 05/11/2025".to_string()),
            ..ApiItem::default()
        });

        let path = write_records(tmp.path(), "TJAM", &[record.clone()]).expect("write records");
        assert_eq!(path, tmp.path().join("TJAM.json"));

        let contents = std::fs::read_to_string(&path).expect("read output");
        assert!(contents.starts_with("[\n"));
        let parsed: Vec<Record> = serde_json::from_str(&contents).expect("valid json");
        assert_eq!(parsed, vec![record]);
    }

    #[test]
    fn test_empty_result_is_empty_array() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = write_records(tmp.path(), "TJSP", &[]).expect("write records");
        assert_eq!(std::fs::read_to_string(path).expect("read output"), "[]");
    }

    #[test]
    fn test_missing_dir_is_an_error() {
        let tmp = TempDir::new().expect("create temp dir");
        assert!(write_records(&tmp.path().join("missing"), "TJSP", &[]).is_err());
    }
}
