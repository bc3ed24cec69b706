//! Content-addressed response cache.
//!
//! One directory per tribunal and run; one `<key>.json` file per page holding
//! the exact bytes the upstream returned. Entries are written once and never
//! rewritten in place.

use crate::error::Result;
use comunica_core::TribunalCode;
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extension of cached payload files.
pub const CACHE_FILE_EXTENSION: &str = "json";

/// Hex SHA-256 digest of the parameters identifying a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Digest of `"{tribunal}_{page}_{items}_{start}_{end}"`.
    #[must_use]
    pub fn derive(
        tribunal: &TribunalCode,
        page: u32,
        items_per_page: u32,
        start: &str,
        end: &str,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(format!("{tribunal}_{page}_{items_per_page}_{start}_{end}").as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// File-backed cache for one tribunal run, or a no-op when disabled.
#[derive(Debug, Clone, Default)]
pub struct ResponseCache {
    dir: Option<PathBuf>,
}

impl ResponseCache {
    /// A cache that never hits and discards writes.
    #[must_use]
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// Enabled when `dir` is present.
    #[must_use]
    pub fn open(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    #[must_use]
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Path of the payload file for `key`, when enabled.
    #[must_use]
    pub fn path_for(&self, key: &CacheKey) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("{key}.{CACHE_FILE_EXTENSION}")))
    }

    /// Create the run directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> Result<()> {
        if let Some(dir) = &self.dir {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }

    /// Cached payload for `key`, if any.
    ///
    /// Unreadable entries are reported and treated as misses.
    pub async fn read(&self, key: &CacheKey) -> Option<Vec<u8>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!(key = %key, "Cache hit");
                Some(bytes)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %path.display(), "Failed to read cache entry: {}", e);
                None
            }
        }
    }

    /// Store `bytes` under `key`.
    ///
    /// The payload goes to a temporary sibling first and is renamed into
    /// place, so readers never observe a partial file.
    pub async fn write(&self, key: &CacheKey, bytes: &[u8]) -> Result<()> {
        let Some(path) = self.path_for(key) else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let partial = path.with_extension(format!("{CACHE_FILE_EXTENSION}.part"));
        tokio::fs::write(&partial, bytes).await?;
        if let Err(e) = tokio::fs::rename(&partial, &path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(page: u32) -> CacheKey {
        let tribunal = TribunalCode::new("TJAM").expect("valid code");
        CacheKey::derive(&tribunal, page, 100, "2025-11-06", "2025-11-10")
    }

    #[test]
    fn test_key_is_deterministic_hex() {
        let a = key(1);
        assert_eq!(a, key(1));
        assert_ne!(a, key(2));
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_key_covers_every_parameter() {
        let tjam = TribunalCode::new("TJAM").expect("valid code");
        let tjsp = TribunalCode::new("TJSP").expect("valid code");
        let base = CacheKey::derive(&tjam, 1, 100, "2025-11-06", "2025-11-10");

        assert_ne!(base, CacheKey::derive(&tjsp, 1, 100, "2025-11-06", "2025-11-10"));
        assert_ne!(base, CacheKey::derive(&tjam, 1, 50, "2025-11-06", "2025-11-10"));
        assert_ne!(base, CacheKey::derive(&tjam, 1, 100, "2025-11-07", "2025-11-10"));
        assert_ne!(base, CacheKey::derive(&tjam, 1, 100, "2025-11-06", "2025-11-11"));
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let tmp = TempDir::new().expect("create temp dir");
        let cache = ResponseCache::new(tmp.path().join("TJAM_2025-11-11_17-45-30"));
        cache.ensure_dir().await.expect("ensure dir");

        let payload = br#"{"status":"success","count":0,"items":[]}"#;
        cache.write(&key(1), payload).await.expect("write entry");

        assert_eq!(cache.read(&key(1)).await.as_deref(), Some(&payload[..]));
        assert!(cache.read(&key(2)).await.is_none());

        let path = cache.path_for(&key(1)).expect("enabled cache has paths");
        assert!(path.exists());
        assert!(!path.with_extension("json.part").exists());
    }

    #[tokio::test]
    async fn test_disabled_cache_is_noop() {
        let cache = ResponseCache::disabled();
        assert!(!cache.is_enabled());
        cache.ensure_dir().await.expect("noop ensure dir");
        cache.write(&key(1), b"{}").await.expect("noop write");
        assert!(cache.read(&key(1)).await.is_none());
        assert!(cache.path_for(&key(1)).is_none());
    }

    #[tokio::test]
    async fn test_write_creates_missing_dir() {
        let tmp = TempDir::new().expect("create temp dir");
        let cache = ResponseCache::open(Some(tmp.path().join("nested").join("run")));
        cache.write(&key(3), b"{}").await.expect("write entry");
        assert_eq!(cache.read(&key(3)).await.as_deref(), Some(&b"{}"[..]));
    }
}
