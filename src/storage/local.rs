//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── config.toml
//! ├── cache/{domain}.json    # Change cache
//! ├── pages/{domain}.jsonl   # Page records
//! └── runs/{domain}.json     # Last run summary
//! ```
//!
//! Every file is written to a `.tmp` sibling first and renamed into place,
//! so a crash mid-write leaves the previous version intact.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::error::{AppError, Result};
use crate::models::{CacheEntries, CacheFile, CrawlSummary, PageRecord};
use crate::storage::{CacheRepository, PageSink};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Default location of the config file.
    pub fn config_path(&self) -> PathBuf {
        self.path("config.toml")
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    fn cache_key(domain: &str) -> String {
        format!("cache/{}.json", file_stem(domain))
    }

    fn pages_key(domain: &str) -> String {
        format!("pages/{}.jsonl", file_stem(domain))
    }

    fn summary_key(domain: &str) -> String {
        format!("runs/{}.json", file_stem(domain))
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    pub async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = tmp_path(&path);
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    pub async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    pub async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    pub async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Read the cache file with its header, if one exists.
    pub async fn load_cache_file(&self, domain: &str) -> Result<Option<CacheFile>> {
        let key = Self::cache_key(domain);
        let Some(bytes) = self.read_bytes(&key).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| AppError::cache(format!("{key}: {e}")))
    }

    /// Persist the summary of a finished run.
    pub async fn write_summary(&self, summary: &CrawlSummary) -> Result<()> {
        self.write_json(&Self::summary_key(&summary.domain), summary)
            .await
    }

    pub async fn load_summary(&self, domain: &str) -> Result<Option<CrawlSummary>> {
        self.read_json(&Self::summary_key(domain)).await
    }

    /// Open the JSON Lines sink for a domain's page records.
    pub async fn page_sink(&self, domain: &str) -> Result<JsonLinesSink> {
        JsonLinesSink::create(self.path(&Self::pages_key(domain))).await
    }
}

#[async_trait]
impl CacheRepository for LocalStorage {
    async fn prepare(&self, domain: &str) -> Result<()> {
        let path = self.path(&Self::cache_key(domain));
        self.ensure_dir(&path).await?;

        // Probe that the directory accepts writes
        let probe = tmp_path(&path).with_extension("probe");
        tokio::fs::write(&probe, b"").await.map_err(|e| {
            AppError::config(format!("cache location {} is not writable: {e}", path.display()))
        })?;
        tokio::fs::remove_file(&probe).await?;
        Ok(())
    }

    async fn load(&self, domain: &str) -> Result<CacheEntries> {
        Ok(self
            .load_cache_file(domain)
            .await?
            .map(|file| file.entries)
            .unwrap_or_default())
    }

    async fn save(&self, domain: &str, entries: &CacheEntries) -> Result<()> {
        let file = CacheFile::new(domain, entries.clone());
        self.write_json(&Self::cache_key(domain), &file).await?;
        log::debug!("Cache for {} written ({} entries)", domain, file.count);
        Ok(())
    }
}

/// Page records as JSON Lines, renamed into place at `finish`.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    tmp: PathBuf,
    writer: BufWriter<tokio::fs::File>,
    written: usize,
}

impl JsonLinesSink {
    pub async fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = tmp_path(&path);
        let file = tokio::fs::File::create(&tmp).await?;
        Ok(Self {
            path,
            tmp,
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

#[async_trait]
impl PageSink for JsonLinesSink {
    async fn emit(&mut self, record: &PageRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        self.written += 1;
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        self.writer.flush().await?;
        self.writer.get_ref().sync_all().await?;
        tokio::fs::rename(&self.tmp, &self.path).await?;
        log::info!("{} page records written to {}", self.written, self.path.display());
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// File-name-safe form of a domain.
fn file_stem(domain: &str) -> String {
    domain
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}
