//! In-memory storage, for tests and embedders that keep results in process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{CacheEntries, PageRecord};
use crate::storage::{CacheRepository, PageSink};

/// Stored state of one domain; `None` simulates an unreadable cache.
type Slot = Option<CacheEntries>;

/// Change-cache repository backed by a map.
#[derive(Debug, Default)]
pub struct MemoryCacheRepository {
    domains: Mutex<HashMap<String, Slot>>,
    saves: Mutex<usize>,
    unwritable: AtomicBool,
}

impl MemoryCacheRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn domains(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.domains.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make the next loads of `domain` fail as if the file were corrupt.
    pub fn corrupt(&self, domain: &str) {
        self.domains().insert(domain.to_string(), None);
    }

    /// Make `prepare` fail as if the cache location were not writable.
    pub fn make_unwritable(&self) {
        self.unwritable.store(true, Ordering::SeqCst);
    }

    /// Entries last saved for `domain`.
    pub fn entries(&self, domain: &str) -> Option<CacheEntries> {
        self.domains().get(domain).cloned().flatten()
    }

    /// How many times `save` has been called.
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CacheRepository for MemoryCacheRepository {
    async fn prepare(&self, domain: &str) -> Result<()> {
        if self.unwritable.load(Ordering::SeqCst) {
            return Err(AppError::config(format!(
                "cache location for {domain} is not writable"
            )));
        }
        Ok(())
    }

    async fn load(&self, domain: &str) -> Result<CacheEntries> {
        match self.domains().get(domain) {
            Some(Some(entries)) => Ok(entries.clone()),
            Some(None) => Err(AppError::cache(format!("cache for {domain} is corrupt"))),
            None => Ok(CacheEntries::new()),
        }
    }

    async fn save(&self, domain: &str, entries: &CacheEntries) -> Result<()> {
        self.domains()
            .insert(domain.to_string(), Some(entries.clone()));
        *self.saves.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}

/// Sink that keeps every record in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Vec<PageRecord>,
    finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[PageRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<PageRecord> {
        self.records
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[async_trait]
impl PageSink for MemorySink {
    async fn emit(&mut self, record: &PageRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_repository() {
        let repo = MemoryCacheRepository::new();
        assert!(repo.load("example.com").await.unwrap().is_empty());

        repo.save("example.com", &CacheEntries::new()).await.unwrap();
        assert_eq!(repo.save_count(), 1);
        assert!(repo.entries("example.com").is_some());

        repo.corrupt("example.com");
        assert!(repo.load("example.com").await.is_err());
        assert!(repo.load("other.com").await.unwrap().is_empty());

        assert!(repo.prepare("example.com").await.is_ok());
        repo.make_unwritable();
        assert!(repo.prepare("example.com").await.is_err());
    }
}
