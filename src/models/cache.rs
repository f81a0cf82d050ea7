//! Persisted change-cache entries.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last known state of one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// SHA-256 of the page body, hex encoded
    pub content_hash: String,
    pub last_checked: DateTime<Utc>,
}

/// Canonical URL -> cache record.
pub type CacheEntries = HashMap<String, CacheRecord>;

/// On-disk layout of a domain's cache file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheFile {
    pub domain: String,
    pub updated_at: DateTime<Utc>,
    pub count: usize,
    pub entries: CacheEntries,
}

impl CacheFile {
    pub fn new(domain: impl Into<String>, entries: CacheEntries) -> Self {
        Self {
            domain: domain.into(),
            updated_at: Utc::now(),
            count: entries.len(),
            entries,
        }
    }
}
