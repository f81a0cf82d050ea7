//! Incremental change detection.
//!
//! Decides whether a fetched page has to be processed again, based on a
//! per-URL content hash and a freshness window. Volatile sections (blogs,
//! news) get a shorter window than the rest of the site.

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use crate::error::{AppError, Result};
use crate::models::{CacheConfig, CacheEntries, CacheRecord};
use crate::storage::CacheRepository;
use crate::utils::content_hash;

/// TTL selection rules.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    default_ttl: Duration,
    volatile_ttl: Duration,
    volatile_patterns: Vec<Regex>,
}

impl CachePolicy {
    pub fn new(default_ttl: Duration, volatile_ttl: Duration, volatile_patterns: Vec<Regex>) -> Self {
        Self {
            default_ttl,
            volatile_ttl,
            volatile_patterns,
        }
    }

    /// Build the policy from the `[cache]` config section (TTLs in days).
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let volatile_patterns = config
            .volatile_patterns
            .iter()
            .map(|p| Regex::new(p).map_err(|e| AppError::pattern(p, e)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(
            Duration::days(i64::from(config.default_ttl_days)),
            Duration::days(i64::from(config.volatile_ttl_days)),
            volatile_patterns,
        ))
    }

    /// Whether a URL falls under a volatile section.
    pub fn is_volatile(&self, url: &str) -> bool {
        let path = url::Url::parse(url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| url.to_string());
        self.volatile_patterns.iter().any(|re| re.is_match(&path))
    }

    /// Freshness window that applies to `url`.
    pub fn ttl_for(&self, url: &str) -> Duration {
        if self.is_volatile(url) {
            self.volatile_ttl
        } else {
            self.default_ttl
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
            .unwrap_or_else(|_| Self::new(Duration::days(7), Duration::days(2), Vec::new()))
    }
}

/// In-memory change cache for one domain.
#[derive(Debug, Clone, Default)]
pub struct ChangeCache {
    policy: CachePolicy,
    entries: CacheEntries,
    dirty: bool,
}

impl ChangeCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self::with_entries(policy, CacheEntries::new())
    }

    pub fn with_entries(policy: CachePolicy, entries: CacheEntries) -> Self {
        Self {
            policy,
            entries,
            dirty: false,
        }
    }

    /// Load the domain's cache, falling back to an empty one on any error.
    pub async fn load(repo: &dyn CacheRepository, domain: &str, policy: CachePolicy) -> Self {
        match repo.load(domain).await {
            Ok(entries) => {
                log::info!("Loaded {} cache entries for {}", entries.len(), domain);
                Self::with_entries(policy, entries)
            }
            Err(e) => {
                log::warn!("Change cache for {domain} unreadable, starting empty: {e}");
                Self::new(policy)
            }
        }
    }

    /// Write the cache back if anything changed since the last save.
    pub async fn save(&mut self, repo: &dyn CacheRepository, domain: &str) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        repo.save(domain, &self.entries).await?;
        self.dirty = false;
        log::debug!("Saved {} cache entries for {}", self.entries.len(), domain);
        Ok(())
    }

    /// Whether `content` fetched from `url` needs processing.
    pub fn needs_refetch(&self, url: &str, content: &str) -> bool {
        self.needs_refetch_at(url, content, Utc::now())
    }

    /// [`needs_refetch`](Self::needs_refetch) evaluated at a fixed instant.
    pub fn needs_refetch_at(&self, url: &str, content: &str, now: DateTime<Utc>) -> bool {
        let Some(record) = self.entries.get(url) else {
            return true;
        };
        if now - record.last_checked > self.policy.ttl_for(url) {
            return true;
        }
        content_hash(content) != record.content_hash
    }

    /// Record a successful fetch. Always refreshes hash and timestamp.
    pub fn update(&mut self, url: &str, content: &str) {
        self.update_at(url, content, Utc::now());
    }

    pub fn update_at(&mut self, url: &str, content: &str, now: DateTime<Utc>) {
        self.entries.insert(
            url.to_string(),
            CacheRecord {
                content_hash: content_hash(content),
                last_checked: now,
            },
        );
        self.dirty = true;
    }

    pub fn get(&self, url: &str) -> Option<&CacheRecord> {
        self.entries.get(url)
    }

    pub fn entries(&self) -> &CacheEntries {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of entries still inside their freshness window at `now`.
    pub fn fresh_count(&self, now: DateTime<Utc>) -> usize {
        self.entries
            .iter()
            .filter(|(url, record)| now - record.last_checked <= self.policy.ttl_for(url))
            .count()
    }
}
