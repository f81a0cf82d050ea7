// src/pipeline/cache.rs

//! Change-cache inspection.

use chrono::Utc;

use crate::error::Result;
use crate::models::Config;
use crate::services::{CachePolicy, ChangeCache};
use crate::storage::LocalStorage;
use crate::utils::log;

/// Freshness overview of a domain's persisted cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStatus {
    pub entries: usize,
    pub fresh: usize,
}

/// Print entry count, freshness and the last run of `domain`.
///
/// Returns `None` when the domain has never been crawled.
pub async fn run_cache_info(
    config: &Config,
    storage: &LocalStorage,
    domain: &str,
) -> Result<Option<CacheStatus>> {
    log::header(&format!("Change cache for {domain}"));

    let Some(file) = storage.load_cache_file(domain).await? else {
        log::info(&format!("No cache stored for {domain}"));
        return Ok(None);
    };

    let updated_at = file.updated_at;
    let cache = ChangeCache::with_entries(CachePolicy::from_config(&config.cache)?, file.entries);
    let status = CacheStatus {
        entries: cache.len(),
        fresh: cache.fresh_count(Utc::now()),
    };

    let mut rows = vec![
        ("Entries", status.entries.to_string()),
        ("Fresh", status.fresh.to_string()),
        ("Stale", (status.entries - status.fresh).to_string()),
        ("Updated", updated_at.to_rfc3339()),
    ];
    if let Some(last) = storage.load_summary(domain).await? {
        rows.push(("Last run", last.end_time.to_rfc3339()));
        rows.push(("Last run visited", last.visited.to_string()));
    }
    log::summary(domain, &rows);

    Ok(Some(status))
}
