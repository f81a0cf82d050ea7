//! Storage abstractions for crawl state and output.
//!
//! Two seams are injected into the orchestrator:
//! - [`CacheRepository`]: per-domain change cache, loaded once and saved at
//!   checkpoints
//! - [`PageSink`]: receives every page record in completion order
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml            # Crawler configuration
//! ├── cache/
//! │   └── example.com.json   # Change cache (url -> hash, last_checked)
//! ├── pages/
//! │   └── example.com.jsonl  # Page records of the latest run
//! └── runs/
//!     └── example.com.json   # Summary of the latest run
//! ```

pub mod local;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CacheEntries, PageRecord};

// Re-export for convenience
pub use local::{JsonLinesSink, LocalStorage};
pub use memory::{MemoryCacheRepository, MemorySink};

/// Persistence for per-domain change caches.
#[async_trait]
pub trait CacheRepository: Send + Sync {
    /// Make sure the domain's cache can be written. Failing here halts the run.
    async fn prepare(&self, domain: &str) -> Result<()>;

    /// Load the domain's entries. A missing cache is an empty map; an
    /// unreadable one is an `AppError::Cache`.
    async fn load(&self, domain: &str) -> Result<CacheEntries>;

    /// Replace the domain's entries without ever leaving a partial file.
    async fn save(&self, domain: &str, entries: &CacheEntries) -> Result<()>;
}

/// Consumer of page records.
#[async_trait]
pub trait PageSink: Send {
    async fn emit(&mut self, record: &PageRecord) -> Result<()>;

    /// Called once after the last record.
    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}
