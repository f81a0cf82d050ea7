// src/models/mod.rs

//! Domain models for the crawler.
//!
//! This module contains all data structures used throughout the crate,
//! organized by their primary purpose.

mod cache;
mod config;
mod crawl;
mod page;
mod quota;
mod url_record;

// Re-export all public types
pub use cache::{CacheEntries, CacheFile, CacheRecord};
pub use config::{
    CacheConfig, Config, CrawlerConfig, FrontierConfig, LoggingConfig, RendererConfig,
    RetryConfig,
};
pub use crawl::{CrawlState, CrawlSummary, ProgressSnapshot};
pub use page::{FetchResult, FetchedPage, PageRecord, PageStatus, is_html_content_type};
pub use quota::{PROFILES, QuotaTable};
pub use url_record::{UrlRecord, UrlType};
