//! Service layer for the crawler.
//!
//! This module contains the crawl's decision and I/O components:
//! - URL classification (`UrlClassifier`)
//! - Admission and ordering (`Frontier`)
//! - Change detection (`ChangeCache`)
//! - Fetching with retries under a shared pool (`FetchExecutor`)
//! - Link extraction (`extract_links`)

mod change_cache;
mod classifier;
mod executor;
mod fetcher;
mod frontier;
mod links;
mod retry;

pub use change_cache::{CachePolicy, ChangeCache};
pub use classifier::{ClassificationRule, Matcher, UrlClassifier};
pub use executor::BoundedExecutor;
pub use fetcher::{FetchExecutor, HttpFetcher, PageFetcher, classify_status};
pub use frontier::{Admission, Frontier, FrontierReport, SkipCounters, TypeCoverage, score};
pub use links::extract_links;
pub use retry::{Retried, RetryPolicy};
