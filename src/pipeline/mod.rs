//! Pipeline entry points for crawler operations.
//!
//! - `run_crawler`: Crawl one site and persist records, cache and summary
//! - `run_validate`: Check the config file
//! - `run_cache_info`: Inspect a domain's change cache

pub mod cache;
pub mod crawl;
pub mod orchestrator;
pub mod validate;

pub use cache::{CacheStatus, run_cache_info};
pub use crawl::run_crawler;
pub use orchestrator::{Orchestrator, ProgressCallback};
pub use validate::run_validate;
