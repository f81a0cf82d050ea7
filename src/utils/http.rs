// src/utils/http.rs

//! HTTP client utilities.

use reqwest::redirect::Policy;

use crate::error::Result;
use crate::models::CrawlerConfig;

/// Most redirects followed before a fetch is abandoned.
const MAX_REDIRECTS: usize = 10;

/// Create a configured asynchronous HTTP client.
///
/// The timeout applies per attempt, covering connect and body read.
pub fn create_async_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.timeout())
        .connect_timeout(config.timeout())
        .redirect(Policy::limited(MAX_REDIRECTS))
        .build()?;
    Ok(client)
}
