//! Application configuration structures.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::QuotaTable;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and worker pool settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Budget, depth and quota settings
    #[serde(default)]
    pub frontier: FrontierConfig,

    /// Retry/backoff policy for transient failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Renderer pool for JavaScript-dependent pages
    #[serde(default)]
    pub renderer: RendererConfig,

    /// Change-cache freshness windows
    #[serde(default)]
    pub cache: CacheConfig,

    /// Console output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        if self.renderer.workers == 0 {
            return Err(AppError::validation("renderer.workers must be > 0"));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(AppError::validation(
                "retry.base_delay_ms must not exceed retry.max_delay_ms",
            ));
        }
        if self.cache.default_ttl_days == 0 || self.cache.volatile_ttl_days == 0 {
            return Err(AppError::validation("cache TTLs must be > 0 days"));
        }
        self.frontier.quota_table()?;
        for pattern in self
            .cache
            .volatile_patterns
            .iter()
            .chain(&self.renderer.url_patterns)
        {
            regex::Regex::new(pattern).map_err(|e| AppError::pattern(pattern, e))?;
        }
        Ok(())
    }
}

/// HTTP client and worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Connect/read timeout per attempt, in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Worker pool size, also the maximum wave size
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Treat non-HTML responses as permanent failures
    #[serde(default = "defaults::expect_html")]
    pub expect_html: bool,

    /// Pause between waves in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,
}

impl CrawlerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_concurrent: defaults::max_concurrent(),
            expect_html: defaults::expect_html(),
            request_delay_ms: defaults::request_delay(),
        }
    }
}

/// Frontier admission settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierConfig {
    /// Hard cap on visited + pending URLs
    #[serde(default = "defaults::max_urls")]
    pub max_urls: usize,

    /// Deepest discovery level admitted (seed is level 0)
    #[serde(default = "defaults::max_depth")]
    pub max_depth: usize,

    /// Named quota profile
    #[serde(default = "defaults::quota_profile")]
    pub quota_profile: String,

    /// Per-type caps replacing the profile's values
    #[serde(default)]
    pub quota_overrides: HashMap<String, usize>,
}

impl FrontierConfig {
    /// Resolve the profile and overrides into a quota table.
    pub fn quota_table(&self) -> Result<QuotaTable> {
        QuotaTable::for_profile(&self.quota_profile)?.with_overrides(&self.quota_overrides)
    }
}

impl Default for FrontierConfig {
    fn default() -> Self {
        Self {
            max_urls: defaults::max_urls(),
            max_depth: defaults::max_depth(),
            quota_profile: defaults::quota_profile(),
            quota_overrides: HashMap::new(),
        }
    }
}

/// Retry policy for transient fetch failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the initial attempt
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    #[serde(default = "defaults::base_delay")]
    pub base_delay_ms: u64,

    #[serde(default = "defaults::max_delay")]
    pub max_delay_ms: u64,

    /// Upper bound of the random delay added to every backoff
    #[serde(default = "defaults::jitter")]
    pub jitter_ms: u64,

    /// Latency budget for the initial attempt plus all retries
    #[serde(default = "defaults::max_total")]
    pub max_total_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: defaults::max_retries(),
            base_delay_ms: defaults::base_delay(),
            max_delay_ms: defaults::max_delay(),
            jitter_ms: defaults::jitter(),
            max_total_ms: defaults::max_total(),
        }
    }
}

/// Renderer pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Renderer instances allowed at once
    #[serde(default = "defaults::renderer_workers")]
    pub workers: usize,

    /// URL regexes routed to the renderer when one is installed
    #[serde(default)]
    pub url_patterns: Vec<String>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            workers: defaults::renderer_workers(),
            url_patterns: Vec::new(),
        }
    }
}

/// Change-cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "defaults::default_ttl_days")]
    pub default_ttl_days: u32,

    #[serde(default = "defaults::volatile_ttl_days")]
    pub volatile_ttl_days: u32,

    /// Path regexes that use the volatile TTL
    #[serde(default = "defaults::volatile_patterns")]
    pub volatile_patterns: Vec<String>,

    /// Save the cache every N waves (0 = only at the end of the run)
    #[serde(default = "defaults::checkpoint_waves")]
    pub checkpoint_waves: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_days: defaults::default_ttl_days(),
            volatile_ttl_days: defaults::volatile_ttl_days(),
            volatile_patterns: defaults::volatile_patterns(),
            checkpoint_waves: defaults::checkpoint_waves(),
        }
    }
}

/// Console output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,

    #[serde(default = "defaults::show_progress")]
    pub show_progress: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
            show_progress: defaults::show_progress(),
        }
    }
}

mod defaults {
    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; sitecrawler/0.1)".into()
    }
    pub fn timeout() -> u64 {
        15
    }
    pub fn max_concurrent() -> usize {
        8
    }
    pub fn expect_html() -> bool {
        true
    }
    pub fn request_delay() -> u64 {
        0
    }

    // Frontier defaults
    pub fn max_urls() -> usize {
        500
    }
    pub fn max_depth() -> usize {
        5
    }
    pub fn quota_profile() -> String {
        "balanced".into()
    }

    // Retry defaults
    pub fn max_retries() -> u32 {
        3
    }
    pub fn base_delay() -> u64 {
        500
    }
    pub fn max_delay() -> u64 {
        8_000
    }
    pub fn jitter() -> u64 {
        250
    }
    pub fn max_total() -> u64 {
        60_000
    }

    // Renderer defaults
    pub fn renderer_workers() -> usize {
        2
    }

    // Cache defaults
    pub fn default_ttl_days() -> u32 {
        7
    }
    pub fn volatile_ttl_days() -> u32 {
        2
    }
    pub fn volatile_patterns() -> Vec<String> {
        vec![
            r"^/(blog|news|press|updates?)(/|$)".into(),
            r"/(feed|latest)(/|$)".into(),
        ]
    }
    pub fn checkpoint_waves() -> usize {
        10
    }

    // Logging defaults
    pub fn log_level() -> String {
        "info".into()
    }
    pub fn show_progress() -> bool {
        true
    }
}
