// src/services/fetcher.rs

//! Page fetching backends and the fetch executor.
//!
//! A [`PageFetcher`] performs one attempt. The [`FetchExecutor`] wraps
//! attempts in timeouts and the retry policy, routes URLs to the HTTP pool
//! or the renderer pool, and dispatches whole waves as spawned tasks with
//! unordered completion.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use futures::stream::{self, Stream, StreamExt};
use regex::Regex;
use reqwest::Client;
use tokio::task::JoinSet;

use crate::error::{AppError, FetchError, FetchErrorKind, Result};
use crate::models::{
    Config, CrawlerConfig, FetchResult, FetchedPage, RendererConfig, UrlRecord,
    is_html_content_type,
};
use crate::services::{BoundedExecutor, RetryPolicy};
use crate::utils::http::create_async_client;

/// One attempt at retrieving a page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> std::result::Result<FetchedPage, FetchError>;
}

/// Map a non-success HTTP status to a fetch error.
///
/// 429 and 5xx are transient, every other non-2xx status is permanent.
pub fn classify_status(status: u16) -> Option<FetchError> {
    match status {
        200..=299 => None,
        429 => Some(
            FetchError::transient(FetchErrorKind::RateLimited, "HTTP 429 Too Many Requests")
                .with_status(status),
        ),
        500..=599 => Some(
            FetchError::transient(FetchErrorKind::ServerError, format!("HTTP {status}"))
                .with_status(status),
        ),
        _ => Some(
            FetchError::permanent(FetchErrorKind::ClientError, format!("HTTP {status}"))
                .with_status(status),
        ),
    }
}

fn classify_reqwest_error(e: &reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::transient(FetchErrorKind::Timeout, e)
    } else if e.is_builder() {
        FetchError::permanent(FetchErrorKind::MalformedUrl, e)
    } else if e.is_redirect() {
        FetchError::permanent(FetchErrorKind::ClientError, e)
    } else if e.is_body() || e.is_decode() {
        FetchError::transient(FetchErrorKind::Body, e)
    } else {
        FetchError::transient(FetchErrorKind::Connect, e)
    }
}

/// Default backend: plain HTTP GET through reqwest.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    expect_html: bool,
}

impl HttpFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self::from_client(
            create_async_client(config)?,
            config.expect_html,
        ))
    }

    pub fn from_client(client: Client, expect_html: bool) -> Self {
        Self {
            client,
            expect_html,
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<FetchedPage, FetchError> {
        let parsed = url::Url::parse(url)
            .map_err(|e| FetchError::permanent(FetchErrorKind::MalformedUrl, e))?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status().as_u16();
        if let Some(error) = classify_status(status) {
            return Err(error);
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if self.expect_html && !is_html_content_type(content_type.as_deref()) {
            return Err(FetchError::permanent(
                FetchErrorKind::ContentType,
                format!(
                    "expected HTML, got {}",
                    content_type.as_deref().unwrap_or("no content type")
                ),
            )
            .with_status(status));
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(&e).with_status(status))?;

        Ok(FetchedPage {
            final_url,
            status_code: status,
            content_type,
            body,
        })
    }
}

/// Backend plus the pool it runs in.
#[derive(Clone)]
struct Route {
    fetcher: Arc<dyn PageFetcher>,
    pool: BoundedExecutor,
}

/// Renderer backend for URLs matching any pattern.
#[derive(Clone)]
struct RendererRoute {
    route: Route,
    patterns: Vec<Regex>,
}

/// Retrying, pool-bounded fetcher used by the orchestrator.
#[derive(Clone)]
pub struct FetchExecutor {
    default: Route,
    renderer: Option<RendererRoute>,
    retry: RetryPolicy,
    attempt_timeout: Duration,
}

impl FetchExecutor {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        pool: BoundedExecutor,
        retry: RetryPolicy,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            default: Route { fetcher, pool },
            renderer: None,
            retry,
            attempt_timeout,
        }
    }

    /// HTTP backend sized by `crawler.max_concurrent`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.crawler)?;
        Ok(Self::new(
            Arc::new(fetcher),
            BoundedExecutor::new(config.crawler.max_concurrent),
            RetryPolicy::from_config(&config.retry),
            config.crawler.timeout(),
        ))
    }

    /// Route URLs matching `config.url_patterns` to `renderer`, in a pool of
    /// `config.workers`.
    pub fn with_renderer(
        mut self,
        renderer: Arc<dyn PageFetcher>,
        config: &RendererConfig,
    ) -> Result<Self> {
        let patterns = config
            .url_patterns
            .iter()
            .map(|p| Regex::new(p).map_err(|e| AppError::pattern(p, e)))
            .collect::<Result<Vec<_>>>()?;

        self.renderer = Some(RendererRoute {
            route: Route {
                fetcher: renderer,
                pool: BoundedExecutor::new(config.workers),
            },
            patterns,
        });
        Ok(self)
    }

    /// The shared default pool, for collaborators making their own calls.
    pub fn pool(&self) -> &BoundedExecutor {
        &self.default.pool
    }

    /// Largest useful wave: one URL per default worker.
    pub fn wave_size(&self) -> usize {
        self.default.pool.capacity()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn route_for(&self, url: &str) -> &Route {
        match &self.renderer {
            Some(r) if r.patterns.iter().any(|re| re.is_match(url)) => &r.route,
            _ => &self.default,
        }
    }

    /// Fetch one URL with timeouts and retries. Never returns an error;
    /// failures are carried in the result.
    pub async fn fetch(&self, url: &str) -> FetchResult {
        let route = self.route_for(url);

        let retried = route
            .pool
            .run(self.retry.retry(
                |remaining| {
                    let fetcher = route.fetcher.clone();
                    let budget = self.attempt_timeout.min(remaining);
                    async move {
                        match tokio::time::timeout(budget, fetcher.fetch(url)).await {
                            Ok(outcome) => outcome,
                            Err(_) => Err(FetchError::transient(
                                FetchErrorKind::Timeout,
                                format!("no response within {}ms", budget.as_millis()),
                            )),
                        }
                    }
                },
                FetchError::is_transient,
            ))
            .await;

        if let Err(e) = &retried.outcome {
            log::debug!("Fetch failed for {} after {} attempts: {}", url, retried.attempts, e);
        }

        FetchResult {
            url: url.to_string(),
            attempts: retried.attempts,
            outcome: retried.outcome,
        }
    }

    /// Dispatch one wave. Each URL runs in its own task, so fetches keep
    /// progressing while the caller handles earlier results. Results are
    /// yielded as each fetch completes, not in submission order. Dropping
    /// the stream aborts whatever is still in flight.
    pub fn dispatch(
        &self,
        wave: Vec<UrlRecord>,
    ) -> impl Stream<Item = (UrlRecord, FetchResult)> + Send + 'static {
        let mut tasks = JoinSet::new();
        for record in wave {
            let executor = self.clone();
            tasks.spawn(async move {
                let result = match AssertUnwindSafe(executor.fetch(&record.url))
                    .catch_unwind()
                    .await
                {
                    Ok(result) => result,
                    Err(_) => {
                        log::error!("Fetch task for {} panicked", record.url);
                        FetchResult {
                            url: record.url.clone(),
                            attempts: 1,
                            outcome: Err(FetchError::permanent(
                                FetchErrorKind::Body,
                                "fetch task panicked",
                            )),
                        }
                    }
                };
                (record, result)
            });
        }

        stream::unfold(tasks, |mut tasks| async move {
            loop {
                match tasks.join_next().await? {
                    Ok(item) => return Some((item, tasks)),
                    Err(e) => log::error!("Fetch task did not complete: {e}"),
                }
            }
        })
    }

    /// Dispatch one wave and collect every result in completion order.
    pub async fn fetch_wave(&self, wave: Vec<UrlRecord>) -> Vec<(UrlRecord, FetchResult)> {
        self.dispatch(wave).collect().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UrlType;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn page(url: &str, body: &str) -> FetchedPage {
        FetchedPage {
            final_url: url.to_string(),
            status_code: 200,
            content_type: Some("text/html; charset=utf-8".to_string()),
            body: body.to_string(),
        }
    }

    fn record(url: &str) -> UrlRecord {
        UrlRecord {
            url: url.to_string(),
            level: 0,
            origin: None,
            url_type: UrlType::Content,
            priority: 0,
        }
    }

    fn fast_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            jitter: Duration::ZERO,
            max_elapsed: Duration::from_secs(10),
        }
    }

    fn executor(fetcher: Arc<dyn PageFetcher>, max_retries: u32) -> FetchExecutor {
        FetchExecutor::new(
            fetcher,
            BoundedExecutor::new(4),
            fast_retry(max_retries),
            Duration::from_millis(20),
        )
    }

    /// Never answers; every attempt hits the per-attempt timeout.
    #[derive(Default)]
    struct Hanging {
        calls: AtomicU32,
    }

    #[async_trait]
    impl PageFetcher for Hanging {
        async fn fetch(&self, _url: &str) -> std::result::Result<FetchedPage, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(FetchError::transient(FetchErrorKind::Timeout, "unreachable"))
        }
    }

    /// Always answers 404.
    #[derive(Default)]
    struct Missing {
        calls: AtomicU32,
    }

    #[async_trait]
    impl PageFetcher for Missing {
        async fn fetch(&self, _url: &str) -> std::result::Result<FetchedPage, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(classify_status(404).unwrap())
        }
    }

    /// Sleeps for the number of milliseconds in the last path segment.
    struct Delayed;

    #[async_trait]
    impl PageFetcher for Delayed {
        async fn fetch(&self, url: &str) -> std::result::Result<FetchedPage, FetchError> {
            let ms: u64 = url.rsplit('/').next().and_then(|s| s.parse().ok()).unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(page(url, "ok"))
        }
    }

    /// Burns the calling worker thread for a fixed time.
    struct Blocking(Duration);

    #[async_trait]
    impl PageFetcher for Blocking {
        async fn fetch(&self, url: &str) -> std::result::Result<FetchedPage, FetchError> {
            std::thread::sleep(self.0);
            Ok(page(url, "ok"))
        }
    }

    /// Panics on every call.
    struct Broken;

    #[async_trait]
    impl PageFetcher for Broken {
        async fn fetch(&self, _url: &str) -> std::result::Result<FetchedPage, FetchError> {
            panic!("backend bug");
        }
    }

    struct Fixed(&'static str);

    #[async_trait]
    impl PageFetcher for Fixed {
        async fn fetch(&self, url: &str) -> std::result::Result<FetchedPage, FetchError> {
            Ok(page(url, self.0))
        }
    }

    #[test]
    fn test_classify_status() {
        assert!(classify_status(200).is_none());
        assert!(classify_status(503).unwrap().is_transient());
        assert!(classify_status(429).unwrap().is_transient());
        let not_found = classify_status(404).unwrap();
        assert!(!not_found.is_transient());
        assert_eq!(not_found.status(), Some(404));
    }

    #[tokio::test]
    async fn test_timeout_attempted_max_retries_plus_one() {
        let fetcher = Arc::new(Hanging::default());
        let result = executor(fetcher.clone(), 3)
            .fetch("https://example.com/slow")
            .await;

        assert_eq!(result.attempts, 4);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 4);
        let error = result.error().unwrap();
        assert!(error.is_transient());
        assert_eq!(error.kind(), FetchErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_permanent_failure_attempted_once() {
        let fetcher = Arc::new(Missing::default());
        let result = executor(fetcher.clone(), 3)
            .fetch("https://example.com/gone")
            .await;

        assert_eq!(result.attempts, 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.error().unwrap().status(), Some(404));
    }

    #[tokio::test]
    async fn test_wave_completes_out_of_order() {
        let exec = FetchExecutor::new(
            Arc::new(Delayed),
            BoundedExecutor::new(4),
            fast_retry(0),
            Duration::from_secs(5),
        );
        let wave = vec![
            record("https://example.com/slow/300"),
            record("https://example.com/fast/1"),
        ];

        let results = exec.fetch_wave(wave).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.url, "https://example.com/fast/1");
        assert!(results.iter().all(|(_, r)| r.is_success()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_wave_fetches_run_in_parallel() {
        let exec = FetchExecutor::new(
            Arc::new(Blocking(Duration::from_millis(200))),
            BoundedExecutor::new(4),
            fast_retry(0),
            Duration::from_secs(5),
        );
        let wave = (0..4)
            .map(|i| record(&format!("https://example.com/p{i}")))
            .collect();

        let started = std::time::Instant::now();
        let results = exec.fetch_wave(wave).await;
        let elapsed = started.elapsed();

        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|(_, r)| r.is_success()));
        assert!(
            elapsed < Duration::from_millis(600),
            "wave of 4 took {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn test_panicking_backend_becomes_failed_result() {
        let exec = executor(Arc::new(Broken), 2);
        let results = exec
            .fetch_wave(vec![record("https://example.com/a")])
            .await;

        assert_eq!(results.len(), 1);
        let error = results[0].1.error().unwrap();
        assert!(!error.is_transient());
    }

    #[tokio::test]
    async fn test_renderer_routing() {
        let config = RendererConfig {
            workers: 1,
            url_patterns: vec![r"/app/".to_string()],
        };
        let exec = executor(Arc::new(Fixed("plain")), 0)
            .with_renderer(Arc::new(Fixed("rendered")), &config)
            .unwrap();

        let plain = exec.fetch("https://example.com/docs/a").await;
        let rendered = exec.fetch("https://example.com/app/dashboard").await;
        assert_eq!(plain.page().unwrap().body, "plain");
        assert_eq!(rendered.page().unwrap().body, "rendered");
    }

    #[test]
    fn test_invalid_renderer_pattern() {
        let config = RendererConfig {
            workers: 1,
            url_patterns: vec!["(".to_string()],
        };
        let result = executor(Arc::new(Fixed("x")), 0).with_renderer(Arc::new(Fixed("y")), &config);
        assert!(result.is_err());
    }
}
