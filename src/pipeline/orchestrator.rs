// src/pipeline/orchestrator.rs

//! Crawl orchestration.
//!
//! A single task drives the run through `INIT -> RUNNING -> DRAINING -> DONE`.
//! Each iteration pops one wave from the frontier, hands it to the fetch
//! executor and folds results back in as they complete: change detection,
//! link discovery and record emission. Only this task touches the frontier
//! and the change cache.

use std::pin::pin;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;

use crate::error::{AppError, Result};
use crate::models::{
    Config, CrawlState, CrawlSummary, FetchResult, PageRecord, ProgressSnapshot, UrlRecord,
};
use crate::services::{
    CachePolicy, ChangeCache, FetchExecutor, Frontier, UrlClassifier, extract_links,
};
use crate::storage::{CacheRepository, PageSink};
use crate::utils::url::get_domain;

/// Receives a snapshot after every wave.
pub type ProgressCallback = Box<dyn FnMut(&ProgressSnapshot) + Send>;

/// Drives one crawl of one domain.
pub struct Orchestrator {
    state: CrawlState,
    domain: String,
    seed: String,
    frontier: Frontier,
    executor: FetchExecutor,
    cache_policy: CachePolicy,
    checkpoint_waves: usize,
    request_delay: Duration,
    progress: Option<ProgressCallback>,
}

impl Orchestrator {
    /// Prepare a crawl of `seed`'s host with the standard classifier.
    pub fn new(seed: &str, config: &Config, executor: FetchExecutor) -> Result<Self> {
        Self::with_classifier(seed, config, executor, UrlClassifier::standard()?)
    }

    pub fn with_classifier(
        seed: &str,
        config: &Config,
        executor: FetchExecutor,
        classifier: UrlClassifier,
    ) -> Result<Self> {
        let domain = get_domain(seed)
            .ok_or_else(|| AppError::validation(format!("seed URL has no host: {seed}")))?;

        Ok(Self {
            state: CrawlState::Init,
            frontier: Frontier::from_config(&domain, &config.frontier, classifier)?,
            domain,
            seed: seed.to_string(),
            executor,
            cache_policy: CachePolicy::from_config(&config.cache)?,
            checkpoint_waves: config.cache.checkpoint_waves,
            request_delay: Duration::from_millis(config.crawler.request_delay_ms),
            progress: None,
        })
    }

    /// Install a progress callback.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn state(&self) -> CrawlState {
        self.state
    }

    fn transition(&mut self, next: CrawlState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(AppError::crawl(
                &self.domain,
                format!("illegal state transition {} -> {}", self.state, next),
            ));
        }
        log::debug!("{}: {} -> {}", self.domain, self.state, next);
        self.state = next;
        Ok(())
    }

    /// Run the crawl to completion.
    ///
    /// Per-URL failures end up in the emitted records. Only an unusable
    /// cache location or a failing sink aborts the run; on a sink failure the
    /// change cache is still saved before the error is returned.
    pub async fn run(
        mut self,
        repo: &dyn CacheRepository,
        sink: &mut dyn PageSink,
    ) -> Result<CrawlSummary> {
        let mut summary = CrawlSummary::new(&self.domain, &self.seed);

        // INIT
        repo.prepare(&self.domain).await?;
        let mut cache = ChangeCache::load(repo, &self.domain, self.cache_policy.clone()).await;

        if self.frontier.add(&self.seed, 0, None) {
            self.transition(CrawlState::Running)?;
        } else {
            log::warn!("Seed {} was not admitted, nothing to crawl", self.seed);
            self.transition(CrawlState::Draining)?;
        }

        // RUNNING
        let waves = match self.crawl_waves(repo, sink, &mut cache, &mut summary).await {
            Ok(waves) => waves,
            Err(e) => {
                if let Err(save_err) = cache.save(repo, &self.domain).await {
                    log::warn!("Could not save change cache for {}: {}", self.domain, save_err);
                }
                return Err(e);
            }
        };

        // DRAINING
        cache.save(repo, &self.domain).await?;
        sink.finish().await?;
        self.transition(CrawlState::Done)?;

        let skipped = self.frontier.skipped();
        summary.end_time = Utc::now();
        summary.final_state = self.state;
        summary.visited = self.frontier.visited_count();
        summary.pending_at_end = self.frontier.pending_count();
        summary.skipped_invalid = skipped.invalid;
        summary.skipped_quota = skipped.quota;
        summary.skipped_budget = skipped.budget;
        summary.skipped_depth = skipped.depth;
        summary.duplicates = skipped.duplicate;
        summary.per_type_counts = self.frontier.per_type_counts().clone();

        log::info!(
            "Crawl of {} done after {} waves: {} visited, {} failed",
            self.domain,
            waves,
            summary.visited,
            summary.failed()
        );
        Ok(summary)
    }

    /// Run waves until the frontier is drained or the budget is spent.
    /// Returns the number of waves dispatched.
    async fn crawl_waves(
        &mut self,
        repo: &dyn CacheRepository,
        sink: &mut dyn PageSink,
        cache: &mut ChangeCache,
        summary: &mut CrawlSummary,
    ) -> Result<usize> {
        let mut waves = 0usize;
        while self.state == CrawlState::Running {
            let wave = self.frontier.pop_wave(self.executor.wave_size());
            log::debug!("Wave {} dispatching {} URLs", waves + 1, wave.len());

            {
                let mut results = pin!(self.executor.dispatch(wave));
                while let Some((record, result)) = results.next().await {
                    self.absorb(&record, &result, cache, summary, sink).await?;
                }
            }
            waves += 1;

            if self.checkpoint_waves > 0 && waves % self.checkpoint_waves == 0 {
                cache.save(repo, &self.domain).await?;
            }

            let snapshot = self.frontier.snapshot();
            log::debug!(
                "Progress: {} visited, {} pending",
                snapshot.visited,
                snapshot.pending
            );
            if let Some(callback) = self.progress.as_mut() {
                callback(&snapshot);
            }

            if self.frontier.is_empty() || self.frontier.is_exhausted() {
                self.transition(CrawlState::Draining)?;
            } else if !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }
        }
        Ok(waves)
    }

    /// Fold one completed fetch into crawl state and emit its record.
    async fn absorb(
        &mut self,
        record: &UrlRecord,
        result: &FetchResult,
        cache: &mut ChangeCache,
        summary: &mut CrawlSummary,
        sink: &mut dyn PageSink,
    ) -> Result<()> {
        let mut changed = false;

        match &result.outcome {
            Ok(page) => {
                summary.fetched += 1;
                changed = cache.needs_refetch(&record.url, &page.body);
                cache.update(&record.url, &page.body);
                if !changed {
                    summary.unchanged += 1;
                }

                if page.is_html() {
                    let links = extract_links(&page.body, &page.final_url, &self.domain);
                    let admitted =
                        self.frontier
                            .add_batch(&links, record.level + 1, Some(&record.url));
                    log::debug!(
                        "{}: {} links, {} admitted",
                        record.url,
                        links.len(),
                        admitted
                    );
                }
            }
            Err(e) if e.is_transient() => {
                summary.failed_transient += 1;
                log::warn!(
                    "Giving up on {} after {} attempts: {}",
                    record.url,
                    result.attempts,
                    e
                );
            }
            Err(e) => {
                summary.failed_permanent += 1;
                log::warn!("Failed {}: {}", record.url, e);
            }
        }

        sink.emit(&PageRecord::from_fetch(record, result, changed))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::error::FetchError;
    use crate::models::{FetchedPage, PageStatus};
    use crate::services::{BoundedExecutor, PageFetcher, RetryPolicy, classify_status};
    use crate::storage::{MemoryCacheRepository, MemorySink};

    /// Serves fixed HTML per URL, 404 for everything else.
    struct FakeSite {
        pages: HashMap<String, String>,
    }

    impl FakeSite {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(url, html)| (url.to_string(), html.to_string()))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl PageFetcher for FakeSite {
        async fn fetch(&self, url: &str) -> std::result::Result<FetchedPage, FetchError> {
            match self.pages.get(url) {
                Some(body) => Ok(FetchedPage {
                    final_url: url.to_string(),
                    status_code: 200,
                    content_type: Some("text/html".to_string()),
                    body: body.clone(),
                }),
                None => Err(classify_status(404).unwrap()),
            }
        }
    }

    fn config(max_urls: usize) -> Config {
        let mut config = Config::default();
        config.frontier.max_urls = max_urls;
        config.frontier.max_depth = 20;
        config.crawler.max_concurrent = 4;
        config
    }

    fn orchestrator(site: FakeSite, config: &Config) -> Orchestrator {
        let executor = FetchExecutor::new(
            Arc::new(site),
            BoundedExecutor::new(config.crawler.max_concurrent),
            RetryPolicy::none(),
            Duration::from_secs(5),
        );
        Orchestrator::new("https://example.com/", config, executor).unwrap()
    }

    fn chain_site(len: usize) -> FakeSite {
        // Page i links to page i + 1; the last page links nowhere
        let link = |next: usize| {
            if next < len {
                format!(r#"<a href="/p{next}">next</a>"#)
            } else {
                "<p>end</p>".to_string()
            }
        };
        let mut pages = vec![("https://example.com/".to_string(), link(1))];
        for i in 1..len {
            pages.push((format!("https://example.com/p{i}"), link(i + 1)));
        }
        FakeSite {
            pages: pages.into_iter().collect(),
        }
    }

    #[tokio::test]
    async fn test_chain_stops_at_budget() {
        let repo = MemoryCacheRepository::new();
        let mut sink = MemorySink::new();

        let summary = orchestrator(chain_site(10), &config(5))
            .run(&repo, &mut sink)
            .await
            .unwrap();

        assert_eq!(summary.visited, 5);
        assert_eq!(sink.records().len(), 5);
        assert_eq!(summary.final_state, CrawlState::Done);
        assert!(sink.is_finished());
        assert!(sink.records().iter().all(PageRecord::is_success));
    }

    #[tokio::test]
    async fn test_shared_link_in_one_wave_admitted_once() {
        let site = FakeSite::new(&[
            (
                "https://example.com/",
                r#"<a href="/a">A</a><a href="/b">B</a>"#,
            ),
            ("https://example.com/a", r#"<a href="/shared">S</a>"#),
            ("https://example.com/b", r#"<a href="/shared/">S</a>"#),
            ("https://example.com/shared", "<p>leaf</p>"),
        ]);
        let repo = MemoryCacheRepository::new();
        let mut sink = MemorySink::new();

        let summary = orchestrator(site, &config(50))
            .run(&repo, &mut sink)
            .await
            .unwrap();

        let shared = sink
            .records()
            .iter()
            .filter(|r| r.url == "https://example.com/shared")
            .count();
        assert_eq!(shared, 1);
        assert_eq!(summary.visited, 4);
        assert!(summary.duplicates >= 1);
    }

    #[tokio::test]
    async fn test_no_url_visited_twice() {
        let site = FakeSite::new(&[
            (
                "https://example.com/",
                r#"<a href="/x">X</a><a href="/y">Y</a><a href="/?utm_source=a">Home</a>"#,
            ),
            ("https://example.com/x", r#"<a href="/y">Y</a><a href="/">H</a>"#),
            ("https://example.com/y", r#"<a href="/x#top">X</a>"#),
        ]);
        let repo = MemoryCacheRepository::new();
        let mut sink = MemorySink::new();

        orchestrator(site, &config(50))
            .run(&repo, &mut sink)
            .await
            .unwrap();

        let urls: Vec<&str> = sink.records().iter().map(|r| r.url.as_str()).collect();
        let unique: HashSet<&str> = urls.iter().copied().collect();
        assert_eq!(urls.len(), unique.len());
        assert_eq!(urls.len(), 3);
    }

    #[tokio::test]
    async fn test_second_run_sees_unchanged_content() {
        let repo = MemoryCacheRepository::new();
        let cfg = config(20);

        let mut first = MemorySink::new();
        let summary = orchestrator(chain_site(4), &cfg)
            .run(&repo, &mut first)
            .await
            .unwrap();
        assert!(first.records().iter().all(|r| r.changed));
        assert_eq!(summary.unchanged, 0);

        let mut second = MemorySink::new();
        let summary = orchestrator(chain_site(4), &cfg)
            .run(&repo, &mut second)
            .await
            .unwrap();
        assert_eq!(second.records().len(), first.records().len());
        assert!(second.records().iter().all(|r| !r.changed));
        assert_eq!(summary.unchanged, summary.fetched);
    }

    #[tokio::test]
    async fn test_failures_are_recorded_not_raised() {
        let site = FakeSite::new(&[
            (
                "https://example.com/",
                r#"<a href="/missing">gone</a><a href="/ok">ok</a>"#,
            ),
            ("https://example.com/ok", "<p>fine</p>"),
        ]);
        let repo = MemoryCacheRepository::new();
        let mut sink = MemorySink::new();

        let summary = orchestrator(site, &config(50))
            .run(&repo, &mut sink)
            .await
            .unwrap();

        assert_eq!(summary.failed_permanent, 1);
        assert_eq!(summary.fetched, 2);
        let missing = sink
            .records()
            .iter()
            .find(|r| r.url == "https://example.com/missing")
            .unwrap();
        assert_eq!(missing.status, PageStatus::PermanentFailure);
        assert_eq!(missing.status_code, Some(404));
        assert!(missing.error.is_some());
    }

    #[tokio::test]
    async fn test_corrupt_cache_does_not_stop_the_run() {
        let repo = MemoryCacheRepository::new();
        repo.corrupt("example.com");
        let mut sink = MemorySink::new();

        let summary = orchestrator(chain_site(2), &config(10))
            .run(&repo, &mut sink)
            .await
            .unwrap();
        assert_eq!(summary.visited, 2);
        assert_eq!(repo.entries("example.com").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_progress_reported_each_wave() {
        let snapshots = Arc::new(Mutex::new(Vec::new()));
        let seen = snapshots.clone();
        let repo = MemoryCacheRepository::new();
        let mut sink = MemorySink::new();

        orchestrator(chain_site(3), &config(10))
            .with_progress(Box::new(move |s: &ProgressSnapshot| {
                seen.lock().unwrap().push(s.clone())
            }))
            .run(&repo, &mut sink)
            .await
            .unwrap();

        let snapshots = snapshots.lock().unwrap();
        // One URL per wave along a chain
        assert_eq!(snapshots.len(), 3);
        assert_eq!(snapshots.last().unwrap().visited, 3);
        assert_eq!(snapshots.last().unwrap().pending, 0);
    }

    #[tokio::test]
    async fn test_unadmissible_seed_finishes_empty() {
        let executor = FetchExecutor::new(
            Arc::new(FakeSite::new(&[])),
            BoundedExecutor::new(2),
            RetryPolicy::none(),
            Duration::from_secs(1),
        );
        let repo = MemoryCacheRepository::new();
        let mut sink = MemorySink::new();

        let summary = Orchestrator::new("https://example.com/report.pdf", &config(10), executor)
            .unwrap()
            .run(&repo, &mut sink)
            .await
            .unwrap();

        assert_eq!(summary.final_state, CrawlState::Done);
        assert_eq!(summary.visited, 0);
        assert_eq!(summary.skipped_invalid, 1);
        assert!(sink.records().is_empty());
    }

    /// Accepts `limit` records, then fails every emit.
    #[derive(Default)]
    struct FailingSink {
        limit: usize,
        emitted: usize,
        finished: bool,
    }

    #[async_trait]
    impl PageSink for FailingSink {
        async fn emit(&mut self, _record: &PageRecord) -> Result<()> {
            if self.emitted >= self.limit {
                return Err(AppError::Io(std::io::Error::other("disk full")));
            }
            self.emitted += 1;
            Ok(())
        }

        async fn finish(&mut self) -> Result<()> {
            self.finished = true;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_unwritable_cache_location_halts_run() {
        let repo = MemoryCacheRepository::new();
        repo.make_unwritable();
        let mut sink = MemorySink::new();

        let result = orchestrator(chain_site(3), &config(10))
            .run(&repo, &mut sink)
            .await;

        assert!(matches!(result, Err(AppError::Config(_))));
        assert!(sink.records().is_empty());
        assert!(!sink.is_finished());
        assert_eq!(repo.save_count(), 0);
    }

    #[tokio::test]
    async fn test_cache_checkpointed_every_wave() {
        let repo = Arc::new(MemoryCacheRepository::new());
        let saves_after_wave = Arc::new(Mutex::new(Vec::new()));
        let seen = saves_after_wave.clone();
        let observed = repo.clone();

        let mut cfg = config(20);
        cfg.cache.checkpoint_waves = 1;
        let mut sink = MemorySink::new();

        orchestrator(chain_site(4), &cfg)
            .with_progress(Box::new(move |_: &ProgressSnapshot| {
                seen.lock().unwrap().push(observed.save_count())
            }))
            .run(&*repo, &mut sink)
            .await
            .unwrap();

        // One wave per chain page, each followed by a save
        assert_eq!(*saves_after_wave.lock().unwrap(), vec![1, 2, 3, 4]);
        // Nothing new to write when draining
        assert_eq!(repo.save_count(), 4);
        assert_eq!(repo.entries("example.com").unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_cache_saved_once_without_checkpoints() {
        let repo = MemoryCacheRepository::new();
        let mut cfg = config(20);
        cfg.cache.checkpoint_waves = 0;
        let mut sink = MemorySink::new();

        orchestrator(chain_site(4), &cfg)
            .run(&repo, &mut sink)
            .await
            .unwrap();

        assert_eq!(repo.save_count(), 1);
    }

    #[tokio::test]
    async fn test_sink_failure_still_saves_cache() {
        let repo = MemoryCacheRepository::new();
        let mut sink = FailingSink {
            limit: 1,
            ..FailingSink::default()
        };

        let result = orchestrator(chain_site(4), &config(20))
            .run(&repo, &mut sink)
            .await;

        assert!(matches!(result, Err(AppError::Io(_))));
        assert!(!sink.finished);
        let saved = repo.entries("example.com").unwrap();
        assert!(saved.contains_key("https://example.com/"));
        assert!(saved.contains_key("https://example.com/p1"));
    }

    #[test]
    fn test_seed_without_host_is_rejected() {
        let executor = FetchExecutor::new(
            Arc::new(FakeSite::new(&[])),
            BoundedExecutor::new(1),
            RetryPolicy::none(),
            Duration::from_secs(1),
        );
        assert!(Orchestrator::new("not a url", &config(10), executor).is_err());
    }
}
