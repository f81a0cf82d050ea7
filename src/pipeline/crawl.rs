// src/pipeline/crawl.rs

//! Site crawling pipeline.

use crate::error::Result;
use crate::models::{Config, CrawlSummary, ProgressSnapshot};
use crate::pipeline::Orchestrator;
use crate::services::FetchExecutor;
use crate::storage::LocalStorage;
use crate::utils::log;

/// Crawl the site rooted at `seed`, writing page records, the change cache
/// and the run summary under `storage`.
pub async fn run_crawler(
    config: &Config,
    storage: &LocalStorage,
    seed: &str,
) -> Result<CrawlSummary> {
    config.validate()?;
    log::header(&format!("Crawling {seed}"));

    let quotas = config.frontier.quota_table()?;
    log::info(&format!(
        "Budget {} URLs, depth {}, {} workers, profile '{}'",
        config.frontier.max_urls,
        config.frontier.max_depth,
        config.crawler.max_concurrent,
        config.frontier.quota_profile
    ));

    let executor = FetchExecutor::from_config(config)?;
    let mut orchestrator = Orchestrator::new(seed, config, executor)?;
    if config.logging.show_progress {
        orchestrator = orchestrator.with_progress(Box::new(|snapshot: &ProgressSnapshot| {
            log::progress(&format!(
                "{} visited, {} pending",
                snapshot.visited, snapshot.pending
            ))
        }));
    }

    let domain = orchestrator.domain().to_string();
    let mut sink = storage.page_sink(&domain).await?;
    let summary = orchestrator.run(storage, &mut sink).await;
    if config.logging.show_progress {
        log::progress_done();
    }
    let summary = summary?;

    storage.write_summary(&summary).await?;

    log::summary(&format!("Crawl of {domain}"), &summary.rows());
    for (url_type, count) in &summary.per_type_counts {
        let line = match quotas.limit(*url_type) {
            Some(cap) => format!("{url_type}: {count}/{cap}"),
            None => format!("{url_type}: {count}"),
        };
        log::sub_item(&line);
    }

    log::success(&format!(
        "{} page records written to {}",
        summary.visited,
        sink.path().display()
    ));

    Ok(summary)
}
