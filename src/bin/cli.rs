//! sitecrawler CLI
//!
//! Local execution entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sitecrawler::{
    error::{AppError, Result},
    models::{Config, PROFILES},
    pipeline,
    storage::LocalStorage,
    utils,
};

/// sitecrawler - Budgeted single-domain crawler
#[derive(Parser, Debug)]
#[command(
    name = "sitecrawler",
    version,
    about = "Budgeted single-domain crawler with change detection"
)]
struct Cli {
    /// Path to storage directory containing config and crawl state
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the site rooted at a seed URL
    Crawl {
        /// Seed URL (domain root)
        seed: String,

        /// Override frontier.max_urls
        #[arg(long)]
        max_urls: Option<usize>,

        /// Override frontier.max_depth
        #[arg(long)]
        max_depth: Option<usize>,

        /// Override frontier.quota_profile
        #[arg(long)]
        profile: Option<String>,

        /// Override crawler.max_concurrent
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Validate configuration file
    Validate,

    /// Show the change cache of a domain
    Cache {
        /// Domain (host name) to inspect
        domain: String,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let storage = LocalStorage::new(&cli.storage_dir);
    let config_path = storage.config_path();

    match cli.command {
        Command::Crawl {
            seed,
            max_urls,
            max_depth,
            profile,
            workers,
        } => {
            let mut config = Config::load_or_default(&config_path);
            utils::log::init(if cli.verbose {
                "debug"
            } else {
                config.logging.level.as_str()
            });

            if let Some(max_urls) = max_urls {
                config.frontier.max_urls = max_urls;
            }
            if let Some(max_depth) = max_depth {
                config.frontier.max_depth = max_depth;
            }
            if let Some(profile) = profile {
                if !PROFILES.contains(&profile.as_str()) {
                    return Err(AppError::config(format!(
                        "Unknown profile '{profile}' (expected one of: {})",
                        PROFILES.join(", ")
                    )));
                }
                config.frontier.quota_profile = profile;
            }
            if let Some(workers) = workers {
                config.crawler.max_concurrent = workers;
            }

            let summary = pipeline::run_crawler(&config, &storage, &seed).await?;
            log::info!(
                "Crawl finished: {} visited, {} failed, {} skipped by validation, {} skipped by quota",
                summary.visited,
                summary.failed(),
                summary.skipped_invalid,
                summary.skipped_quota
            );
        }

        Command::Validate => {
            pipeline::run_validate(&config_path)?;
        }

        Command::Cache { domain } => {
            let config = Config::load_or_default(&config_path);
            let domain = domain.to_lowercase();
            if pipeline::run_cache_info(&config, &storage, &domain)
                .await?
                .is_none()
            {
                log::warn!("Nothing cached yet for {domain}. Run 'crawl' first.");
            }
        }
    }

    Ok(())
}
