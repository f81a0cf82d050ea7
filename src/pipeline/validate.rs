// src/pipeline/validate.rs

use std::path::Path;

use crate::error::Result;
use crate::models::Config;
use crate::services::UrlClassifier;
use crate::utils::log;

/// Validate the config file and the built-in classification rules.
pub fn run_validate(config_path: &Path) -> Result<Config> {
    log::header("Validating configuration");

    let result = Config::load(config_path).and_then(|config| {
        config.validate()?;
        let classifier = UrlClassifier::standard()?;
        Ok((config, classifier))
    });

    match result {
        Ok((config, classifier)) => {
            log::success(&format!("Config OK: {}", config_path.display()));
            log::sub_item(&format!("User agent: {}", config.crawler.user_agent));
            log::sub_item(&format!("Timeout: {}s", config.crawler.timeout_secs));
            log::sub_item(&format!("Workers: {}", config.crawler.max_concurrent));
            log::sub_item(&format!(
                "Budget: {} URLs, depth {}",
                config.frontier.max_urls, config.frontier.max_depth
            ));
            log::sub_item(&format!("Quota profile: {}", config.frontier.quota_profile));
            log::sub_item(&format!(
                "Retries: {} (base {}ms, max {}ms)",
                config.retry.max_retries, config.retry.base_delay_ms, config.retry.max_delay_ms
            ));
            log::sub_item(&format!(
                "Cache TTL: {}d default, {}d volatile",
                config.cache.default_ttl_days, config.cache.volatile_ttl_days
            ));
            log::success(&format!(
                "{} classification rules compiled",
                classifier.rules().len()
            ));
            Ok(config)
        }
        Err(e) => {
            log::error(&format!("Validation failed: {e}"));
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_accepts_minimal_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[frontier]\nmax_urls = 10\n").unwrap();

        let config = run_validate(&path).unwrap();
        assert_eq!(config.frontier.max_urls, 10);
    }

    #[test]
    fn test_validate_rejects_unknown_profile() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[frontier]\nquota_profile = \"nope\"\n").unwrap();

        assert!(run_validate(&path).is_err());
    }

    #[test]
    fn test_validate_missing_file() {
        let tmp = TempDir::new().unwrap();
        assert!(run_validate(&tmp.path().join("absent.toml")).is_err());
    }
}
