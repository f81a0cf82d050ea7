//! Crawl lifecycle state, progress snapshots and run summaries.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::UrlType;

/// Lifecycle of a crawl run. `Done` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CrawlState {
    Init,
    Running,
    Draining,
    Done,
}

impl CrawlState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: CrawlState) -> bool {
        matches!(
            (self, next),
            (CrawlState::Init, CrawlState::Running)
                | (CrawlState::Init, CrawlState::Draining)
                | (CrawlState::Running, CrawlState::Draining)
                | (CrawlState::Draining, CrawlState::Done)
        )
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CrawlState::Init => "INIT",
            CrawlState::Running => "RUNNING",
            CrawlState::Draining => "DRAINING",
            CrawlState::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// Periodic view of crawl progress for an external indicator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub visited: usize,
    pub pending: usize,
    pub per_type_counts: BTreeMap<UrlType, usize>,
}

/// Summary of a crawl run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSummary {
    pub domain: String,
    pub seed: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub final_state: CrawlState,

    /// URLs popped from the frontier and dispatched
    pub visited: usize,
    /// Successful fetches
    pub fetched: usize,
    /// Successful fetches the change cache considered unchanged
    pub unchanged: usize,
    /// Failures after exhausting retries
    pub failed_transient: usize,
    /// Failures recorded without retry
    pub failed_permanent: usize,

    pub skipped_invalid: usize,
    pub skipped_quota: usize,
    pub skipped_budget: usize,
    pub skipped_depth: usize,
    pub duplicates: usize,

    /// Admitted URLs per semantic type
    pub per_type_counts: BTreeMap<UrlType, usize>,
    /// URLs still pending when the run finished
    pub pending_at_end: usize,
}

impl CrawlSummary {
    pub fn new(domain: impl Into<String>, seed: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            domain: domain.into(),
            seed: seed.into(),
            start_time: now,
            end_time: now,
            final_state: CrawlState::Init,
            visited: 0,
            fetched: 0,
            unchanged: 0,
            failed_transient: 0,
            failed_permanent: 0,
            skipped_invalid: 0,
            skipped_quota: 0,
            skipped_budget: 0,
            skipped_depth: 0,
            duplicates: 0,
            per_type_counts: BTreeMap::new(),
            pending_at_end: 0,
        }
    }

    /// Total failed URLs of either class.
    pub fn failed(&self) -> usize {
        self.failed_transient + self.failed_permanent
    }

    /// Key/value rows for console output.
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Domain", self.domain.clone()),
            ("Final state", self.final_state.to_string()),
            ("Visited", self.visited.to_string()),
            ("Fetched", self.fetched.to_string()),
            ("Unchanged", self.unchanged.to_string()),
            ("Failed (transient, retries exhausted)", self.failed_transient.to_string()),
            ("Failed (permanent)", self.failed_permanent.to_string()),
            ("Skipped by validation", self.skipped_invalid.to_string()),
            ("Skipped by quota", self.skipped_quota.to_string()),
            ("Skipped by budget", self.skipped_budget.to_string()),
            ("Skipped by depth", self.skipped_depth.to_string()),
            ("Pending at end", self.pending_at_end.to_string()),
            (
                "Duration",
                format!(
                    "{:.1}s",
                    (self.end_time - self.start_time).num_milliseconds() as f64 / 1000.0
                ),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        assert!(CrawlState::Init.can_transition_to(CrawlState::Running));
        assert!(CrawlState::Running.can_transition_to(CrawlState::Draining));
        assert!(CrawlState::Draining.can_transition_to(CrawlState::Done));
        assert!(!CrawlState::Done.can_transition_to(CrawlState::Running));
        assert!(!CrawlState::Running.can_transition_to(CrawlState::Init));
        assert!(!CrawlState::Done.can_transition_to(CrawlState::Done));
    }

    #[test]
    fn test_summary_failed_total() {
        let mut summary = CrawlSummary::new("example.com", "https://example.com/");
        summary.failed_transient = 2;
        summary.failed_permanent = 3;
        assert_eq!(summary.failed(), 5);
        assert!(summary.rows().iter().any(|(k, _)| *k == "Skipped by quota"));
    }
}
