//! Priority frontier with budget, depth and per-type quotas.
//!
//! The frontier owns every admission decision. A URL enters the pending
//! queue at most once and moves to the visited set when popped; it never
//! comes back. All mutation happens on the orchestrator task between waves.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashSet};

use serde::Serialize;

use crate::error::Result;
use crate::models::{FrontierConfig, ProgressSnapshot, QuotaTable, UrlRecord, UrlType};
use crate::services::UrlClassifier;
use crate::utils::url::{normalize, validate};

// Priority weights (lower score pops first)
const LEVEL_COST: i64 = 10;
const HOMEPAGE_BONUS: i64 = -30;
const HIGH_VALUE_BONUS: i64 = -15;
const PAGINATION_PENALTY: i64 = 15;
const SEARCH_PENALTY: i64 = 20;
const API_PENALTY: i64 = 25;
const ADMIN_PENALTY: i64 = 1_000;
const NO_QUERY_BONUS: i64 = -3;
const PATH_DEPTH_BONUS: i64 = -2;

/// Outcome of offering a URL to the frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// Failed normalization or validation
    Invalid,
    /// Already visited or already pending
    Duplicate,
    /// Discovered beyond the configured depth
    Depth,
    /// `visited + pending` already at `max_urls`
    Budget,
    /// Type quota reached
    Quota,
}

/// Rejection counters, by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkipCounters {
    pub invalid: usize,
    pub duplicate: usize,
    pub depth: usize,
    pub budget: usize,
    pub quota: usize,
}

/// Admission count and quota usage of one type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeCoverage {
    pub url_type: UrlType,
    pub admitted: usize,
    pub limit: Option<usize>,
    /// `admitted / limit` in percent, absent for unbounded types
    pub coverage_pct: Option<f64>,
}

/// Point-in-time view of the frontier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrontierReport {
    pub visited: usize,
    pub pending: usize,
    pub types: Vec<TypeCoverage>,
    pub skipped: SkipCounters,
}

impl FrontierReport {
    /// Key/value rows for console output, one per type with admissions.
    pub fn rows(&self) -> Vec<(String, String)> {
        self.types
            .iter()
            .filter(|t| t.admitted > 0)
            .map(|t| {
                let value = match (t.limit, t.coverage_pct) {
                    (Some(limit), Some(pct)) => format!("{}/{} ({pct:.0}%)", t.admitted, limit),
                    _ => t.admitted.to_string(),
                };
                (t.url_type.to_string(), value)
            })
            .collect()
    }
}

/// Heap entry: lowest priority first, then lowest insertion sequence.
#[derive(Debug)]
struct Pending {
    seq: u64,
    record: UrlRecord,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap, so both keys are reversed
        other
            .record
            .priority
            .cmp(&self.record.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Priority score for a canonical URL. Lower is more urgent.
pub fn score(canonical: &str, level: usize, url_type: UrlType) -> i64 {
    let mut score = level as i64 * LEVEL_COST;

    score += match url_type {
        UrlType::Homepage => HOMEPAGE_BONUS,
        UrlType::Content
        | UrlType::Product
        | UrlType::Documentation
        | UrlType::Institutional => HIGH_VALUE_BONUS,
        UrlType::Pagination => PAGINATION_PENALTY,
        UrlType::Search => SEARCH_PENALTY,
        UrlType::Api => API_PENALTY,
        UrlType::Admin => ADMIN_PENALTY,
        _ => 0,
    };

    if let Ok(url) = url::Url::parse(canonical) {
        if url.query().is_none() {
            score += NO_QUERY_BONUS;
        }
        let depth = url.path().split('/').filter(|s| !s.is_empty()).count();
        if (2..=4).contains(&depth) {
            score += PATH_DEPTH_BONUS;
        }
    }

    score
}

/// Pending queue, visited set and quota counters for one domain.
#[derive(Debug)]
pub struct Frontier {
    domain: String,
    max_urls: usize,
    max_depth: usize,
    quotas: QuotaTable,
    classifier: UrlClassifier,
    queue: BinaryHeap<Pending>,
    pending: HashSet<String>,
    visited: HashSet<String>,
    admitted: BTreeMap<UrlType, usize>,
    skipped: SkipCounters,
    next_seq: u64,
}

impl Frontier {
    pub fn new(
        domain: impl Into<String>,
        max_urls: usize,
        max_depth: usize,
        quotas: QuotaTable,
        classifier: UrlClassifier,
    ) -> Self {
        Self {
            domain: domain.into(),
            max_urls,
            max_depth,
            quotas,
            classifier,
            queue: BinaryHeap::new(),
            pending: HashSet::new(),
            visited: HashSet::new(),
            admitted: BTreeMap::new(),
            skipped: SkipCounters::default(),
            next_seq: 0,
        }
    }

    /// Build a frontier from the `[frontier]` config section.
    pub fn from_config(
        domain: impl Into<String>,
        config: &FrontierConfig,
        classifier: UrlClassifier,
    ) -> Result<Self> {
        Ok(Self::new(
            domain,
            config.max_urls,
            config.max_depth,
            config.quota_table()?,
            classifier,
        ))
    }

    /// Offer one URL and report the admission decision.
    pub fn admit(&mut self, raw: &str, level: usize, origin: Option<&str>) -> Admission {
        if !validate(raw, &self.domain) {
            self.skipped.invalid += 1;
            return Admission::Invalid;
        }
        let Ok(canonical) = normalize(raw) else {
            self.skipped.invalid += 1;
            return Admission::Invalid;
        };

        if self.visited.contains(&canonical) || self.pending.contains(&canonical) {
            self.skipped.duplicate += 1;
            return Admission::Duplicate;
        }
        if level > self.max_depth {
            self.skipped.depth += 1;
            return Admission::Depth;
        }
        if self.visited.len() + self.pending.len() >= self.max_urls {
            self.skipped.budget += 1;
            return Admission::Budget;
        }

        let url_type = self.classifier.classify(&canonical);
        let admitted = self.admitted.get(&url_type).copied().unwrap_or(0);
        if !self.quotas.allows(url_type, admitted) {
            self.skipped.quota += 1;
            return Admission::Quota;
        }

        let record = UrlRecord {
            priority: score(&canonical, level, url_type),
            url: canonical.clone(),
            level,
            origin: origin.map(str::to_string),
            url_type,
        };
        log::debug!(
            "Admitted {} as {} (level {}, priority {})",
            record.url,
            url_type,
            level,
            record.priority
        );

        *self.admitted.entry(url_type).or_insert(0) += 1;
        self.pending.insert(canonical);
        self.queue.push(Pending {
            seq: self.next_seq,
            record,
        });
        self.next_seq += 1;

        Admission::Admitted
    }

    /// Offer one URL; true when it was admitted.
    pub fn add(&mut self, raw: &str, level: usize, origin: Option<&str>) -> bool {
        self.admit(raw, level, origin) == Admission::Admitted
    }

    /// Offer a batch of URLs discovered together, best-scoring first.
    ///
    /// Returns how many were admitted.
    pub fn add_batch<S: AsRef<str>>(&mut self, urls: &[S], level: usize, origin: Option<&str>) -> usize {
        let mut scored: Vec<(i64, &str)> = urls
            .iter()
            .map(|raw| {
                let raw = raw.as_ref();
                let priority = match normalize(raw) {
                    Ok(canonical) => {
                        score(&canonical, level, self.classifier.classify(&canonical))
                    }
                    Err(_) => i64::MAX,
                };
                (priority, raw)
            })
            .collect();
        // Stable sort keeps extraction order among equal scores
        scored.sort_by_key(|(priority, _)| *priority);

        scored
            .into_iter()
            .filter(|(_, raw)| self.add(raw, level, origin))
            .count()
    }

    /// Remove the most urgent pending URL and mark it visited.
    pub fn pop(&mut self) -> Option<UrlRecord> {
        let Pending { record, .. } = self.queue.pop()?;
        self.pending.remove(&record.url);
        self.visited.insert(record.url.clone());
        Some(record)
    }

    /// Pop up to `n` URLs in priority order.
    pub fn pop_wave(&mut self, n: usize) -> Vec<UrlRecord> {
        std::iter::from_fn(|| self.pop()).take(n).collect()
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn max_urls(&self) -> usize {
        self.max_urls
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Whether the visit budget is used up.
    pub fn is_exhausted(&self) -> bool {
        self.visited.len() >= self.max_urls
    }

    pub fn is_visited(&self, canonical: &str) -> bool {
        self.visited.contains(canonical)
    }

    pub fn skipped(&self) -> SkipCounters {
        self.skipped
    }

    /// Admissions so far, per type.
    pub fn per_type_counts(&self) -> &BTreeMap<UrlType, usize> {
        &self.admitted
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            visited: self.visited.len(),
            pending: self.pending.len(),
            per_type_counts: self.admitted.clone(),
        }
    }

    pub fn report(&self) -> FrontierReport {
        let types = UrlType::ALL
            .iter()
            .map(|&url_type| {
                let admitted = self.admitted.get(&url_type).copied().unwrap_or(0);
                let limit = self.quotas.limit(url_type);
                let coverage_pct = limit.map(|cap| {
                    if cap == 0 {
                        100.0
                    } else {
                        admitted as f64 * 100.0 / cap as f64
                    }
                });
                TypeCoverage {
                    url_type,
                    admitted,
                    limit,
                    coverage_pct,
                }
            })
            .collect();

        FrontierReport {
            visited: self.visited.len(),
            pending: self.pending.len(),
            types,
            skipped: self.skipped,
        }
    }
}
