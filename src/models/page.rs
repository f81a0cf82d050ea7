//! Fetch results and the page records handed to collaborators.

use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::models::{UrlRecord, UrlType};
use crate::utils::content_hash;

/// A successful single fetch attempt, as returned by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// URL after redirects
    pub final_url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchedPage {
    /// Whether the response declares an HTML body.
    pub fn is_html(&self) -> bool {
        is_html_content_type(self.content_type.as_deref())
    }
}

/// Whether a Content-Type header value names an HTML document.
pub fn is_html_content_type(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| {
            let mime = ct.split(';').next().unwrap_or("").trim().to_lowercase();
            mime == "text/html" || mime == "application/xhtml+xml"
        })
        .unwrap_or(false)
}

/// Outcome of fetching one URL, including all retries.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub url: String,
    /// Number of attempts made (1 + retries)
    pub attempts: u32,
    pub outcome: std::result::Result<FetchedPage, FetchError>,
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn page(&self) -> Option<&FetchedPage> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.outcome.as_ref().err()
    }
}

/// Final state of a page in the emitted stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Fetched,
    TransientFailure,
    PermanentFailure,
}

/// One fetched (or failed) URL, as consumed by external collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,
    pub final_url: String,
    pub status: PageStatus,
    /// HTTP status, absent when no response was received
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    /// Page body, kept in memory only
    #[serde(skip)]
    pub content: Option<String>,
    /// SHA-256 of the body; the persisted handle for `content`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    pub fetch_level: usize,
    pub url_type: UrlType,
    /// False when the change cache saw identical content within its TTL
    pub changed: bool,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageRecord {
    /// Build a record from a completed fetch.
    pub fn from_fetch(record: &UrlRecord, result: &FetchResult, changed: bool) -> Self {
        match &result.outcome {
            Ok(page) => Self {
                url: record.url.clone(),
                final_url: page.final_url.clone(),
                status: PageStatus::Fetched,
                status_code: Some(page.status_code),
                content_type: page.content_type.clone(),
                content: Some(page.body.clone()),
                content_hash: Some(content_hash(&page.body)),
                fetch_level: record.level,
                url_type: record.url_type,
                changed,
                attempts: result.attempts,
                error: None,
            },
            Err(error) => Self {
                url: record.url.clone(),
                final_url: record.url.clone(),
                status: if error.is_transient() {
                    PageStatus::TransientFailure
                } else {
                    PageStatus::PermanentFailure
                },
                status_code: error.status(),
                content_type: None,
                content: None,
                content_hash: None,
                fetch_level: record.level,
                url_type: record.url_type,
                changed: false,
                attempts: result.attempts,
                error: Some(error.to_string()),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == PageStatus::Fetched
    }
}
