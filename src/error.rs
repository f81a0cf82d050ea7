// src/error.rs

//! Unified error handling for the crawler.
//!
//! `AppError` covers everything that can halt a run or a setup step.
//! Per-URL network failures are modelled separately by [`FetchError`]
//! and travel inside fetch results instead of being raised.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client failed outside of a page fetch (e.g. client construction)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Regex rule failed to compile
    #[error("Invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Persisted change cache could not be read back
    #[error("Cache error: {0}")]
    Cache(String),

    /// Crawling error
    #[error("Crawl error for {context}: {message}")]
    Crawl { context: String, message: String },
}

impl AppError {
    /// Create a pattern compilation error.
    pub fn pattern(pattern: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a cache error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache(message.into())
    }

    /// Create a crawl error with context.
    pub fn crawl(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Crawl {
            context: context.into(),
            message: message.to_string(),
        }
    }
}

/// Why a single fetch attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    Timeout,
    Connect,
    ServerError,
    RateLimited,
    ClientError,
    ContentType,
    MalformedUrl,
    Body,
}

/// Failure of a page fetch, split by whether retrying can help.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum FetchError {
    /// Timeout, connection failure, 5xx or 429: worth retrying.
    #[error("transient {kind:?}: {message}")]
    Transient {
        kind: FetchErrorKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        message: String,
    },

    /// 4xx, unexpected content type or malformed URL: never retried.
    #[error("permanent {kind:?}: {message}")]
    Permanent {
        kind: FetchErrorKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        message: String,
    },
}

impl FetchError {
    pub fn transient(kind: FetchErrorKind, message: impl fmt::Display) -> Self {
        Self::Transient {
            kind,
            status: None,
            message: message.to_string(),
        }
    }

    pub fn permanent(kind: FetchErrorKind, message: impl fmt::Display) -> Self {
        Self::Permanent {
            kind,
            status: None,
            message: message.to_string(),
        }
    }

    /// Attach the HTTP status the failure was derived from.
    pub fn with_status(mut self, code: u16) -> Self {
        match &mut self {
            Self::Transient { status, .. } | Self::Permanent { status, .. } => {
                *status = Some(code)
            }
        }
        self
    }

    /// HTTP status, when a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transient { status, .. } | Self::Permanent { status, .. } => *status,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::Transient { kind, .. } | Self::Permanent { kind, .. } => *kind,
        }
    }
}
