//! URL records and semantic URL types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Semantic type of a page, derived from its URL shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlType {
    Homepage,
    Content,
    Product,
    Category,
    Tag,
    Archive,
    Pagination,
    Search,
    Documentation,
    Institutional,
    Api,
    Admin,
    Unknown,
}

impl UrlType {
    /// Every type, in declaration order.
    pub const ALL: [UrlType; 13] = [
        UrlType::Homepage,
        UrlType::Content,
        UrlType::Product,
        UrlType::Category,
        UrlType::Tag,
        UrlType::Archive,
        UrlType::Pagination,
        UrlType::Search,
        UrlType::Documentation,
        UrlType::Institutional,
        UrlType::Api,
        UrlType::Admin,
        UrlType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UrlType::Homepage => "homepage",
            UrlType::Content => "content",
            UrlType::Product => "product",
            UrlType::Category => "category",
            UrlType::Tag => "tag",
            UrlType::Archive => "archive",
            UrlType::Pagination => "pagination",
            UrlType::Search => "search",
            UrlType::Documentation => "documentation",
            UrlType::Institutional => "institutional",
            UrlType::Api => "api",
            UrlType::Admin => "admin",
            UrlType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for UrlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UrlType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        UrlType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| AppError::config(format!("Unknown URL type '{s}'")))
    }
}

/// A URL admitted to the frontier. Immutable once admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// Canonical URL
    pub url: String,

    /// Hop distance from the seed
    pub level: usize,

    /// Page the URL was discovered on (None for the seed)
    pub origin: Option<String>,

    /// Semantic type
    pub url_type: UrlType,

    /// Admission priority, lower pops first
    pub priority: i64,
}
