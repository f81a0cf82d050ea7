//! URL classification service.
//!
//! Maps a canonical URL to a semantic [`UrlType`] by walking an ordered rule
//! table. The first rule with a matching matcher wins; URLs no rule claims
//! are treated as content.

use regex::Regex;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::UrlType;

/// Standard rule table: (type, path regexes, query keys). Order matters.
const STANDARD_RULES: &[(UrlType, &[&str], &[&str])] = &[
    (
        UrlType::Admin,
        &[
            r"(?i)(^|/)(admin|administrator|login|logout|signin|sign-in|signup|sign-up|register|account|my-account|dashboard|cart|checkout)(/|$)",
        ],
        &[],
    ),
    (UrlType::Api, &[r"(?i)^/(api|graphql|rest|wp-json)(/|$)"], &[]),
    (
        UrlType::Search,
        &[r"(?i)(^|/)search(/|$)"],
        &["s", "q", "query", "search"],
    ),
    (
        UrlType::Pagination,
        &[r"(?i)/page/[0-9]+$"],
        &["page", "paged", "pg"],
    ),
    (UrlType::Tag, &[r"(?i)/(tag|tags|label|labels)(/|$)"], &["tag"]),
    (
        UrlType::Category,
        &[r"(?i)/(category|categories|cat|collections?|departments?|topics?)(/|$)"],
        &["category", "cat"],
    ),
    (
        UrlType::Archive,
        &[r"(?i)/(archive|archives)(/|$)", r"^/[0-9]{4}(/[0-9]{1,2}){0,2}$"],
        &[],
    ),
    (
        UrlType::Product,
        &[r"(?i)^/(products?|shop|store|items?)/[^/]+"],
        &[],
    ),
    (
        UrlType::Documentation,
        &[
            r"(?i)^/(docs?|documentation|guides?|manual|help|kb|knowledge-base|reference|api-reference|tutorials?|learn)(/|$)",
        ],
        &[],
    ),
    (
        UrlType::Institutional,
        &[
            r"(?i)^/(about|about-us|company|contact|contact-us|team|careers|jobs|privacy|privacy-policy|terms|terms-of-service|legal|imprint|impressum|faq)(/|$)",
        ],
        &[],
    ),
    (
        UrlType::Content,
        &[r"(?i)^/(blog|news|articles?|posts?|stories|insights|resources)(/|$)"],
        &[],
    ),
];

/// One way a rule can match a URL.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// The site root with no query string
    Root,
    /// Regex over the URL path
    Path(Regex),
    /// Presence of any of these query keys
    QueryKey(Vec<String>),
}

impl Matcher {
    fn matches(&self, url: &Url) -> bool {
        match self {
            Matcher::Root => url.path() == "/" && url.query().is_none(),
            Matcher::Path(re) => re.is_match(url.path()),
            Matcher::QueryKey(keys) => url
                .query_pairs()
                .any(|(k, _)| keys.iter().any(|key| k.eq_ignore_ascii_case(key))),
        }
    }
}

/// A rule assigning `url_type` when any of its matchers hit.
#[derive(Debug, Clone)]
pub struct ClassificationRule {
    pub url_type: UrlType,
    pub matchers: Vec<Matcher>,
}

impl ClassificationRule {
    /// Build a rule from path regexes and query keys.
    pub fn from_patterns(
        url_type: UrlType,
        path_patterns: &[&str],
        query_keys: &[&str],
    ) -> Result<Self> {
        let mut matchers = Vec::with_capacity(path_patterns.len() + 1);
        for pattern in path_patterns {
            let re = Regex::new(pattern).map_err(|e| AppError::pattern(*pattern, e))?;
            matchers.push(Matcher::Path(re));
        }
        if !query_keys.is_empty() {
            matchers.push(Matcher::QueryKey(
                query_keys.iter().map(|k| k.to_string()).collect(),
            ));
        }
        Ok(Self { url_type, matchers })
    }

    /// Rule matching only the site root.
    pub fn root(url_type: UrlType) -> Self {
        Self {
            url_type,
            matchers: vec![Matcher::Root],
        }
    }

    fn matches(&self, url: &Url) -> bool {
        self.matchers.iter().any(|m| m.matches(url))
    }
}

/// Ordered, first-match-wins URL classifier.
#[derive(Debug, Clone)]
pub struct UrlClassifier {
    rules: Vec<ClassificationRule>,
    fallback: UrlType,
}

impl UrlClassifier {
    /// Create a classifier from an explicit rule list.
    pub fn new(rules: Vec<ClassificationRule>) -> Self {
        Self {
            rules,
            fallback: UrlType::Content,
        }
    }

    /// The built-in rule table, homepage first.
    pub fn standard() -> Result<Self> {
        let mut rules = vec![ClassificationRule::root(UrlType::Homepage)];
        for (url_type, paths, keys) in STANDARD_RULES {
            rules.push(ClassificationRule::from_patterns(*url_type, paths, keys)?);
        }
        Ok(Self::new(rules))
    }

    /// Append a rule after all existing ones.
    pub fn push(&mut self, rule: ClassificationRule) {
        self.rules.push(rule);
    }

    /// Insert a rule at `index`, shifting later rules down.
    pub fn insert(&mut self, index: usize, rule: ClassificationRule) {
        let index = index.min(self.rules.len());
        self.rules.insert(index, rule);
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// Classify a URL. Unparseable URLs are `Unknown`.
    pub fn classify(&self, url: &str) -> UrlType {
        let Ok(parsed) = Url::parse(url) else {
            return UrlType::Unknown;
        };

        self.rules
            .iter()
            .find(|rule| rule.matches(&parsed))
            .map(|rule| rule.url_type)
            .unwrap_or(self.fallback)
    }
}
