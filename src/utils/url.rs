// src/utils/url.rs

//! URL canonicalization and admission checks.
//!
//! `normalize` maps every spelling of a page onto one canonical string so the
//! frontier can de-duplicate by string equality. `validate` decides whether a
//! URL is worth fetching at all for the crawl's domain.

use url::Url;

use crate::error::Result;

/// Longest URL accepted by [`validate`].
pub const MAX_URL_LENGTH: usize = 2000;

/// Most query parameters accepted by [`validate`].
pub const MAX_QUERY_PARAMS: usize = 5;

/// Query parameters that identify content and are always kept.
const SEO_PARAMS: &[&str] = &[
    "page", "p", "paged", "pg", "category", "cat", "id", "slug", "q", "s", "query", "search",
    "date", "year", "month", "tag", "sort", "lang",
];

/// Exact tracking parameter names that are dropped.
const TRACKING_PARAMS: &[&str] = &[
    "gclid", "gclsrc", "dclid", "fbclid", "msclkid", "yclid", "twclid", "ttclid", "igshid",
    "mc_cid", "mc_eid", "_ga", "_gl", "_hsenc", "_hsmi", "mkt_tok", "ref", "ref_src",
    "sessionid", "sid", "phpsessid", "jsessionid",
];

/// Prefixes of tracking parameter families.
const TRACKING_PREFIXES: &[&str] = &["utm_", "pk_", "hsa_", "vero_", "oly_"];

/// Extensions of files that are never HTML pages.
const BINARY_EXTENSIONS: &[&str] = &[
    "pdf", "jpg", "jpeg", "png", "gif", "bmp", "svg", "webp", "ico", "tif", "tiff", "css", "js",
    "mjs", "map", "json", "xml", "rss", "atom", "txt", "csv", "zip", "rar", "7z", "gz", "tgz",
    "tar", "bz2", "mp3", "mp4", "m4a", "wav", "ogg", "webm", "avi", "mov", "wmv", "flv", "doc",
    "docx", "xls", "xlsx", "ppt", "pptx", "odt", "exe", "dmg", "msi", "apk", "iso", "woff",
    "woff2", "ttf", "otf", "eot",
];

/// CMS internals and server paths that are never crawled.
const SYSTEM_PREFIXES: &[&str] = &[
    "/wp-admin",
    "/wp-includes",
    "/wp-content/plugins",
    "/wp-login.php",
    "/xmlrpc.php",
    "/cgi-bin",
    "/.well-known",
    "/.git",
    "/server-status",
    "/phpmyadmin",
];

/// Characters that may not appear unescaped in a URL.
const ILLEGAL_CHARS: &[char] = &[' ', '<', '>', '"', '{', '}', '|', '\\', '^', '`'];

/// Canonicalize a URL.
///
/// Drops the fragment, collapses repeated `/`, removes tracking parameters,
/// sorts the remaining parameters and strips a trailing `/` (except for the
/// root path). Scheme and host are lowercased by the parser and default
/// ports are removed. Normalizing an already canonical URL is a no-op.
pub fn normalize(raw: &str) -> Result<String> {
    let mut url = Url::parse(raw.trim())?;
    url.set_fragment(None);

    let path = canonical_path(url.path());
    url.set_path(&path);

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        pairs.sort();
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }

    Ok(url.to_string())
}

fn canonical_path(path: &str) -> String {
    let mut collapsed = String::with_capacity(path.len());
    let mut previous_slash = false;
    for c in path.chars() {
        if c == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        collapsed.push(c);
    }

    if collapsed.len() > 1 && collapsed.ends_with('/') {
        collapsed.pop();
    }
    if collapsed.is_empty() {
        collapsed.push('/');
    }
    collapsed
}

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_lowercase();
    if SEO_PARAMS.contains(&key.as_str()) {
        return false;
    }
    TRACKING_PARAMS.contains(&key.as_str())
        || TRACKING_PREFIXES.iter().any(|prefix| key.starts_with(prefix))
}

/// Check whether a URL belongs to `domain` and is worth fetching.
pub fn validate(raw: &str, domain: &str) -> bool {
    if raw.len() > MAX_URL_LENGTH
        || raw
            .chars()
            .any(|c| ILLEGAL_CHARS.contains(&c) || c.is_control())
    {
        return false;
    }

    let Ok(url) = Url::parse(raw) else {
        return false;
    };

    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    match url.host_str() {
        Some(host) if host.eq_ignore_ascii_case(domain) => {}
        _ => return false,
    }

    let path = url.path().to_lowercase();
    if has_binary_extension(&path) {
        return false;
    }
    if SYSTEM_PREFIXES
        .iter()
        .any(|prefix| path == *prefix || path.starts_with(&format!("{prefix}/")))
    {
        return false;
    }

    url.query_pairs().count() <= MAX_QUERY_PARAMS
}

fn has_binary_extension(path: &str) -> bool {
    let last = path.rsplit('/').next().unwrap_or("");
    match last.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => BINARY_EXTENSIONS.contains(&ext),
        _ => false,
    }
}

/// Extract the host of a URL, lowercased.
///
/// # Examples
/// ```
/// use sitecrawler::utils::url::get_domain;
///
/// assert_eq!(
///     get_domain("https://Example.COM/path"),
///     Some("example.com".to_string())
/// );
/// ```
pub fn get_domain(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}
