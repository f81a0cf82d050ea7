//! Outbound link extraction.

use std::collections::HashSet;

use scraper::{Html, Selector};
use url::Url;

/// Href prefixes that never lead to a crawlable page.
const SKIPPED_SCHEMES: &[&str] = &["mailto:", "tel:", "javascript:", "data:"];

/// Extract same-domain links from an HTML page.
///
/// Links are resolved against `<base href>` when present, otherwise against
/// `page_url`. The result keeps first-seen order with duplicates removed.
/// Pages marked `nofollow` through a robots meta tag yield nothing.
pub fn extract_links(html: &str, page_url: &str, domain: &str) -> Vec<String> {
    let Ok(page) = Url::parse(page_url) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);

    if is_nofollow(&document) {
        log::debug!("Skipping links on nofollow page {page_url}");
        return Vec::new();
    }

    let base = base_href(&document)
        .and_then(|href| page.join(&href).ok())
        .unwrap_or(page);

    let Ok(anchors) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    document
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| resolve_link(&base, href))
        .filter(|url| {
            url.host_str()
                .is_some_and(|host| host.eq_ignore_ascii_case(domain))
        })
        .map(|mut url| {
            url.set_fragment(None);
            url.to_string()
        })
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    if SKIPPED_SCHEMES.iter().any(|scheme| lower.starts_with(scheme)) {
        return None;
    }

    let url = base.join(href).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

fn base_href(document: &Html) -> Option<String> {
    let selector = Selector::parse("base[href]").ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("href"))
        .map(str::to_string)
}

fn is_nofollow(document: &Html) -> bool {
    let Ok(selector) = Selector::parse("meta[name][content]") else {
        return false;
    };
    document.select(&selector).any(|meta| {
        let el = meta.value();
        el.attr("name")
            .is_some_and(|name| name.eq_ignore_ascii_case("robots"))
            && el
                .attr("content")
                .is_some_and(|c| c.to_ascii_lowercase().contains("nofollow"))
    })
}
