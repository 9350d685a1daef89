//! Link extraction boundary
//!
//! The engine consumes hyperlinks through the [`LinkExtractor`] capability:
//! given a crawled page, return absolute link URIs. The default
//! [`HtmlLinkExtractor`] parses with scraper, which means markup inside
//! comments, scripts and styles never yields anchor elements.
//!
//! Extraction rules:
//! - `<a href>` anchors only; `javascript:`, `mailto:`, `tel:` and `data:`
//!   links are skipped, as are fragment-only anchors
//! - a well-formed `<base href>` resolves relative links instead of the
//!   page URI
//! - named-anchor fragments are stripped before comparison
//! - links are deduplicated within a single page's extraction
//! - invalid URIs are silently dropped

use crate::page::CrawledPage;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Capability boundary for extracting links from fetched content
pub trait LinkExtractor: Send + Sync {
    /// Returns the absolute link URIs found on the page
    fn extract_links(&self, page: &CrawledPage) -> Vec<Url>;
}

/// Default HTML anchor extractor backed by scraper
#[derive(Debug, Default)]
pub struct HtmlLinkExtractor;

impl HtmlLinkExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl LinkExtractor for HtmlLinkExtractor {
    fn extract_links(&self, page: &CrawledPage) -> Vec<Url> {
        if !page.has_content() {
            return Vec::new();
        }

        let document = Html::parse_document(&page.raw_content);
        let base_url = resolve_base_url(&document, &page.page.uri);

        let mut links = Vec::new();
        let mut seen = HashSet::new();

        if let Ok(anchor_selector) = Selector::parse("a[href]") {
            for element in document.select(&anchor_selector) {
                let Some(href) = element.value().attr("href") else {
                    continue;
                };

                if let Some(resolved) = resolve_link(href, &base_url) {
                    if seen.insert(resolved.as_str().to_string()) {
                        links.push(resolved);
                    }
                }
            }
        }

        tracing::debug!("Extracted {} links from {}", links.len(), page.page.uri);
        links
    }
}

/// Picks the base URL for resolving relative links
///
/// A well-formed absolute `<base href>` wins; otherwise the page URI is
/// used. A malformed base tag is ignored.
fn resolve_base_url(document: &Html, page_uri: &Url) -> Url {
    let Ok(base_selector) = Selector::parse("base[href]") else {
        return page_uri.clone();
    };

    document
        .select(&base_selector)
        .next()
        .and_then(|element| element.value().attr("href"))
        .and_then(|href| page_uri.join(href.trim()).ok())
        .unwrap_or_else(|| page_uri.clone())
}

/// Resolves an anchor href to an absolute http(s) URL
///
/// Returns None for hrefs that should be excluded: empty, fragment-only,
/// special schemes, non-http(s) results, and unparseable values. The
/// fragment is stripped from every resolved link.
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    let mut resolved = base_url.join(href).ok()?;

    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return None;
    }

    resolved.set_fragment(None);
    Some(resolved)
}
