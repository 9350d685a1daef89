//! URL handling helpers
//!
//! This module provides the small amount of URL logic the engine needs:
//! authority extraction (used as the rate-limiting and counting key) and
//! internal/external classification against the crawl root.

use url::Url;

/// Extracts the authority (host plus explicit port) from a URL
///
/// The authority is the key used for per-domain rate limiting, per-domain
/// page counters, and internal/external classification.
///
/// # Examples
///
/// ```
/// use kumo::url::authority_of;
/// use url::Url;
///
/// let url = Url::parse("https://example.com:8080/page").unwrap();
/// assert_eq!(authority_of(&url), Some("example.com:8080".to_string()));
/// ```
pub fn authority_of(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    match url.port() {
        Some(port) => Some(format!("{}:{}", host.to_lowercase(), port)),
        None => Some(host.to_lowercase()),
    }
}

/// Returns true if the URL uses an http or https scheme
pub fn is_http_scheme(url: &Url) -> bool {
    let scheme = url.scheme();
    scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")
}

/// Returns true if `url` shares its authority with `root`
///
/// A page is "internal" when its authority matches the crawl root's
/// authority; everything else is external. Comparison is case-insensitive
/// and port-sensitive.
pub fn is_internal_to(url: &Url, root: &Url) -> bool {
    match (authority_of(url), authority_of(root)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
