//! Page data model
//!
//! A [`PageToCrawl`] is a discovered-but-not-yet-fetched page sitting in the
//! frontier. Fetching promotes it into a [`CrawledPage`], which carries the
//! fetch outcome alongside the original identity. Both are immutable once
//! constructed; workers consume each page exactly once.

use crate::url::is_internal_to;
use std::collections::HashMap;
use url::Url;

/// A page queued for crawling
#[derive(Debug, Clone)]
pub struct PageToCrawl {
    /// The absolute URI of the page
    pub uri: Url,

    /// The URI of the page that linked to this one (None for the root)
    pub parent_uri: Option<Url>,

    /// Whether this page shares its authority with the crawl root
    pub is_internal: bool,

    /// Whether this page is the crawl seed
    pub is_root: bool,

    /// Whether this page is being re-attempted after a failure
    pub is_retry: bool,

    /// Number of link hops from the crawl root
    pub crawl_depth: u32,
}

impl PageToCrawl {
    /// Creates the root page for a crawl seed
    pub fn root(uri: Url) -> Self {
        Self {
            uri,
            parent_uri: None,
            is_internal: true,
            is_root: true,
            is_retry: false,
            crawl_depth: 0,
        }
    }

    /// Creates a page discovered as a link on `parent`
    ///
    /// The internal flag is derived by comparing the link's authority against
    /// the crawl root; depth is the parent's depth plus one.
    pub fn discovered(uri: Url, parent: &PageToCrawl, root_uri: &Url) -> Self {
        Self {
            is_internal: is_internal_to(&uri, root_uri),
            parent_uri: Some(parent.uri.clone()),
            is_root: false,
            is_retry: false,
            crawl_depth: parent.crawl_depth + 1,
            uri,
        }
    }
}

/// The response metadata captured during a fetch
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    /// HTTP status code
    pub status_code: u16,

    /// Content-Type header value (empty if absent)
    pub content_type: String,

    /// Final URI after redirects
    pub final_uri: Url,

    /// Response headers
    pub headers: HashMap<String, String>,
}

/// A page that has been through the fetch pipeline
///
/// `raw_content` defaults to the empty string rather than an optional so
/// downstream content checks stay plain string checks.
#[derive(Debug, Clone)]
pub struct CrawledPage {
    /// The original frontier entry
    pub page: PageToCrawl,

    /// Raw body content (empty when the body was not downloaded)
    pub raw_content: String,

    /// Response metadata (None when the request never produced a response)
    pub response: Option<FetchedResponse>,

    /// Transport-level failure description, if the fetch failed
    pub transport_error: Option<String>,

    /// Size of the downloaded body in bytes
    pub content_size_bytes: u64,
}

impl CrawledPage {
    /// Promotes a frontier entry with no response (transport failure path)
    pub fn failed(page: PageToCrawl, error: String) -> Self {
        Self {
            page,
            raw_content: String::new(),
            response: None,
            transport_error: Some(error),
            content_size_bytes: 0,
        }
    }

    /// Promotes a frontier entry with response metadata and no body yet
    pub fn with_response(page: PageToCrawl, response: FetchedResponse) -> Self {
        Self {
            page,
            raw_content: String::new(),
            response: Some(response),
            transport_error: None,
            content_size_bytes: 0,
        }
    }

    /// Returns true if the body contains any non-whitespace content
    pub fn has_content(&self) -> bool {
        !self.raw_content.trim().is_empty()
    }
}
