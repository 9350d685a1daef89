//! Page fetching boundary
//!
//! The engine talks to HTTP through the [`PageFetcher`] capability: given a
//! frontier page and a body-download gate, return a [`CrawledPage`].
//! Ordinary network failures never surface as errors; they are reported on
//! the page's `transport_error` field so a single bad fetch cannot abort
//! the crawl.
//!
//! [`HttpPageFetcher`] is the default reqwest-backed implementation.

use crate::config::Config;
use crate::engine::CrawlDecision;
use crate::page::{CrawledPage, FetchedResponse, PageToCrawl};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

/// Gate consulted before a response body is downloaded
///
/// Receives the page with response metadata populated but `raw_content`
/// still empty; a disallow leaves the body undownloaded.
pub type DownloadGate = dyn Fn(&CrawledPage) -> CrawlDecision + Send + Sync;

/// Capability boundary for fetching pages
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches a page, consulting `should_download` before reading the body
    async fn fetch(&self, page: &PageToCrawl, should_download: &DownloadGate) -> CrawledPage;
}

/// Default HTTP fetcher backed by reqwest
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    /// Builds a fetcher with a client configured from `config`
    ///
    /// The client identifies itself with the configured user-agent string
    /// and applies the configured per-request timeout.
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(config.user_agent_string())
            .timeout(Duration::from_secs(config.crawler.http_request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self { client })
    }

    /// Wraps an existing client (used by tests and embedders)
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, page: &PageToCrawl, should_download: &DownloadGate) -> CrawledPage {
        let response = match self.client.get(page.uri.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                let error = classify_transport_error(&e);
                tracing::warn!("Fetch failed for {}: {}", page.uri, error);
                return CrawledPage::failed(page.clone(), error);
            }
        };

        let status_code = response.status().as_u16();
        let final_uri = response.url().clone();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let mut crawled = CrawledPage::with_response(
            page.clone(),
            FetchedResponse {
                status_code,
                content_type,
                final_uri,
                headers,
            },
        );

        let decision = should_download(&crawled);
        if decision.allow {
            match response.text().await {
                Ok(body) => {
                    crawled.content_size_bytes = body.len() as u64;
                    crawled.raw_content = body;
                }
                Err(e) => {
                    crawled.transport_error = Some(format!("Failed to read body: {}", e));
                }
            }
        } else {
            tracing::debug!(
                "Skipping body download for {}: {}",
                page.uri,
                decision.reason
            );
        }

        crawled
    }
}

/// Maps a reqwest error to a short transport-error description
fn classify_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "Request timeout".to_string()
    } else if error.is_connect() {
        "Connection refused".to_string()
    } else {
        error.to_string()
    }
}
