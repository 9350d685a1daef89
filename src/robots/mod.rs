//! Robots.txt handling
//!
//! The engine consumes robots.txt through the [`RobotsPolicy`] capability:
//! given a URI, return the host's parsed rules (or None when the host has
//! no robots.txt). [`HttpRobotsPolicy`] is the default reqwest-backed
//! implementation.
//!
//! Politeness is composed around the crawl pipeline as middleware rather
//! than baked into it: when enabled, a [`PolitenessGuard`] runs after the
//! regular crawl decision and can veto a page (robots disallow) or stretch
//! a domain's rate-limit delay (robots Crawl-delay, capped by config).

mod cache;
mod parser;

pub use cache::{CachedRules, RobotsCache};
pub use parser::RobotsRules;

use crate::config::Config;
use crate::engine::{CrawlDecision, RateLimiter};
use crate::page::PageToCrawl;
use crate::url::authority_of;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Capability boundary for retrieving robots.txt rules
#[async_trait]
pub trait RobotsPolicy: Send + Sync {
    /// Fetches and parses robots.txt for the host of `uri`
    ///
    /// Returns None when the host has no robots.txt or it cannot be
    /// retrieved; the caller treats that as permit-all.
    async fn find(&self, uri: &Url) -> Option<RobotsRules>;
}

/// Default robots.txt retriever backed by reqwest
pub struct HttpRobotsPolicy {
    client: Client,
}

impl HttpRobotsPolicy {
    /// Builds a policy with a client configured from `config`
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(config.user_agent_string())
            .timeout(Duration::from_secs(config.crawler.http_request_timeout_secs))
            .build()?;

        Ok(Self { client })
    }

    /// Wraps an existing client (used by tests and embedders)
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RobotsPolicy for HttpRobotsPolicy {
    async fn find(&self, uri: &Url) -> Option<RobotsRules> {
        let mut robots_url = uri.clone();
        robots_url.set_path("/robots.txt");
        robots_url.set_query(None);
        robots_url.set_fragment(None);

        match self.client.get(robots_url.clone()).send().await {
            Ok(response) if response.status().is_success() => {
                let content = response.text().await.ok()?;
                tracing::debug!("Fetched robots.txt from {}", robots_url);
                Some(RobotsRules::from_content(&content))
            }
            Ok(response) => {
                tracing::debug!(
                    "No robots.txt at {} (status {})",
                    robots_url,
                    response.status()
                );
                None
            }
            Err(e) => {
                tracing::debug!("Failed to fetch robots.txt from {}: {}", robots_url, e);
                None
            }
        }
    }
}

/// Politeness middleware composed around the crawl decision pipeline
pub struct PolitenessGuard {
    policy: Arc<dyn RobotsPolicy>,
    cache: RobotsCache,
    user_agent: String,
    min_delay: Duration,
    max_crawl_delay: Duration,
}

impl PolitenessGuard {
    /// Builds a guard from the run configuration
    pub fn new(policy: Arc<dyn RobotsPolicy>, config: &Config) -> Self {
        Self {
            policy,
            cache: RobotsCache::new(),
            user_agent: config
                .robots
                .effective_user_agent(&config.user_agent.crawler_name),
            min_delay: Duration::from_millis(config.crawler.min_crawl_delay_per_domain_ms),
            max_crawl_delay: Duration::from_secs(config.robots.max_crawl_delay_secs),
        }
    }

    /// Applies robots.txt rules to a page about to be crawled
    ///
    /// Rules are fetched once per authority and cached. A robots disallow
    /// vetoes the page; a Crawl-delay longer than the configured minimum
    /// stretches the domain's delay on the rate limiter, capped at the
    /// configured maximum.
    pub async fn enforce(
        &self,
        page: &PageToCrawl,
        limiter: Option<&RateLimiter>,
    ) -> CrawlDecision {
        let Some(authority) = authority_of(&page.uri) else {
            return CrawlDecision::allowed();
        };

        let rules = match self.cache.get(&authority) {
            Some(rules) => rules,
            None => {
                let rules = self
                    .policy
                    .find(&page.uri)
                    .await
                    .unwrap_or_else(RobotsRules::permit_all);
                self.cache.insert(&authority, rules.clone());
                rules
            }
        };

        if !rules.is_url_allowed(page.uri.as_str(), &self.user_agent) {
            return CrawlDecision::disallowed("Page is disallowed by robots.txt");
        }

        if let Some(delay_secs) = rules.get_crawl_delay(&self.user_agent) {
            let delay =
                Duration::from_secs_f64(delay_secs.max(0.0)).min(self.max_crawl_delay);
            if delay > self.min_delay {
                if let Some(limiter) = limiter {
                    limiter.add_domain(&page.uri, delay);
                }
            }
        }

        CrawlDecision::allowed()
    }
}
