use serde::Deserialize;
use std::collections::HashMap;

/// Resolved configuration for a crawl
///
/// Immutable for the duration of a run. The engine consumes this value as
/// opaque input; how it is produced (TOML file, CLI flags, hand-built in
/// tests) is an adapter concern.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,

    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,

    #[serde(default)]
    pub robots: RobotsConfig,

    /// Open extension map for caller-defined settings
    #[serde(default)]
    pub extensions: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            user_agent: UserAgentConfig::default(),
            robots: RobotsConfig::default(),
            extensions: HashMap::new(),
        }
    }
}

impl Config {
    /// Formats the identification string sent as the User-Agent header
    ///
    /// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn user_agent_string(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.user_agent.crawler_name,
            self.user_agent.crawler_version,
            self.user_agent.contact_url,
            self.user_agent.contact_email
        )
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of concurrent crawl workers (1-100)
    #[serde(rename = "max-concurrent-workers", default = "default_workers")]
    pub max_concurrent_workers: u32,

    /// Maximum total pages to crawl (0 = unlimited)
    #[serde(rename = "max-pages-to-crawl", default = "default_max_pages")]
    pub max_pages_to_crawl: u64,

    /// Maximum pages to crawl per domain (0 = unlimited)
    #[serde(rename = "max-pages-per-domain", default)]
    pub max_pages_per_domain: u64,

    /// Maximum link depth from the crawl root (0 = unlimited)
    #[serde(rename = "max-crawl-depth", default = "default_max_depth")]
    pub max_crawl_depth: u32,

    /// Overall crawl timeout in seconds (0 = no timeout)
    #[serde(rename = "crawl-timeout-secs", default)]
    pub crawl_timeout_secs: u64,

    /// Minimum delay between requests to the same domain (milliseconds)
    #[serde(rename = "min-crawl-delay-per-domain-ms", default = "default_min_delay")]
    pub min_crawl_delay_per_domain_ms: u64,

    /// Whether a URI may be crawled more than once
    #[serde(rename = "is-recrawling-enabled", default)]
    pub is_recrawling_enabled: bool,

    /// Whether pages on foreign authorities may be crawled
    #[serde(rename = "is-external-page-crawling-enabled", default)]
    pub is_external_page_crawling_enabled: bool,

    /// Whether links found on foreign-authority pages may be followed
    #[serde(rename = "is-external-page-links-crawling-enabled", default)]
    pub is_external_page_links_crawling_enabled: bool,

    /// Comma-separated Content-Type tokens whose bodies may be downloaded
    #[serde(rename = "downloadable-content-types", default = "default_content_types")]
    pub downloadable_content_types: String,

    /// Per-request HTTP timeout in seconds
    #[serde(rename = "http-request-timeout-secs", default = "default_http_timeout")]
    pub http_request_timeout_secs: u64,

    /// Dispatch-loop sleep while waiting on in-flight workers (milliseconds)
    #[serde(rename = "frontier-poll-delay-ms", default = "default_poll_delay")]
    pub frontier_poll_delay_ms: u64,
}

fn default_workers() -> u32 {
    10
}

fn default_max_pages() -> u64 {
    1000
}

fn default_max_depth() -> u32 {
    100
}

fn default_min_delay() -> u64 {
    1000
}

fn default_content_types() -> String {
    "text/html".to_string()
}

fn default_http_timeout() -> u64 {
    30
}

fn default_poll_delay() -> u64 {
    1000
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_workers: default_workers(),
            max_pages_to_crawl: default_max_pages(),
            max_pages_per_domain: 0,
            max_crawl_depth: default_max_depth(),
            crawl_timeout_secs: 0,
            min_crawl_delay_per_domain_ms: default_min_delay(),
            is_recrawling_enabled: false,
            is_external_page_crawling_enabled: false,
            is_external_page_links_crawling_enabled: false,
            downloadable_content_types: default_content_types(),
            http_request_timeout_secs: default_http_timeout(),
            frontier_poll_delay_ms: default_poll_delay(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name", default = "default_crawler_name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version", default = "default_crawler_version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url", default = "default_contact_url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email", default = "default_contact_email")]
    pub contact_email: String,
}

fn default_crawler_name() -> String {
    "Kumo".to_string()
}

fn default_crawler_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_contact_url() -> String {
    "https://example.com/kumo".to_string()
}

fn default_contact_email() -> String {
    "crawler@example.com".to_string()
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: default_crawler_name(),
            crawler_version: default_crawler_version(),
            contact_url: default_contact_url(),
            contact_email: default_contact_email(),
        }
    }
}

/// Robots.txt handling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RobotsConfig {
    /// Whether robots.txt directives are honored
    #[serde(rename = "respect-robots-txt", default = "default_respect")]
    pub respect_robots_txt: bool,

    /// User agent token matched against robots.txt groups
    ///
    /// Empty means the crawler name from the user-agent section is used.
    #[serde(rename = "user-agent", default)]
    pub user_agent: String,

    /// Upper bound applied to a robots.txt Crawl-delay directive (seconds)
    #[serde(rename = "max-crawl-delay-secs", default = "default_max_robots_delay")]
    pub max_crawl_delay_secs: u64,
}

fn default_respect() -> bool {
    true
}

fn default_max_robots_delay() -> u64 {
    30
}

impl Default for RobotsConfig {
    fn default() -> Self {
        Self {
            respect_robots_txt: default_respect(),
            user_agent: String::new(),
            max_crawl_delay_secs: default_max_robots_delay(),
        }
    }
}

impl RobotsConfig {
    /// The user agent token to match in robots.txt, falling back to `name`
    pub fn effective_user_agent(&self, name: &str) -> String {
        if self.user_agent.is_empty() {
            name.to_string()
        } else {
            self.user_agent.clone()
        }
    }
}
