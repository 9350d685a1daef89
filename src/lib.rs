//! Kumo: a polite, embeddable web crawler engine
//!
//! This crate implements a breadth-first web crawler that discovers pages from
//! a seed URI, extracts hyperlinks, and decides via pluggable policy which
//! pages and links to pursue, while respecting per-domain rate limits and
//! robots.txt directives.
//!
//! The engine is used as a library: callers subscribe to lifecycle events,
//! optionally layer their own decision delegates over the built-in policy,
//! and await [`engine::CrawlEngine::crawl`]. Work fans out internally over a
//! bounded worker pool; a single page failure never aborts the crawl.

pub mod config;
pub mod engine;
pub mod extract;
pub mod fetch;
pub mod page;
pub mod robots;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Kumo operations
#[derive(Debug, Error)]
pub enum KumoError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Crawl engine failure: {0}")]
    Engine(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Kumo operations
pub type Result<T> = std::result::Result<T, KumoError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use engine::{CrawlDecision, CrawlEngine, CrawlResult};
pub use page::{CrawledPage, FetchedResponse, PageToCrawl};
pub use state::CrawlContext;
