//! Crawl-scoped shared state

mod context;

pub use context::CrawlContext;
