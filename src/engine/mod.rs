//! The crawl engine
//!
//! This module contains the core crawl machinery:
//! - the frontier queue of pages awaiting crawl
//! - per-domain rate limiting
//! - the crawl decision pipeline with caller overrides
//! - the bounded worker pool
//! - lifecycle events
//! - the orchestrator that ties them together

mod decision;
mod events;
mod frontier;
mod orchestrator;
mod rate_limiter;
mod worker_pool;

pub use decision::{
    CrawlDecision, CrawledPageDecisionDelegate, DecisionEngine, PageDecisionDelegate,
};
pub use events::{
    EventRegistry, PageCrawlCompletedArgs, PageCrawlDisallowedArgs, PageCrawlStartingArgs,
    PageLinksCrawlDisallowedArgs,
};
pub use frontier::Frontier;
pub use orchestrator::{CrawlEngine, CrawlResult};
pub use rate_limiter::RateLimiter;
pub use worker_pool::WorkerPool;
