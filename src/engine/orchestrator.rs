//! Crawl orchestration
//!
//! [`CrawlEngine::crawl`] drives the whole crawl: it seeds the frontier
//! with the root page, then loops pulling pages and dispatching the
//! per-page pipeline onto the worker pool. Pool saturation stalls the
//! dispatch loop itself, which is how global concurrency is capped.
//!
//! The per-page pipeline: decide, claim the URI, fire starting events,
//! rate-limit, fetch (with the body-download gate wired in), fire completed
//! events, decide on links, extract, and re-feed the frontier.
//!
//! The crawl completes when the frontier is empty and no workers are
//! running, or drains early on a cooperative stop request or timeout. Any
//! failure of the dispatch loop itself is captured into the returned
//! [`CrawlResult`] rather than propagated.

use crate::config::{validate, Config};
use crate::engine::decision::DecisionEngine;
use crate::engine::events::{
    EventRegistry, PageCrawlCompletedArgs, PageCrawlDisallowedArgs, PageCrawlStartingArgs,
    PageLinksCrawlDisallowedArgs,
};
use crate::engine::frontier::Frontier;
use crate::engine::rate_limiter::RateLimiter;
use crate::engine::worker_pool::WorkerPool;
use crate::engine::CrawlDecision;
use crate::extract::{HtmlLinkExtractor, LinkExtractor};
use crate::fetch::{HttpPageFetcher, PageFetcher};
use crate::page::{CrawledPage, PageToCrawl};
use crate::robots::{HttpRobotsPolicy, PolitenessGuard, RobotsPolicy};
use crate::state::CrawlContext;
use crate::url::authority_of;
use crate::Result;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Outcome of a full crawl
///
/// A crawl always produces a result, even when it failed internally; the
/// terminal context stays attached so callers can inspect final counters
/// and stop flags.
#[derive(Clone)]
pub struct CrawlResult {
    /// The URI the crawl was seeded with
    pub root_uri: Url,

    /// Wall-clock duration of the crawl
    pub elapsed: Duration,

    /// True when the crawl terminated on an internal failure
    pub error_occurred: bool,

    /// Description of the failure, when one occurred
    pub error_message: Option<String>,

    /// Pages left un-dispatched in the frontier at crawl end
    ///
    /// Zero on normal completion; a stop request or timeout drain leaves
    /// the remainder here for inspection.
    pub residual_frontier_count: usize,

    /// The terminal crawl context
    pub context: Arc<CrawlContext>,
}

/// Everything the per-page pipeline needs, shared across workers
struct CrawlShared {
    context: Arc<CrawlContext>,
    frontier: Frontier,
    pool: WorkerPool,
    rate_limiter: Option<RateLimiter>,
    politeness: Option<PolitenessGuard>,
    decisions: DecisionEngine,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn LinkExtractor>,
    events: Arc<EventRegistry>,
}

/// The crawl orchestrator
///
/// Construct one per crawl target, wire up subscribers and overrides, then
/// await [`Self::crawl`]. The `&mut` receiver on `crawl` makes concurrent
/// re-entry on one engine unrepresentable; sequential reuse is fine.
pub struct CrawlEngine {
    config: Config,
    decisions: DecisionEngine,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn LinkExtractor>,
    robots_policy: Arc<dyn RobotsPolicy>,
    events: Arc<EventRegistry>,
}

impl CrawlEngine {
    /// Creates an engine with default collaborators
    ///
    /// # Errors
    ///
    /// Fails when the configuration is invalid or the HTTP clients cannot
    /// be built.
    pub fn new(config: Config) -> Result<Self> {
        validate(&config)?;

        let fetcher = Arc::new(HttpPageFetcher::new(&config)?);
        let robots_policy = Arc::new(HttpRobotsPolicy::new(&config)?);

        Ok(Self {
            config,
            decisions: DecisionEngine::new(),
            fetcher,
            extractor: Arc::new(HtmlLinkExtractor::new()),
            robots_policy,
            events: Arc::new(EventRegistry::new()),
        })
    }

    /// The lifecycle event registry, for subscribing before a crawl
    pub fn events(&self) -> &EventRegistry {
        &self.events
    }

    /// Replaces the page fetcher
    pub fn set_page_fetcher(&mut self, fetcher: Arc<dyn PageFetcher>) {
        self.fetcher = fetcher;
    }

    /// Replaces the link extractor
    pub fn set_link_extractor(&mut self, extractor: Arc<dyn LinkExtractor>) {
        self.extractor = extractor;
    }

    /// Replaces the robots.txt policy
    pub fn set_robots_policy(&mut self, policy: Arc<dyn RobotsPolicy>) {
        self.robots_policy = policy;
    }

    /// Registers a caller override for the page-crawl decision
    pub fn set_should_crawl_page(
        &mut self,
        delegate: impl Fn(&PageToCrawl, &CrawlContext) -> CrawlDecision + Send + Sync + 'static,
    ) {
        self.decisions.set_should_crawl_page(delegate);
    }

    /// Registers a caller override for the follow-links decision
    pub fn set_should_crawl_page_links(
        &mut self,
        delegate: impl Fn(&CrawledPage, &CrawlContext) -> CrawlDecision + Send + Sync + 'static,
    ) {
        self.decisions.set_should_crawl_page_links(delegate);
    }

    /// Registers a caller override for the body-download decision
    pub fn set_should_download_page_content(
        &mut self,
        delegate: impl Fn(&CrawledPage, &CrawlContext) -> CrawlDecision + Send + Sync + 'static,
    ) {
        self.decisions.set_should_download_page_content(delegate);
    }

    /// Crawls breadth-first from `root_uri` until done
    ///
    /// Always returns a [`CrawlResult`]; internal failures are captured on
    /// it rather than propagated.
    pub async fn crawl(&mut self, root_uri: Url) -> CrawlResult {
        let started = Instant::now();
        tracing::info!("Starting crawl of {}", root_uri);

        let context = Arc::new(CrawlContext::new(root_uri.clone(), self.config.clone()));

        let shared = match self.build_shared(Arc::clone(&context)) {
            Ok(shared) => shared,
            Err(e) => {
                tracing::error!("Failed to initialize crawl: {}", e);
                return CrawlResult {
                    root_uri,
                    elapsed: started.elapsed(),
                    error_occurred: true,
                    error_message: Some(e.to_string()),
                    residual_frontier_count: 0,
                    context,
                };
            }
        };

        shared.frontier.add(PageToCrawl::root(root_uri.clone()));

        let outcome = AssertUnwindSafe(dispatch_loop(Arc::clone(&shared)))
            .catch_unwind()
            .await;
        shared.pool.abort_all();

        let (error_occurred, error_message) = match outcome {
            Ok(Ok(())) => (false, None),
            Ok(Err(e)) => {
                tracing::error!("Crawl of {} failed: {}", root_uri, e);
                (true, Some(e.to_string()))
            }
            Err(payload) => {
                let message = panic_message(payload);
                tracing::error!("Crawl of {} panicked: {}", root_uri, message);
                (true, Some(message))
            }
        };

        let elapsed = started.elapsed();
        tracing::info!(
            "Crawl of {} finished: {} pages in {:?}",
            root_uri,
            context.crawled_count(),
            elapsed
        );

        CrawlResult {
            root_uri,
            elapsed,
            error_occurred,
            error_message,
            residual_frontier_count: shared.frontier.count(),
            context,
        }
    }

    fn build_shared(&self, context: Arc<CrawlContext>) -> Result<Arc<CrawlShared>> {
        let cfg = &self.config.crawler;

        let pool = WorkerPool::new(cfg.max_concurrent_workers as usize)?;

        let rate_limiter = if cfg.min_crawl_delay_per_domain_ms >= 1 {
            Some(RateLimiter::new(cfg.min_crawl_delay_per_domain_ms)?)
        } else {
            None
        };

        let politeness = if self.config.robots.respect_robots_txt {
            Some(PolitenessGuard::new(
                Arc::clone(&self.robots_policy),
                &self.config,
            ))
        } else {
            None
        };

        Ok(Arc::new(CrawlShared {
            context,
            frontier: Frontier::new(cfg.is_recrawling_enabled),
            pool,
            rate_limiter,
            politeness,
            decisions: self.decisions.clone(),
            fetcher: Arc::clone(&self.fetcher),
            extractor: Arc::clone(&self.extractor),
            events: Arc::clone(&self.events),
        }))
    }
}

/// The dispatch loop: pull from the frontier, hand off to the pool
///
/// Completion requires the frontier to be empty AND no workers running;
/// the worker check comes first so a worker cannot slip new links into the
/// frontier between the two reads. On a cooperative stop the loop drains
/// in-flight work without dispatching, leaving the frontier as-is.
async fn dispatch_loop(shared: Arc<CrawlShared>) -> Result<()> {
    let poll = Duration::from_millis(shared.context.config.crawler.frontier_poll_delay_ms);

    loop {
        if shared.context.is_stop_requested() {
            if !shared.pool.has_running_workers() {
                tracing::info!(
                    "Stop requested; crawl drained with {} pages still queued",
                    shared.frontier.count()
                );
                return Ok(());
            }
            tokio::time::sleep(poll).await;
            continue;
        }

        match shared.frontier.get_next() {
            Some(page) => {
                let worker_shared = Arc::clone(&shared);
                shared
                    .pool
                    .do_work(async move {
                        crawl_page(worker_shared, page).await;
                    })
                    .await;
            }
            None => {
                if !shared.pool.has_running_workers() && shared.frontier.count() == 0 {
                    return Ok(());
                }
                tokio::time::sleep(poll).await;
            }
        }
    }
}

/// The per-page pipeline, run on a worker slot
async fn crawl_page(shared: Arc<CrawlShared>, page: PageToCrawl) {
    let context = &shared.context;

    // Stage 1: decision pipeline (built-in + override, then politeness)
    let mut decision = shared.decisions.should_crawl_page(&page, context);
    if decision.allow {
        if let Some(guard) = &shared.politeness {
            decision = guard.enforce(&page, shared.rate_limiter.as_ref()).await;
        }
    }

    if !decision.allow {
        tracing::debug!("Disallowed {}: {}", page.uri, decision.reason);
        shared
            .events
            .fire_page_crawl_disallowed(PageCrawlDisallowedArgs {
                page,
                reason: decision.reason,
                context: Arc::clone(context),
            });
        return;
    }

    // Stage 2: claim the URI; exactly one worker wins a concurrent race,
    // and the claim itself re-enforces the total-page cap
    if !context.try_claim(page.uri.as_str()) {
        tracing::debug!("Lost claim race for {}, skipping", page.uri);
        return;
    }
    if let Some(authority) = authority_of(&page.uri) {
        context.increment_domain_count(&authority);
    }

    // Stage 3: starting events, then the politeness delay, then the fetch
    shared
        .events
        .fire_page_crawl_starting(PageCrawlStartingArgs {
            page: page.clone(),
            context: Arc::clone(context),
        });

    if let Some(limiter) = &shared.rate_limiter {
        limiter.rate_limit(&page.uri).await;
    }

    let gate_context = Arc::clone(context);
    let gate_decisions = shared.decisions.clone();
    let gate = move |candidate: &CrawledPage| {
        gate_decisions.should_download_page_content(candidate, &gate_context)
    };
    let crawled = shared.fetcher.fetch(&page, &gate).await;

    shared
        .events
        .fire_page_crawl_completed(PageCrawlCompletedArgs {
            page: crawled.clone(),
            context: Arc::clone(context),
        });

    // Stage 4: follow links back into the frontier
    let links_decision = shared.decisions.should_crawl_page_links(&crawled, context);
    if !links_decision.allow {
        tracing::debug!(
            "Not following links on {}: {}",
            crawled.page.uri,
            links_decision.reason
        );
        shared
            .events
            .fire_page_links_crawl_disallowed(PageLinksCrawlDisallowedArgs {
                page: crawled,
                reason: links_decision.reason,
                context: Arc::clone(context),
            });
        return;
    }

    for link in shared.extractor.extract_links(&crawled) {
        let child = PageToCrawl::discovered(link, &crawled.page, &context.root_uri);
        shared.frontier.add(child);
    }
}

/// Extracts a readable message from a caught panic payload
fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "crawl dispatch loop panicked".to_string()
    }
}
