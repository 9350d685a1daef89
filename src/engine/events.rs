//! Crawl lifecycle events
//!
//! The engine fires four events: page-crawl-starting, page-crawl-completed,
//! page-crawl-disallowed and page-links-crawl-disallowed. Each has two
//! subscriber lists:
//!
//! - **sync** subscribers run inline on the worker that fired the event, in
//!   registration order, each in its own protected scope. They give callers
//!   a synchronous checkpoint per page; a slow handler blocks that worker.
//! - **async** subscribers are spawned as independent tasks and never
//!   awaited (fire-and-forget), for non-blocking side work.
//!
//! A panicking subscriber is caught and logged; it cannot take down sibling
//! subscribers or the crawl.

use crate::page::{CrawledPage, PageToCrawl};
use crate::state::CrawlContext;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// Payload for the page-crawl-starting event
#[derive(Clone)]
pub struct PageCrawlStartingArgs {
    pub page: PageToCrawl,
    pub context: Arc<CrawlContext>,
}

/// Payload for the page-crawl-completed event
#[derive(Clone)]
pub struct PageCrawlCompletedArgs {
    pub page: CrawledPage,
    pub context: Arc<CrawlContext>,
}

/// Payload for the page-crawl-disallowed event
#[derive(Clone)]
pub struct PageCrawlDisallowedArgs {
    pub page: PageToCrawl,
    pub reason: String,
    pub context: Arc<CrawlContext>,
}

/// Payload for the page-links-crawl-disallowed event
#[derive(Clone)]
pub struct PageLinksCrawlDisallowedArgs {
    pub page: CrawledPage,
    pub reason: String,
    pub context: Arc<CrawlContext>,
}

type SyncHandler<A> = Arc<dyn Fn(&A) + Send + Sync>;
type AsyncHandler<A> =
    Arc<dyn Fn(Arc<A>) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Subscriber lists for one event
struct EventHandlers<A> {
    sync_handlers: Mutex<Vec<SyncHandler<A>>>,
    async_handlers: Mutex<Vec<AsyncHandler<A>>>,
}

impl<A> Default for EventHandlers<A> {
    fn default() -> Self {
        Self {
            sync_handlers: Mutex::new(Vec::new()),
            async_handlers: Mutex::new(Vec::new()),
        }
    }
}

impl<A: Send + Sync + 'static> EventHandlers<A> {
    fn subscribe_sync(&self, handler: impl Fn(&A) + Send + Sync + 'static) {
        self.sync_handlers.lock().unwrap().push(Arc::new(handler));
    }

    fn subscribe_async<F, Fut>(&self, handler: F)
    where
        F: Fn(Arc<A>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.async_handlers.lock().unwrap().push(Arc::new(move |args| {
            Box::pin(handler(args)) as Pin<Box<dyn Future<Output = ()> + Send>>
        }));
    }

    /// Fires the event to every subscriber
    ///
    /// Handler lists are snapshotted before invocation so a handler that
    /// subscribes new handlers cannot deadlock the firing worker.
    fn fire(&self, args: A, event_name: &str) {
        let sync_handlers = self.sync_handlers.lock().unwrap().clone();
        let async_handlers = self.async_handlers.lock().unwrap().clone();
        let args = Arc::new(args);

        for handler in sync_handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(&args))).is_err() {
                tracing::error!("Synchronous {} subscriber panicked", event_name);
            }
        }

        for handler in async_handlers {
            // Fire-and-forget; a panic is contained by the spawned task
            tokio::spawn(handler(Arc::clone(&args)));
        }
    }
}

/// Registry of all lifecycle event subscribers
///
/// Registration uses interior mutability so callers can subscribe through a
/// shared engine reference before starting the crawl.
#[derive(Default)]
pub struct EventRegistry {
    page_crawl_starting: EventHandlers<PageCrawlStartingArgs>,
    page_crawl_completed: EventHandlers<PageCrawlCompletedArgs>,
    page_crawl_disallowed: EventHandlers<PageCrawlDisallowedArgs>,
    page_links_crawl_disallowed: EventHandlers<PageLinksCrawlDisallowedArgs>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_page_crawl_starting(
        &self,
        handler: impl Fn(&PageCrawlStartingArgs) + Send + Sync + 'static,
    ) {
        self.page_crawl_starting.subscribe_sync(handler);
    }

    pub fn on_page_crawl_starting_async<F, Fut>(&self, handler: F)
    where
        F: Fn(Arc<PageCrawlStartingArgs>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.page_crawl_starting.subscribe_async(handler);
    }

    pub fn on_page_crawl_completed(
        &self,
        handler: impl Fn(&PageCrawlCompletedArgs) + Send + Sync + 'static,
    ) {
        self.page_crawl_completed.subscribe_sync(handler);
    }

    pub fn on_page_crawl_completed_async<F, Fut>(&self, handler: F)
    where
        F: Fn(Arc<PageCrawlCompletedArgs>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.page_crawl_completed.subscribe_async(handler);
    }

    pub fn on_page_crawl_disallowed(
        &self,
        handler: impl Fn(&PageCrawlDisallowedArgs) + Send + Sync + 'static,
    ) {
        self.page_crawl_disallowed.subscribe_sync(handler);
    }

    pub fn on_page_crawl_disallowed_async<F, Fut>(&self, handler: F)
    where
        F: Fn(Arc<PageCrawlDisallowedArgs>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.page_crawl_disallowed.subscribe_async(handler);
    }

    pub fn on_page_links_crawl_disallowed(
        &self,
        handler: impl Fn(&PageLinksCrawlDisallowedArgs) + Send + Sync + 'static,
    ) {
        self.page_links_crawl_disallowed.subscribe_sync(handler);
    }

    pub fn on_page_links_crawl_disallowed_async<F, Fut>(&self, handler: F)
    where
        F: Fn(Arc<PageLinksCrawlDisallowedArgs>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.page_links_crawl_disallowed.subscribe_async(handler);
    }

    pub(crate) fn fire_page_crawl_starting(&self, args: PageCrawlStartingArgs) {
        self.page_crawl_starting.fire(args, "page-crawl-starting");
    }

    pub(crate) fn fire_page_crawl_completed(&self, args: PageCrawlCompletedArgs) {
        self.page_crawl_completed.fire(args, "page-crawl-completed");
    }

    pub(crate) fn fire_page_crawl_disallowed(&self, args: PageCrawlDisallowedArgs) {
        self.page_crawl_disallowed.fire(args, "page-crawl-disallowed");
    }

    pub(crate) fn fire_page_links_crawl_disallowed(&self, args: PageLinksCrawlDisallowedArgs) {
        self.page_links_crawl_disallowed
            .fire(args, "page-links-crawl-disallowed");
    }
}
