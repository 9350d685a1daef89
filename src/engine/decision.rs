//! Crawl decision policy
//!
//! Three pure decision functions govern the pipeline: whether to crawl a
//! page, whether to follow a page's links, and whether to download a page's
//! body. Expected business-rule rejections are expressed as a disallowing
//! [`CrawlDecision`] with a reason, never as errors; each function returns
//! on the first disqualifying condition.
//!
//! Callers may layer their own delegate over each built-in decision. The
//! composition is a fixed two-stage pipeline: the built-in check runs first,
//! and only when it allows does the caller's delegate run, with its verdict
//! becoming final. Overrides can restrict further or pass through; they can
//! never resurrect a page the built-in checks rejected.

use crate::page::{CrawledPage, PageToCrawl};
use crate::state::CrawlContext;
use crate::url::{authority_of, is_http_scheme};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// An allow/disallow verdict with a human-readable reason
///
/// The reason is empty exactly when the decision allows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlDecision {
    pub allow: bool,
    pub reason: String,
}

impl CrawlDecision {
    /// An allowing decision
    pub fn allowed() -> Self {
        Self {
            allow: true,
            reason: String::new(),
        }
    }

    /// A disallowing decision carrying its reason
    pub fn disallowed(reason: impl Into<String>) -> Self {
        Self {
            allow: false,
            reason: reason.into(),
        }
    }
}

/// Caller-supplied override for page-level decisions
pub type PageDecisionDelegate =
    Arc<dyn Fn(&PageToCrawl, &CrawlContext) -> CrawlDecision + Send + Sync>;

/// Caller-supplied override for crawled-page-level decisions
pub type CrawledPageDecisionDelegate =
    Arc<dyn Fn(&CrawledPage, &CrawlContext) -> CrawlDecision + Send + Sync>;

/// The built-in decision policy plus optional caller overrides
#[derive(Clone, Default)]
pub struct DecisionEngine {
    should_crawl_page_override: Option<PageDecisionDelegate>,
    should_crawl_page_links_override: Option<CrawledPageDecisionDelegate>,
    should_download_page_content_override: Option<CrawledPageDecisionDelegate>,
}

impl DecisionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an override delegate for [`Self::should_crawl_page`]
    pub fn set_should_crawl_page(
        &mut self,
        delegate: impl Fn(&PageToCrawl, &CrawlContext) -> CrawlDecision + Send + Sync + 'static,
    ) {
        self.should_crawl_page_override = Some(Arc::new(delegate));
    }

    /// Registers an override delegate for [`Self::should_crawl_page_links`]
    pub fn set_should_crawl_page_links(
        &mut self,
        delegate: impl Fn(&CrawledPage, &CrawlContext) -> CrawlDecision + Send + Sync + 'static,
    ) {
        self.should_crawl_page_links_override = Some(Arc::new(delegate));
    }

    /// Registers an override delegate for [`Self::should_download_page_content`]
    pub fn set_should_download_page_content(
        &mut self,
        delegate: impl Fn(&CrawledPage, &CrawlContext) -> CrawlDecision + Send + Sync + 'static,
    ) {
        self.should_download_page_content_override = Some(Arc::new(delegate));
    }

    /// Decides whether a frontier page should be crawled at all
    pub fn should_crawl_page(&self, page: &PageToCrawl, context: &CrawlContext) -> CrawlDecision {
        let builtin = Self::base_should_crawl_page(page, context);
        if !builtin.allow {
            return builtin;
        }

        run_override(
            self.should_crawl_page_override.as_deref(),
            page,
            context,
            builtin,
        )
    }

    fn base_should_crawl_page(page: &PageToCrawl, context: &CrawlContext) -> CrawlDecision {
        let cfg = &context.config.crawler;

        if !is_http_scheme(&page.uri) {
            return CrawlDecision::disallowed("Invalid scheme");
        }

        if !cfg.is_recrawling_enabled && context.is_crawled(page.uri.as_str()) {
            return CrawlDecision::disallowed("Link already crawled");
        }

        if cfg.max_pages_to_crawl > 0
            && context.crawled_count() as u64 + 1 > cfg.max_pages_to_crawl
        {
            return CrawlDecision::disallowed(format!(
                "MaxPagesToCrawl limit of {} has been reached",
                cfg.max_pages_to_crawl
            ));
        }

        if cfg.max_pages_per_domain > 0 {
            if let Some(authority) = authority_of(&page.uri) {
                if context.domain_count(&authority) + 1 > cfg.max_pages_per_domain {
                    return CrawlDecision::disallowed(format!(
                        "MaxPagesToCrawlPerDomain limit of {} has been reached",
                        cfg.max_pages_per_domain
                    ));
                }
            }
        }

        if cfg.max_crawl_depth > 0 && page.crawl_depth > cfg.max_crawl_depth {
            return CrawlDecision::disallowed(format!(
                "MaxCrawlDepth limit of {} has been reached",
                cfg.max_crawl_depth
            ));
        }

        if cfg.crawl_timeout_secs > 0 && context.elapsed().as_secs() > cfg.crawl_timeout_secs {
            return CrawlDecision::disallowed(format!(
                "Crawl timeout of {} seconds has been reached",
                cfg.crawl_timeout_secs
            ));
        }

        if !cfg.is_external_page_crawling_enabled && !page.is_internal {
            return CrawlDecision::disallowed("Link is external");
        }

        CrawlDecision::allowed()
    }

    /// Decides whether the links on a crawled page should be followed
    pub fn should_crawl_page_links(
        &self,
        page: &CrawledPage,
        context: &CrawlContext,
    ) -> CrawlDecision {
        let builtin = Self::base_should_crawl_page_links(page, context);
        if !builtin.allow {
            return builtin;
        }

        run_override(
            self.should_crawl_page_links_override.as_deref(),
            page,
            context,
            builtin,
        )
    }

    fn base_should_crawl_page_links(page: &CrawledPage, context: &CrawlContext) -> CrawlDecision {
        if !page.has_content() {
            return CrawlDecision::disallowed("Page has no content");
        }

        let cfg = &context.config.crawler;
        if !cfg.is_external_page_links_crawling_enabled && !page.page.is_internal {
            return CrawlDecision::disallowed("Link is external");
        }

        CrawlDecision::allowed()
    }

    /// Decides whether a page's body should be downloaded
    ///
    /// Evaluated against the response metadata before the body is read; a
    /// disallow here means the fetcher leaves `raw_content` empty.
    pub fn should_download_page_content(
        &self,
        page: &CrawledPage,
        context: &CrawlContext,
    ) -> CrawlDecision {
        let builtin = Self::base_should_download_page_content(page, context);
        if !builtin.allow {
            return builtin;
        }

        run_override(
            self.should_download_page_content_override.as_deref(),
            page,
            context,
            builtin,
        )
    }

    fn base_should_download_page_content(
        page: &CrawledPage,
        context: &CrawlContext,
    ) -> CrawlDecision {
        let Some(response) = &page.response else {
            return CrawlDecision::disallowed("Null page response");
        };

        if response.status_code != 200 {
            return CrawlDecision::disallowed("HttpStatusCode is not 200");
        }

        let accepted: Vec<&str> = context
            .config
            .crawler
            .downloadable_content_types
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();

        let content_type = response.content_type.to_lowercase();
        let matches = accepted
            .iter()
            .any(|t| content_type.contains(&t.to_lowercase()));

        if !matches {
            return CrawlDecision::disallowed(format!(
                "Content type is not {}",
                accepted.join(", ")
            ));
        }

        CrawlDecision::allowed()
    }
}

/// Runs an optional override delegate over an allowing built-in verdict
///
/// A panicking delegate is caught and logged; the built-in verdict stands.
fn run_override<T: ?Sized>(
    delegate: Option<&(dyn Fn(&T, &CrawlContext) -> CrawlDecision + Send + Sync)>,
    subject: &T,
    context: &CrawlContext,
    builtin: CrawlDecision,
) -> CrawlDecision {
    let Some(delegate) = delegate else {
        return builtin;
    };

    match catch_unwind(AssertUnwindSafe(|| delegate(subject, context))) {
        Ok(decision) => decision,
        Err(_) => {
            tracing::error!("Decision override delegate panicked; keeping built-in verdict");
            builtin
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::page::FetchedResponse;
    use std::collections::HashMap;
    use url::Url;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn context_with(config: Config) -> CrawlContext {
        CrawlContext::new(url("https://example.com/"), config)
    }

    fn context() -> CrawlContext {
        context_with(Config::default())
    }

    fn internal_page(path: &str) -> PageToCrawl {
        let root_uri = url("https://example.com/");
        let root = PageToCrawl::root(root_uri.clone());
        PageToCrawl::discovered(url(&format!("https://example.com{}", path)), &root, &root_uri)
    }

    fn crawled(page: PageToCrawl, status: u16, content_type: &str, body: &str) -> CrawledPage {
        let mut result = CrawledPage::with_response(
            page,
            FetchedResponse {
                status_code: status,
                content_type: content_type.to_string(),
                final_uri: url("https://example.com/"),
                headers: HashMap::new(),
            },
        );
        result.raw_content = body.to_string();
        result.content_size_bytes = body.len() as u64;
        result
    }

    #[test]
    fn test_allows_plain_internal_page() {
        let engine = DecisionEngine::new();
        let decision = engine.should_crawl_page(&internal_page("/a"), &context());
        assert!(decision.allow);
        assert_eq!(decision.reason, "");
    }

    #[test]
    fn test_invalid_scheme_disallowed() {
        let engine = DecisionEngine::new();
        let page = PageToCrawl::root(url("ftp://example.com/file"));
        let decision = engine.should_crawl_page(&page, &context());
        assert!(!decision.allow);
        assert_eq!(decision.reason, "Invalid scheme");
    }

    #[test]
    fn test_already_crawled_disallowed() {
        let engine = DecisionEngine::new();
        let ctx = context();
        let page = internal_page("/seen");

        ctx.try_mark_crawled(page.uri.as_str());
        let decision = engine.should_crawl_page(&page, &ctx);
        assert!(!decision.allow);
        assert_eq!(decision.reason, "Link already crawled");
    }

    #[test]
    fn test_recrawling_enabled_allows_seen_page() {
        let engine = DecisionEngine::new();
        let mut config = Config::default();
        config.crawler.is_recrawling_enabled = true;
        let ctx = context_with(config);
        let page = internal_page("/seen");

        ctx.try_mark_crawled(page.uri.as_str());
        assert!(engine.should_crawl_page(&page, &ctx).allow);
    }

    #[test]
    fn test_max_pages_limit() {
        let engine = DecisionEngine::new();
        let mut config = Config::default();
        config.crawler.max_pages_to_crawl = 2;
        let ctx = context_with(config);

        ctx.try_mark_crawled("https://example.com/1");
        ctx.try_mark_crawled("https://example.com/2");

        let decision = engine.should_crawl_page(&internal_page("/3"), &ctx);
        assert!(!decision.allow);
        assert_eq!(decision.reason, "MaxPagesToCrawl limit of 2 has been reached");
    }

    #[test]
    fn test_max_pages_per_domain_limit() {
        let engine = DecisionEngine::new();
        let mut config = Config::default();
        config.crawler.max_pages_per_domain = 1;
        let ctx = context_with(config);

        ctx.increment_domain_count("example.com");

        let decision = engine.should_crawl_page(&internal_page("/next"), &ctx);
        assert!(!decision.allow);
        assert!(decision.reason.contains("MaxPagesToCrawlPerDomain limit of 1"));
    }

    #[test]
    fn test_max_crawl_depth_limit() {
        let engine = DecisionEngine::new();
        let mut config = Config::default();
        config.crawler.max_crawl_depth = 1;
        let ctx = context_with(config);

        let root_uri = url("https://example.com/");
        let root = PageToCrawl::root(root_uri.clone());
        let level1 = PageToCrawl::discovered(url("https://example.com/1"), &root, &root_uri);
        let level2 = PageToCrawl::discovered(url("https://example.com/2"), &level1, &root_uri);

        assert!(engine.should_crawl_page(&level1, &ctx).allow);
        let decision = engine.should_crawl_page(&level2, &ctx);
        assert!(!decision.allow);
        assert!(decision.reason.contains("MaxCrawlDepth limit of 1"));
    }

    #[test]
    fn test_timeout_not_reached_on_fresh_context() {
        let engine = DecisionEngine::new();
        let mut config = Config::default();
        config.crawler.crawl_timeout_secs = 5;
        let ctx = context_with(config);

        assert!(engine.should_crawl_page(&internal_page("/a"), &ctx).allow);
    }

    #[test]
    fn test_timeout_disallows_once_elapsed() {
        let engine = DecisionEngine::new();
        let mut config = Config::default();
        config.crawler.crawl_timeout_secs = 1;
        let ctx = context_with(config);

        std::thread::sleep(std::time::Duration::from_millis(1100));

        let decision = engine.should_crawl_page(&internal_page("/late"), &ctx);
        assert!(!decision.allow);
        assert_eq!(
            decision.reason,
            "Crawl timeout of 1 seconds has been reached"
        );
    }

    #[test]
    fn test_external_page_disallowed_by_default() {
        let engine = DecisionEngine::new();
        let ctx = context();
        let root_uri = url("https://example.com/");
        let root = PageToCrawl::root(root_uri.clone());
        let external = PageToCrawl::discovered(url("https://other.com/"), &root, &root_uri);

        let decision = engine.should_crawl_page(&external, &ctx);
        assert!(!decision.allow);
        assert_eq!(decision.reason, "Link is external");
    }

    #[test]
    fn test_external_page_allowed_when_enabled() {
        let engine = DecisionEngine::new();
        let mut config = Config::default();
        config.crawler.is_external_page_crawling_enabled = true;
        let ctx = context_with(config);

        let root_uri = url("https://example.com/");
        let root = PageToCrawl::root(root_uri.clone());
        let external = PageToCrawl::discovered(url("https://other.com/"), &root, &root_uri);

        assert!(engine.should_crawl_page(&external, &ctx).allow);
    }

    #[test]
    fn test_decisions_are_idempotent() {
        let engine = DecisionEngine::new();
        let ctx = context();
        let page = internal_page("/same");

        let first = engine.should_crawl_page(&page, &ctx);
        let second = engine.should_crawl_page(&page, &ctx);
        assert_eq!(first, second);
    }

    #[test]
    fn test_links_disallowed_without_content() {
        let engine = DecisionEngine::new();
        let page = crawled(internal_page("/empty"), 200, "text/html", "   ");

        let decision = engine.should_crawl_page_links(&page, &context());
        assert!(!decision.allow);
        assert_eq!(decision.reason, "Page has no content");
    }

    #[test]
    fn test_links_disallowed_for_external_page() {
        let engine = DecisionEngine::new();
        let ctx = context();
        let root_uri = url("https://example.com/");
        let root = PageToCrawl::root(root_uri.clone());
        let external = PageToCrawl::discovered(url("https://other.com/"), &root, &root_uri);
        let page = crawled(external, 200, "text/html", "<html>hi</html>");

        let decision = engine.should_crawl_page_links(&page, &ctx);
        assert!(!decision.allow);
        assert_eq!(decision.reason, "Link is external");
    }

    #[test]
    fn test_links_allowed_with_content() {
        let engine = DecisionEngine::new();
        let page = crawled(internal_page("/full"), 200, "text/html", "<html>hi</html>");
        assert!(engine.should_crawl_page_links(&page, &context()).allow);
    }

    #[test]
    fn test_download_disallowed_without_response() {
        let engine = DecisionEngine::new();
        let page = CrawledPage::failed(internal_page("/gone"), "timeout".to_string());

        let decision = engine.should_download_page_content(&page, &context());
        assert!(!decision.allow);
        assert_eq!(decision.reason, "Null page response");
    }

    #[test]
    fn test_download_disallowed_on_non_200() {
        let engine = DecisionEngine::new();
        let page = crawled(internal_page("/404"), 404, "text/html", "");

        let decision = engine.should_download_page_content(&page, &context());
        assert!(!decision.allow);
        assert_eq!(decision.reason, "HttpStatusCode is not 200");
    }

    #[test]
    fn test_download_disallowed_on_content_type_mismatch() {
        let engine = DecisionEngine::new();
        let page = crawled(internal_page("/img"), 200, "image/png", "");

        let decision = engine.should_download_page_content(&page, &context());
        assert!(!decision.allow);
        assert_eq!(decision.reason, "Content type is not text/html");
    }

    #[test]
    fn test_download_accepts_content_type_with_charset() {
        let engine = DecisionEngine::new();
        let page = crawled(internal_page("/ok"), 200, "text/html; charset=utf-8", "");

        assert!(engine.should_download_page_content(&page, &context()).allow);
    }

    #[test]
    fn test_download_accepts_any_configured_type() {
        let engine = DecisionEngine::new();
        let mut config = Config::default();
        config.crawler.downloadable_content_types = "text/html, text/plain".to_string();
        let ctx = context_with(config);
        let page = crawled(internal_page("/txt"), 200, "text/plain", "");

        assert!(engine.should_download_page_content(&page, &ctx).allow);
    }

    #[test]
    fn test_override_can_restrict() {
        let mut engine = DecisionEngine::new();
        engine.set_should_crawl_page(|_, _| CrawlDecision::disallowed("Vetoed by caller"));

        let decision = engine.should_crawl_page(&internal_page("/a"), &context());
        assert!(!decision.allow);
        assert_eq!(decision.reason, "Vetoed by caller");
    }

    #[test]
    fn test_override_cannot_bypass_builtin_rejection() {
        let mut engine = DecisionEngine::new();
        engine.set_should_crawl_page(|_, _| CrawlDecision::allowed());

        let ctx = context();
        let page = internal_page("/seen");
        ctx.try_mark_crawled(page.uri.as_str());

        // Built-in rejection short-circuits; the permissive override never runs
        let decision = engine.should_crawl_page(&page, &ctx);
        assert!(!decision.allow);
        assert_eq!(decision.reason, "Link already crawled");
    }

    #[test]
    fn test_panicking_override_is_swallowed() {
        let mut engine = DecisionEngine::new();
        engine.set_should_crawl_page(|_, _| panic!("subscriber bug"));

        let decision = engine.should_crawl_page(&internal_page("/a"), &context());
        assert!(decision.allow);
    }
}
