//! End-to-end crawl tests
//!
//! These tests run the full engine against wiremock servers: seed a crawl,
//! let the dispatch loop fan pages out over the worker pool, and assert on
//! the crawled set, event counts, and politeness behavior.

use kumo::config::Config;
use kumo::engine::{CrawlDecision, CrawlEngine};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A config tuned for fast deterministic tests
fn test_config() -> Config {
    let mut config = Config::default();
    config.crawler.max_concurrent_workers = 4;
    config.crawler.min_crawl_delay_per_domain_ms = 1;
    config.crawler.frontier_poll_delay_ms = 10;
    config.crawler.http_request_timeout_secs = 5;
    config.robots.respect_robots_txt = false;
    config
}

async fn mount_html(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_discovers_linked_pages() {
    let server = MockServer::start().await;
    let base = server.uri();

    // Root links to B absolutely and C relatively
    mount_html(
        &server,
        "/",
        format!(
            r#"<html><body>
            <a href="{}/b">B</a>
            <a href="/c">C</a>
            </body></html>"#,
            base
        ),
    )
    .await;
    mount_html(&server, "/b", "<html><body>page b</body></html>".to_string()).await;
    mount_html(&server, "/c", "<html><body>page c</body></html>".to_string()).await;

    let mut engine = CrawlEngine::new(test_config()).unwrap();

    let starting = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));

    let s = Arc::clone(&starting);
    engine.events().on_page_crawl_starting(move |_| {
        s.fetch_add(1, Ordering::SeqCst);
    });
    let c = Arc::clone(&completed);
    engine.events().on_page_crawl_completed(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });

    let result = engine
        .crawl(Url::parse(&format!("{}/", base)).unwrap())
        .await;

    assert!(!result.error_occurred);

    let crawled = result.context.crawled_urls();
    assert_eq!(crawled.len(), 3);
    assert!(crawled.contains(&format!("{}/", base)));
    assert!(crawled.contains(&format!("{}/b", base)));
    assert!(crawled.contains(&format!("{}/c", base)));

    assert_eq!(starting.load(Ordering::SeqCst), 3);
    assert_eq!(completed.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_duplicate_links_crawled_once() {
    let server = MockServer::start().await;
    let base = server.uri();

    // Both child pages link to the same grandchild
    mount_html(
        &server,
        "/",
        r#"<html><body><a href="/x">x</a><a href="/y">y</a></body></html>"#.to_string(),
    )
    .await;
    mount_html(
        &server,
        "/x",
        r#"<html><body><a href="/shared">s</a></body></html>"#.to_string(),
    )
    .await;
    mount_html(
        &server,
        "/y",
        r#"<html><body><a href="/shared">s</a></body></html>"#.to_string(),
    )
    .await;
    mount_html(&server, "/shared", "<html><body>end</body></html>".to_string()).await;

    let mut engine = CrawlEngine::new(test_config()).unwrap();

    let completed = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&completed);
    engine.events().on_page_crawl_completed(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });

    let result = engine
        .crawl(Url::parse(&format!("{}/", base)).unwrap())
        .await;

    assert!(!result.error_occurred);
    assert_eq!(result.context.crawled_count(), 4);
    assert_eq!(completed.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_override_disallowing_everything() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_html(&server, "/", "<html><body>root</body></html>".to_string()).await;

    let mut engine = CrawlEngine::new(test_config()).unwrap();
    engine.set_should_crawl_page(|_, _| CrawlDecision::disallowed("Vetoed by caller"));

    let starting = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));
    let disallowed = Arc::new(AtomicUsize::new(0));

    let s = Arc::clone(&starting);
    engine.events().on_page_crawl_starting(move |_| {
        s.fetch_add(1, Ordering::SeqCst);
    });
    let c = Arc::clone(&completed);
    engine.events().on_page_crawl_completed(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    let d = Arc::clone(&disallowed);
    engine.events().on_page_crawl_disallowed(move |args| {
        assert_eq!(args.reason, "Vetoed by caller");
        d.fetch_add(1, Ordering::SeqCst);
    });

    let result = engine
        .crawl(Url::parse(&format!("{}/", base)).unwrap())
        .await;

    assert!(!result.error_occurred);
    assert_eq!(result.context.crawled_count(), 0);
    assert_eq!(disallowed.load(Ordering::SeqCst), 1);
    assert_eq!(starting.load(Ordering::SeqCst), 0);
    assert_eq!(completed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stop_request_drains_without_dispatching() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_html(
        &server,
        "/",
        r#"<html><body>
        <a href="/1">1</a><a href="/2">2</a><a href="/3">3</a>
        </body></html>"#
            .to_string(),
    )
    .await;
    for p in ["/1", "/2", "/3"] {
        mount_html(&server, p, "<html><body>leaf</body></html>".to_string()).await;
    }

    let mut config = test_config();
    // Single worker keeps the stop deterministic: the root is the first and
    // only decision made before the flag is seen
    config.crawler.max_concurrent_workers = 1;
    let mut engine = CrawlEngine::new(config).unwrap();

    engine.set_should_crawl_page(|_, context| {
        context.request_stop();
        CrawlDecision::allowed()
    });

    let result = engine
        .crawl(Url::parse(&format!("{}/", base)).unwrap())
        .await;

    assert!(!result.error_occurred);
    assert!(result.context.is_stop_requested());
    // Only the root was dispatched; its links stayed queued
    assert_eq!(result.context.crawled_count(), 1);
    assert!(result.residual_frontier_count >= 1);
}

#[tokio::test]
async fn test_content_type_gate_blocks_body() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_html(
        &server,
        "/",
        r#"<html><body><a href="/photo.png">img</a></body></html>"#.to_string(),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/photo.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0x89, 0x50, 0x4e, 0x47])
                .insert_header("content-type", "image/png"),
        )
        .mount(&server)
        .await;

    let mut engine = CrawlEngine::new(test_config()).unwrap();

    let png_bodies = Arc::new(AtomicUsize::new(0));
    let b = Arc::clone(&png_bodies);
    engine.events().on_page_crawl_completed(move |args| {
        if args.page.page.uri.path().ends_with(".png") {
            assert_eq!(args.page.response.as_ref().unwrap().status_code, 200);
            assert_eq!(args.page.raw_content, "");
            b.fetch_add(1, Ordering::SeqCst);
        }
    });

    let result = engine
        .crawl(Url::parse(&format!("{}/", base)).unwrap())
        .await;

    assert!(!result.error_occurred);
    // The PNG page was crawled but its body was never downloaded
    assert_eq!(png_bodies.load(Ordering::SeqCst), 1);
    assert_eq!(result.context.crawled_count(), 2);
}

#[tokio::test]
async fn test_max_pages_limit_is_enforced() {
    let server = MockServer::start().await;
    let base = server.uri();

    let mut links = String::new();
    for i in 0..10 {
        links.push_str(&format!(r#"<a href="/page{}">p</a>"#, i));
        mount_html(
            &server,
            &format!("/page{}", i),
            "<html><body>leaf</body></html>".to_string(),
        )
        .await;
    }
    mount_html(&server, "/", format!("<html><body>{}</body></html>", links)).await;

    let mut config = test_config();
    config.crawler.max_pages_to_crawl = 3;
    let mut engine = CrawlEngine::new(config).unwrap();

    let result = engine
        .crawl(Url::parse(&format!("{}/", base)).unwrap())
        .await;

    assert!(!result.error_occurred);
    assert!(result.context.crawled_count() <= 3);
}

#[tokio::test]
async fn test_external_links_are_not_crawled() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_html(
        &server,
        "/",
        r#"<html><body>
        <a href="https://external.invalid/page">away</a>
        <a href="/local">here</a>
        </body></html>"#
            .to_string(),
    )
    .await;
    mount_html(&server, "/local", "<html><body>local</body></html>".to_string()).await;

    let mut engine = CrawlEngine::new(test_config()).unwrap();

    let external_disallowed = Arc::new(AtomicUsize::new(0));
    let e = Arc::clone(&external_disallowed);
    engine.events().on_page_crawl_disallowed(move |args| {
        if args.reason == "Link is external" {
            e.fetch_add(1, Ordering::SeqCst);
        }
    });

    let result = engine
        .crawl(Url::parse(&format!("{}/", base)).unwrap())
        .await;

    assert!(!result.error_occurred);
    assert_eq!(result.context.crawled_count(), 2);
    assert_eq!(external_disallowed.load(Ordering::SeqCst), 1);
    assert!(!result
        .context
        .is_crawled("https://external.invalid/page"));
}

#[tokio::test]
async fn test_robots_txt_disallow_is_respected() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /admin"))
        .mount(&server)
        .await;

    mount_html(
        &server,
        "/",
        r#"<html><body>
        <a href="/allowed">ok</a>
        <a href="/admin">hidden</a>
        </body></html>"#
            .to_string(),
    )
    .await;
    mount_html(&server, "/allowed", "<html><body>fine</body></html>".to_string()).await;

    // The admin page must never be requested
    Mock::given(method("GET"))
        .and(path("/admin"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config();
    config.robots.respect_robots_txt = true;
    let mut engine = CrawlEngine::new(config).unwrap();

    let robots_denied = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&robots_denied);
    engine.events().on_page_crawl_disallowed(move |args| {
        if args.reason == "Page is disallowed by robots.txt" {
            r.fetch_add(1, Ordering::SeqCst);
        }
    });

    let result = engine
        .crawl(Url::parse(&format!("{}/", base)).unwrap())
        .await;

    assert!(!result.error_occurred);
    assert_eq!(result.context.crawled_count(), 2);
    assert_eq!(robots_denied.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_transport_failure_does_not_abort_crawl() {
    let server = MockServer::start().await;
    let base = server.uri();

    // One link points at a port nothing listens on
    mount_html(
        &server,
        "/",
        r#"<html><body>
        <a href="/alive">ok</a>
        </body></html>"#
            .to_string(),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/alive"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut engine = CrawlEngine::new(test_config()).unwrap();

    let failures = Arc::new(AtomicUsize::new(0));
    let f = Arc::clone(&failures);
    engine.events().on_page_crawl_completed(move |args| {
        if let Some(response) = &args.page.response {
            if response.status_code == 500 {
                f.fetch_add(1, Ordering::SeqCst);
            }
        }
    });

    let result = engine
        .crawl(Url::parse(&format!("{}/", base)).unwrap())
        .await;

    // The 500 page is reported through the normal completed event
    assert!(!result.error_occurred);
    assert_eq!(result.context.crawled_count(), 2);
    assert_eq!(failures.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_panicking_subscriber_does_not_break_crawl() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_html(&server, "/", "<html><body>root</body></html>".to_string()).await;

    let mut engine = CrawlEngine::new(test_config()).unwrap();

    engine.events().on_page_crawl_completed(|_| {
        panic!("subscriber bug");
    });
    let completed = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&completed);
    engine.events().on_page_crawl_completed(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });

    let result = engine
        .crawl(Url::parse(&format!("{}/", base)).unwrap())
        .await;

    assert!(!result.error_occurred);
    assert_eq!(result.context.crawled_count(), 1);
    // The sibling subscriber still fired
    assert_eq!(completed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_async_subscribers_observe_the_crawl() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_html(&server, "/", "<html><body>root</body></html>".to_string()).await;

    let mut engine = CrawlEngine::new(test_config()).unwrap();

    let seen = Arc::new(AtomicUsize::new(0));
    let s = Arc::clone(&seen);
    engine.events().on_page_crawl_completed_async(move |args| {
        let s = Arc::clone(&s);
        async move {
            assert!(args.page.response.is_some());
            s.fetch_add(1, Ordering::SeqCst);
        }
    });

    let result = engine
        .crawl(Url::parse(&format!("{}/", base)).unwrap())
        .await;
    assert!(!result.error_occurred);

    // Fire-and-forget handlers finish after the crawl; give them a moment
    for _ in 0..100 {
        if seen.load(Ordering::SeqCst) == 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}
