use crate::config::Config;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use url::Url;

/// Single-crawl shared mutable state
///
/// One context is created per `crawl()` invocation and shared by reference
/// (`Arc`) with every worker, decision delegate, and event subscriber. The
/// crawled-URL set and per-domain counters are written by many workers
/// concurrently and are therefore behind mutexes; the stop flags are
/// atomics. The configuration is read-only for the run.
#[derive(Debug)]
pub struct CrawlContext {
    /// The URI the crawl was seeded with
    pub root_uri: Url,

    /// Monotonic start instant, used for elapsed-time checks
    started_at: Instant,

    /// Wall-clock start timestamp
    pub started_at_utc: DateTime<Utc>,

    /// Resolved configuration, immutable for the run
    pub config: Config,

    /// URIs that have been claimed for crawling (append-only)
    crawled_urls: Mutex<HashSet<String>>,

    /// Pages claimed per authority
    domain_counts: Mutex<HashMap<String, u64>>,

    /// Cooperative stop: no further dispatch, in-flight work drains
    stop_requested: AtomicBool,

    /// Hard stop: exposed for callers, no enforced behavior in the engine
    hard_stop_requested: AtomicBool,

    /// Open key/value bag for caller-defined state
    values: Mutex<HashMap<String, String>>,
}

impl CrawlContext {
    /// Creates a fresh context for one crawl run
    pub fn new(root_uri: Url, config: Config) -> Self {
        Self {
            root_uri,
            started_at: Instant::now(),
            started_at_utc: Utc::now(),
            config,
            crawled_urls: Mutex::new(HashSet::new()),
            domain_counts: Mutex::new(HashMap::new()),
            stop_requested: AtomicBool::new(false),
            hard_stop_requested: AtomicBool::new(false),
            values: Mutex::new(HashMap::new()),
        }
    }

    /// Time elapsed since the crawl started
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Returns true if the URI has already been claimed for crawling
    pub fn is_crawled(&self, uri: &str) -> bool {
        self.crawled_urls.lock().unwrap().contains(uri)
    }

    /// Claims a URI for crawling
    ///
    /// The membership test and insert happen under one lock acquisition, so
    /// when two workers race on the same URI exactly one of them wins.
    /// Returns false for the loser.
    pub fn try_mark_crawled(&self, uri: &str) -> bool {
        self.crawled_urls.lock().unwrap().insert(uri.to_string())
    }

    /// Claims a URI for crawling, enforcing the total-page cap
    ///
    /// The cap check, the duplicate check, and the insert happen under one
    /// lock acquisition, so concurrent workers can never push the crawled
    /// set past `max_pages_to_crawl`. With recrawling enabled the duplicate
    /// check is skipped.
    pub fn try_claim(&self, uri: &str) -> bool {
        let cfg = &self.config.crawler;
        let mut crawled = self.crawled_urls.lock().unwrap();

        if cfg.max_pages_to_crawl > 0 && crawled.len() as u64 + 1 > cfg.max_pages_to_crawl {
            return false;
        }

        if cfg.is_recrawling_enabled {
            crawled.insert(uri.to_string());
            true
        } else {
            crawled.insert(uri.to_string())
        }
    }

    /// Number of URIs claimed so far
    pub fn crawled_count(&self) -> usize {
        self.crawled_urls.lock().unwrap().len()
    }

    /// Snapshot of the crawled-URL set
    pub fn crawled_urls(&self) -> HashSet<String> {
        self.crawled_urls.lock().unwrap().clone()
    }

    /// Pages claimed for the given authority
    pub fn domain_count(&self, authority: &str) -> u64 {
        self.domain_counts
            .lock()
            .unwrap()
            .get(authority)
            .copied()
            .unwrap_or(0)
    }

    /// Increments the page counter for an authority (insert-or-increment)
    pub fn increment_domain_count(&self, authority: &str) {
        let mut counts = self.domain_counts.lock().unwrap();
        *counts.entry(authority.to_string()).or_insert(0) += 1;
    }

    /// Requests a cooperative stop: the engine drains without new dispatch
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Returns true if a cooperative stop has been requested
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Raises the hard-stop flag
    ///
    /// The flag is observable but the engine attaches no behavior to it;
    /// in-flight work is never interrupted.
    pub fn request_hard_stop(&self) {
        self.hard_stop_requested.store(true, Ordering::SeqCst);
    }

    /// Returns true if the hard-stop flag has been raised
    pub fn is_hard_stop_requested(&self) -> bool {
        self.hard_stop_requested.load(Ordering::SeqCst)
    }

    /// Stores a caller-defined value on the context
    pub fn set_value(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    /// Reads a caller-defined value from the context
    pub fn get_value(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }
}
