//! Frontier: the queue of discovered-but-not-yet-crawled pages
//!
//! The frontier is a FIFO sequence with URI dedupe: unless recrawling is
//! enabled, no two pages with the same absolute URI are ever both
//! outstanding. Producers (workers submitting extracted links) and the
//! consumer (the dispatch loop) run concurrently, so the dedupe
//! check-then-insert and the empty-check-then-pop each happen under a single
//! lock acquisition.
//!
//! FIFO gives breadth-first discovery order. True global ordering across
//! concurrent workers is only approximate, since workers finish out of
//! submission order; that nondeterminism is accepted.

use crate::page::PageToCrawl;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct FrontierInner {
    queue: VecDeque<PageToCrawl>,
    seen: HashSet<String>,
}

/// Thread-safe FIFO frontier with per-URI dedupe
#[derive(Debug)]
pub struct Frontier {
    inner: Mutex<FrontierInner>,
    allow_recrawl: bool,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// With `allow_recrawl` set, the dedupe set is bypassed and the same URI
    /// may be queued repeatedly.
    pub fn new(allow_recrawl: bool) -> Self {
        Self {
            inner: Mutex::new(FrontierInner::default()),
            allow_recrawl,
        }
    }

    /// Appends a page to the tail of the frontier
    ///
    /// Returns false when the page was suppressed as a duplicate of a URI
    /// already seen by this frontier.
    pub fn add(&self, page: PageToCrawl) -> bool {
        let mut inner = self.inner.lock().unwrap();

        if !self.allow_recrawl && !inner.seen.insert(page.uri.as_str().to_string()) {
            tracing::trace!("Suppressing duplicate frontier entry: {}", page.uri);
            return false;
        }

        inner.queue.push_back(page);
        true
    }

    /// Pops the head of the frontier, or None when empty
    pub fn get_next(&self) -> Option<PageToCrawl> {
        self.inner.lock().unwrap().queue.pop_front()
    }

    /// Current queued depth
    pub fn count(&self) -> usize {
        self.inner.lock().unwrap().queue.len()
    }

    /// Returns true when no pages are queued
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}
