//! Bounded-concurrency worker pool
//!
//! The pool runs crawl-page pipelines with at most `max_concurrency` in
//! flight. [`WorkerPool::do_work`] awaits a semaphore permit before handing
//! the work off, which is the engine's backpressure contract: when every
//! slot is busy, the dispatch loop itself stalls on submission. Worker
//! panics are caught and logged, never propagated.
//!
//! With `max_concurrency == 1` the work runs inline on the submitting task,
//! which keeps single-worker crawls deterministic for testing.

use crate::KumoError;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Bounded executor for crawl work
#[derive(Debug)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    active: Arc<AtomicUsize>,
    aborted: Arc<AtomicBool>,
    max_concurrency: usize,
}

impl WorkerPool {
    /// Creates a pool with the given concurrency bound
    ///
    /// # Errors
    ///
    /// Returns `KumoError::InvalidArgument` when `max_concurrency` is
    /// outside [1, 100].
    pub fn new(max_concurrency: usize) -> Result<Self, KumoError> {
        if !(1..=100).contains(&max_concurrency) {
            return Err(KumoError::InvalidArgument(format!(
                "max_concurrency must be between 1 and 100, got {}",
                max_concurrency
            )));
        }

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            active: Arc::new(AtomicUsize::new(0)),
            aborted: Arc::new(AtomicBool::new(false)),
            max_concurrency,
        })
    }

    /// Schedules a unit of work on the pool
    ///
    /// When a slot is free the work starts immediately; otherwise this call
    /// awaits until one frees up. After [`Self::abort_all`], work handed to
    /// this method is dropped without running.
    pub async fn do_work<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.aborted.load(Ordering::SeqCst) {
            tracing::debug!("Worker pool aborted, dropping submitted work");
            return;
        }

        // This await is the backpressure: submission stalls on saturation
        let permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                // Semaphore closed by abort_all
                tracing::debug!("Worker pool closed, dropping submitted work");
                return;
            }
        };

        if self.aborted.load(Ordering::SeqCst) {
            return;
        }

        self.active.fetch_add(1, Ordering::SeqCst);
        let active = Arc::clone(&self.active);

        if self.max_concurrency == 1 {
            // Single-worker mode runs inline on the submitting task
            if AssertUnwindSafe(work).catch_unwind().await.is_err() {
                tracing::error!("Crawl worker panicked");
            }
            active.fetch_sub(1, Ordering::SeqCst);
            drop(permit);
        } else {
            tokio::spawn(async move {
                if AssertUnwindSafe(work).catch_unwind().await.is_err() {
                    tracing::error!("Crawl worker panicked");
                }
                active.fetch_sub(1, Ordering::SeqCst);
                drop(permit);
            });
        }
    }

    /// Returns true while at least one worker is running
    pub fn has_running_workers(&self) -> bool {
        self.active.load(Ordering::SeqCst) > 0
    }

    /// Cooperative abort: pending and future submissions are dropped
    ///
    /// In-flight work is not interrupted. Safe to call repeatedly.
    pub fn abort_all(&self) {
        if !self.aborted.swap(true, Ordering::SeqCst) {
            self.semaphore.close();
            tracing::debug!("Worker pool abort requested");
        }
    }

    /// Returns true once the pool has been aborted
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}
