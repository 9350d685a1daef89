//! Per-domain politeness rate limiting
//!
//! The [`RateLimiter`] gates workers so that at least a minimum delay
//! elapses between requests to the same authority. Each authority gets its
//! own gate, created lazily on first sight (first insert wins under the
//! registry lock). Waiting happens on a per-domain async mutex, so requests
//! to distinct domains never serialize against each other.

use crate::url::authority_of;
use crate::KumoError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use url::Url;

/// A single authority's gate: its delay and the time of the last permit
#[derive(Debug)]
struct DomainGate {
    delay: Mutex<Duration>,
    last_permit: tokio::sync::Mutex<Option<Instant>>,
}

impl DomainGate {
    fn new(delay: Duration) -> Self {
        Self {
            delay: Mutex::new(delay),
            last_permit: tokio::sync::Mutex::new(None),
        }
    }

    fn delay(&self) -> Duration {
        *self.delay.lock().unwrap()
    }

    fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Waits until this domain's interval has elapsed, then takes the slot
    async fn pass(&self) {
        let mut last = self.last_permit.lock().await;
        let delay = self.delay();

        if let Some(previous) = *last {
            let since = previous.elapsed();
            if since < delay {
                tokio::time::sleep(delay - since).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// Enforces a minimum delay between requests to the same authority
#[derive(Debug)]
pub struct RateLimiter {
    default_delay: Duration,
    gates: Mutex<HashMap<String, Arc<DomainGate>>>,
}

impl RateLimiter {
    /// Creates a rate limiter with the given default per-domain delay
    ///
    /// # Errors
    ///
    /// Returns `KumoError::InvalidArgument` when `min_delay_ms < 1`.
    pub fn new(min_delay_ms: u64) -> Result<Self, KumoError> {
        if min_delay_ms < 1 {
            return Err(KumoError::InvalidArgument(format!(
                "rate limiter delay must be >= 1ms, got {}",
                min_delay_ms
            )));
        }

        Ok(Self {
            default_delay: Duration::from_millis(min_delay_ms),
            gates: Mutex::new(HashMap::new()),
        })
    }

    /// Waits until a request to `uri`'s authority is permitted
    ///
    /// The registry lock is held only long enough to look up or create the
    /// domain's gate; the actual waiting happens on the gate itself, so
    /// concurrent calls for different domains proceed independently.
    pub async fn rate_limit(&self, uri: &Url) {
        let Some(authority) = authority_of(uri) else {
            // No authority means nothing to throttle against
            return;
        };

        let gate = self.gate_for(&authority);
        gate.pass().await;
        tracing::trace!("Rate limit passed for {}", authority);
    }

    /// Overrides the delay for one authority
    ///
    /// Used when robots.txt asks for a longer crawl delay than the default.
    /// The gate keeps its last-permit history across the change.
    pub fn add_domain(&self, uri: &Url, delay: Duration) {
        let Some(authority) = authority_of(uri) else {
            return;
        };

        let gate = self.gate_for(&authority);
        gate.set_delay(delay);
        tracing::debug!("Domain {} delay set to {:?}", authority, delay);
    }

    /// The delay currently in force for `uri`'s authority
    pub fn delay_for(&self, uri: &Url) -> Duration {
        match authority_of(uri) {
            Some(authority) => self.gate_for(&authority).delay(),
            None => self.default_delay,
        }
    }

    fn gate_for(&self, authority: &str) -> Arc<DomainGate> {
        let mut gates = self.gates.lock().unwrap();
        Arc::clone(
            gates
                .entry(authority.to_string())
                .or_insert_with(|| Arc::new(DomainGate::new(self.default_delay))),
        )
    }
}
