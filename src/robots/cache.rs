//! Per-host robots.txt cache
//!
//! Fetched rules are cached by authority for the duration of a crawl, with
//! a daily expiry so long-running crawls pick up robots.txt changes. A host
//! with no robots.txt caches a permissive entry, so the absence is only
//! discovered once.

use crate::robots::RobotsRules;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// A cached robots.txt entry with its fetch timestamp
#[derive(Debug, Clone)]
pub struct CachedRules {
    pub rules: RobotsRules,
    pub fetched_at: DateTime<Utc>,
}

impl CachedRules {
    pub fn new(rules: RobotsRules) -> Self {
        Self {
            rules,
            fetched_at: Utc::now(),
        }
    }

    /// True when the entry is older than 24 hours
    pub fn is_stale(&self) -> bool {
        Utc::now() - self.fetched_at > Duration::hours(24)
    }
}

/// Authority-keyed robots.txt cache
#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: Mutex<HashMap<String, CachedRules>>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the fresh cached rules for an authority, if any
    pub fn get(&self, authority: &str) -> Option<RobotsRules> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(authority)
            .filter(|cached| !cached.is_stale())
            .map(|cached| cached.rules.clone())
    }

    /// Stores rules for an authority
    pub fn insert(&self, authority: &str, rules: RobotsRules) {
        self.entries
            .lock()
            .unwrap()
            .insert(authority.to_string(), CachedRules::new(rules));
    }

    /// Number of cached authorities
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
