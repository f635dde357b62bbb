use crate::modules::jobs::application::Cache;
use crate::shared::errors::AppResult;
use crate::shared::utils::clock::Clock;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Cached provider response with TTL support
#[derive(Debug, Clone)]
struct CacheEntry {
    data: serde_json::Value,
    created_at: DateTime<Utc>,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match (now - self.created_at).to_std() {
            Ok(age) => age > self.ttl,
            Err(_) => false,
        }
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries_count: usize,
    pub expired_cleanups: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }
}

/// Provider metadata cache keyed by target (e.g. `movie:603`).
/// Expired entries are invisible to readers; maintenance reclaims them.
pub struct MetadataCache {
    entries: DashMap<String, CacheEntry>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    cleanups: AtomicU64,
}

impl MetadataCache {
    pub fn new(clock: Arc<dyn Clock>, default_ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            default_ttl,
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            cleanups: AtomicU64::new(0),
        }
    }

    /// One day TTL, 10k entries
    pub fn with_defaults(clock: Arc<dyn Clock>) -> Self {
        Self::new(clock, Duration::from_secs(24 * 60 * 60), 10_000)
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let now = self.clock.now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.data.clone());
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn insert(&self, key: impl Into<String>, data: serde_json::Value) {
        self.insert_with_ttl(key, data, self.default_ttl);
    }

    pub fn insert_with_ttl(&self, key: impl Into<String>, data: serde_json::Value, ttl: Duration) {
        if self.entries.len() >= self.max_entries {
            self.evict_oldest_entries();
        }

        self.entries.insert(
            key.into(),
            CacheEntry {
                data,
                created_at: self.clock.now(),
                ttl,
            },
        );
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every expired entry, returning how many went
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn purge(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let purged = before.saturating_sub(self.entries.len());

        if purged > 0 {
            self.cleanups.fetch_add(purged as u64, Ordering::Relaxed);
            debug!("Purged {} expired cache entries", purged);
        }
        purged
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries_count: self.entries.len(),
            expired_cleanups: self.cleanups.load(Ordering::Relaxed),
        }
    }

    /// Drop the oldest entries until the cache is back to 90% of capacity
    fn evict_oldest_entries(&self) {
        let mut by_age: Vec<(String, DateTime<Utc>)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().created_at))
            .collect();
        by_age.sort_by_key(|(_, created_at)| *created_at);

        let target_size = (self.max_entries * 9) / 10;
        let to_evict = by_age.len().saturating_sub(target_size).max(1);

        for (key, _) in by_age.into_iter().take(to_evict) {
            self.entries.remove(&key);
        }
        debug!("Evicted {} old cache entries", to_evict);
    }
}

#[async_trait]
impl Cache for MetadataCache {
    async fn purge_expired(&self) -> AppResult<usize> {
        Ok(self.purge())
    }
}
