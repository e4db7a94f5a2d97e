//! Fetcher trait and cache statistics.

use async_trait::async_trait;
use finanboard_core::{FinanResult, QueryKey, RecordSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::RemoteStore;

/// Source of query results for the cache.
///
/// The cache never talks to the remote store directly; it asks a fetcher
/// for the rows a key addresses.
#[async_trait]
pub trait QueryFetcher: Send + Sync {
    async fn fetch(&self, key: &QueryKey) -> FinanResult<RecordSet>;
}

/// Fetcher that reads a key's rows from a [`RemoteStore`].
pub struct StoreFetcher {
    store: Arc<dyn RemoteStore>,
}

impl StoreFetcher {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl QueryFetcher for StoreFetcher {
    async fn fetch(&self, key: &QueryKey) -> FinanResult<RecordSet> {
        let records = self.store.read(key.kind(), &key.to_filter()).await?;
        Ok(records.into_iter().collect())
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads served from the cache.
    pub hits: u64,
    /// Reads that had to fetch.
    pub misses: u64,
    /// Fetches that landed and were applied.
    pub fetches: u64,
    pub fetch_errors: u64,
    /// Fetches whose result was discarded after cancellation.
    pub discarded_fetches: u64,
    pub evictions: u64,
    /// Rollbacks applied after failed mutations.
    pub rollbacks: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    pub(crate) hits: AtomicU64,
    pub(crate) misses: AtomicU64,
    pub(crate) fetches: AtomicU64,
    pub(crate) fetch_errors: AtomicU64,
    pub(crate) discarded_fetches: AtomicU64,
    pub(crate) evictions: AtomicU64,
    pub(crate) rollbacks: AtomicU64,
}

impl StatCounters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, entry_count: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
            discarded_fetches: self.discarded_fetches.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            entry_count: entry_count as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = CacheStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_counters_snapshot() {
        let counters = StatCounters::default();
        StatCounters::bump(&counters.hits);
        StatCounters::add(&counters.evictions, 3);
        let stats = counters.snapshot(2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.evictions, 3);
        assert_eq!(stats.entry_count, 2);
    }
}
