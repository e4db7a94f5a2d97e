//! Freshness contracts for cache reads.
//!
//! A screen reading through [`QueryCache::fetch_query`](super::QueryCache::fetch_query)
//! says how old a payload it will accept and gets back a [`CacheRead`]
//! telling it whether the payload was served from memory.

use chrono::{DateTime, Utc};
use std::time::Duration;

use super::version::EntryVersion;

/// How old a cached payload a read will accept.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Freshness {
    /// Serve a payload younger than `max_staleness`, even if the entry was
    /// invalidated after that fetch. A zero stale time always refetches.
    BestEffort { max_staleness: Duration },

    /// Serve only a successfully fetched payload that has not been
    /// invalidated since.
    #[default]
    Consistent,
}

impl Freshness {
    pub fn best_effort(max_staleness: Duration) -> Self {
        Self::BestEffort { max_staleness }
    }

    pub fn consistent() -> Self {
        Self::Consistent
    }

    /// Whether a payload fetched at `fetched_at` may be served at `now`.
    ///
    /// `settled` is true when the last fetch succeeded and nothing has
    /// invalidated the entry since.
    pub fn accepts(&self, fetched_at: DateTime<Utc>, now: DateTime<Utc>, settled: bool) -> bool {
        match self {
            Self::BestEffort { max_staleness } => {
                let age = (now - fetched_at).to_std().unwrap_or(Duration::ZERO);
                age < *max_staleness
            }
            Self::Consistent => settled,
        }
    }
}

/// A query payload and where it came from.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    fetched_at: DateTime<Utc>,
    version: EntryVersion,
    hit: bool,
}

impl<T> CacheRead<T> {
    pub fn from_cache(value: T, fetched_at: DateTime<Utc>, version: EntryVersion) -> Self {
        Self {
            value,
            fetched_at,
            version,
            hit: true,
        }
    }

    pub fn from_remote(value: T, version: EntryVersion) -> Self {
        Self {
            value,
            fetched_at: Utc::now(),
            version,
            hit: false,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Entry version the value was read at.
    pub fn version(&self) -> EntryVersion {
        self.version
    }

    pub fn was_cache_hit(&self) -> bool {
        self.hit
    }

    pub fn was_cache_miss(&self) -> bool {
        !self.hit
    }
}
