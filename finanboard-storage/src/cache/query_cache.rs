//! Keyed query cache with stale-while-revalidate semantics.
//!
//! Entries move through `Idle -> Loading -> {Success, Error}`. Invalidation
//! sends an entry back to `Loading` while its last payload stays readable.
//! Point writes replace the payload and bump the version without touching
//! the fetch status. Every fetch carries a generation; a result that lands
//! after its fetch was cancelled or superseded is dropped.
//!
//! Lock guards are never held across an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use finanboard_core::{
    AppConfig, CacheError, FetchStatus, FinanResult, QueryKey, RecordSet, Timestamp,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use super::entry::{CacheEntry, EntrySlot};
use super::freshness::{CacheRead, Freshness};
use super::traits::{CacheStats, QueryFetcher, StatCounters};
use super::version::{EntryVersion, VersionClock};

/// Configuration for the query cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long a fetched result counts as fresh for [`QueryCache::query`].
    pub stale_time: Duration,
    /// Idle time after which [`QueryCache::evict_expired`] drops an entry.
    pub retention: Duration,
    /// Capacity of the change-event channel.
    pub event_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::ZERO,
            retention: Duration::from_secs(300),
            event_capacity: 256,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stale_time(mut self, duration: Duration) -> Self {
        self.stale_time = duration;
        self
    }

    pub fn with_retention(mut self, duration: Duration) -> Self {
        self.retention = duration;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

impl From<&AppConfig> for CacheConfig {
    fn from(config: &AppConfig) -> Self {
        Self::new()
            .with_stale_time(config.stale_time)
            .with_retention(config.retention)
            .with_event_capacity(config.event_capacity)
    }
}

/// What happened to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheChange {
    /// Payload replaced by a point write.
    DataSet,
    FetchStarted,
    Fetched,
    FetchFailed,
    FetchCancelled,
    Removed,
    Evicted,
}

/// Change notification published to subscribers.
#[derive(Debug, Clone)]
pub struct CacheEvent {
    pub key: QueryKey,
    pub change: CacheChange,
    pub status: FetchStatus,
    pub version: EntryVersion,
    pub data: Option<RecordSet>,
}

/// Handle to one fetch generation of one entry.
///
/// Pass it to [`QueryCache::resolve`] to run the fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    key: QueryKey,
    generation: u64,
}

impl FetchTicket {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Outcome of [`QueryCache::modify`].
#[derive(Debug, Clone)]
pub struct Modified {
    /// Payload before the modification.
    pub previous: RecordSet,
    /// Entry version after the modification.
    pub version: EntryVersion,
    /// False when the new payload equalled the old one and nothing was written.
    pub changed: bool,
}

type Entries = HashMap<QueryKey, EntrySlot>;

/// In-memory cache of query results addressed by [`QueryKey`].
pub struct QueryCache {
    entries: RwLock<Entries>,
    fetcher: Arc<dyn QueryFetcher>,
    config: CacheConfig,
    clock: VersionClock,
    stats: StatCounters,
    events: broadcast::Sender<CacheEvent>,
}

impl QueryCache {
    pub fn new(fetcher: Arc<dyn QueryFetcher>, config: CacheConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            entries: RwLock::new(HashMap::new()),
            fetcher,
            config,
            clock: VersionClock::default(),
            stats: StatCounters::default(),
            events,
        }
    }

    pub fn with_defaults(fetcher: Arc<dyn QueryFetcher>) -> Self {
        Self::new(fetcher, CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // A panic inside a critical section cannot leave a slot half-written,
    // so a poisoned lock is still safe to use.
    fn read_entries(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, key: &QueryKey, change: CacheChange, slot: &EntrySlot) {
        if self.events.receiver_count() == 0 {
            return;
        }
        // Only fails when every receiver has gone away.
        let _ = self.events.send(CacheEvent {
            key: key.clone(),
            change,
            status: slot.status,
            version: slot.version,
            data: slot.data.clone(),
        });
    }

    /// Receive every subsequent entry change.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Point reads and writes
    // ------------------------------------------------------------------

    pub fn get(&self, key: &QueryKey) -> Option<CacheEntry> {
        self.read_entries().get(key).map(EntrySlot::view)
    }

    /// Current payload of an entry, if any.
    pub fn data(&self, key: &QueryKey) -> Option<RecordSet> {
        self.read_entries().get(key).and_then(|slot| slot.data.clone())
    }

    pub fn version(&self, key: &QueryKey) -> EntryVersion {
        self.read_entries()
            .get(key)
            .map_or(EntryVersion::zero(), |slot| slot.version)
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.read_entries().contains_key(key)
    }

    pub fn keys(&self) -> Vec<QueryKey> {
        self.read_entries().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    /// Replace an entry's payload, creating the entry if needed.
    ///
    /// Returns the new version. The fetch status is left unchanged.
    pub fn set(&self, key: &QueryKey, data: RecordSet) -> EntryVersion {
        let now = Utc::now();
        let mut entries = self.write_entries();
        let slot = entries
            .entry(key.clone())
            .or_insert_with(|| EntrySlot::new(now));
        let version = self.clock.next();
        slot.write(data, version, now);
        debug!(key = %key, %version, status = ?slot.status, "cache point write");
        self.emit(key, CacheChange::DataSet, slot);
        version
    }

    /// Atomically derive a new payload from the current one.
    ///
    /// `f` sees the current payload and version. Returns `Ok(None)` without
    /// calling `f` when the entry is missing or holds no data. An error from
    /// `f` leaves the entry untouched.
    pub fn modify<F, E>(&self, key: &QueryKey, f: F) -> Result<Option<Modified>, E>
    where
        F: FnOnce(&RecordSet, EntryVersion) -> Result<RecordSet, E>,
    {
        let now = Utc::now();
        let mut entries = self.write_entries();
        let Some(slot) = entries.get_mut(key) else {
            return Ok(None);
        };
        let Some(current) = slot.data.as_ref() else {
            return Ok(None);
        };

        let next = f(current, slot.version)?;
        if next == *current {
            return Ok(Some(Modified {
                previous: current.clone(),
                version: slot.version,
                changed: false,
            }));
        }

        let previous = current.clone();
        let version = self.clock.next();
        slot.write(next, version, now);
        debug!(key = %key, %version, "cache entry modified");
        self.emit(key, CacheChange::DataSet, slot);
        Ok(Some(Modified {
            previous,
            version,
            changed: true,
        }))
    }

    // ------------------------------------------------------------------
    // Fetching
    // ------------------------------------------------------------------

    /// Begin a fetch for `key`, creating the entry if needed.
    ///
    /// Supersedes any fetch already in flight.
    pub fn start_fetch(&self, key: &QueryKey) -> FetchTicket {
        let now = Utc::now();
        let mut entries = self.write_entries();
        let slot = entries
            .entry(key.clone())
            .or_insert_with(|| EntrySlot::new(now));
        let generation = slot.begin_fetch(now);
        debug!(key = %key, generation, "fetch started");
        self.emit(key, CacheChange::FetchStarted, slot);
        FetchTicket {
            key: key.clone(),
            generation,
        }
    }

    /// Mark an existing entry stale and begin a refetch.
    ///
    /// The last payload stays visible while the refetch runs. Returns
    /// `None` if the key has no entry.
    pub fn invalidate(&self, key: &QueryKey) -> Option<FetchTicket> {
        let now = Utc::now();
        let mut entries = self.write_entries();
        let slot = entries.get_mut(key)?;
        let generation = slot.begin_fetch(now);
        slot.invalidated = true;
        debug!(key = %key, generation, "cache entry invalidated");
        self.emit(key, CacheChange::FetchStarted, slot);
        Some(FetchTicket {
            key: key.clone(),
            generation,
        })
    }

    /// Invalidate every entry whose key starts with `prefix`.
    pub fn invalidate_prefix(&self, prefix: &QueryKey) -> Vec<FetchTicket> {
        let now = Utc::now();
        let mut entries = self.write_entries();
        let mut tickets = Vec::new();
        for (key, slot) in entries.iter_mut() {
            if !prefix.is_prefix_of(key) {
                continue;
            }
            let generation = slot.begin_fetch(now);
            slot.invalidated = true;
            self.emit(key, CacheChange::FetchStarted, slot);
            tickets.push(FetchTicket {
                key: key.clone(),
                generation,
            });
        }
        debug!(prefix = %prefix, count = tickets.len(), "cache prefix invalidated");
        tickets
    }

    /// Cancel the fetch in flight for `key`.
    ///
    /// Restores the status held before the fetch began and aborts a spawned
    /// fetch task. A result that lands later is discarded. Returns whether
    /// there was anything to cancel.
    pub fn cancel(&self, key: &QueryKey) -> bool {
        let mut entries = self.write_entries();
        let Some(slot) = entries.get_mut(key) else {
            return false;
        };
        if !slot.cancel_fetch() {
            return false;
        }
        debug!(key = %key, status = ?slot.status, "fetch cancelled");
        self.emit(key, CacheChange::FetchCancelled, slot);
        true
    }

    /// Run the fetch a ticket stands for and apply its result.
    ///
    /// Fails with [`CacheError::FetchCancelled`] if the fetch was cancelled
    /// or superseded while it ran; the entry is then left alone.
    pub async fn resolve(&self, ticket: FetchTicket) -> FinanResult<RecordSet> {
        let result = self.fetcher.fetch(&ticket.key).await;

        let now = Utc::now();
        let mut entries = self.write_entries();
        let slot = match entries.get_mut(&ticket.key) {
            Some(slot) if slot.is_current_fetch(ticket.generation) => slot,
            _ => {
                StatCounters::bump(&self.stats.discarded_fetches);
                debug!(
                    key = %ticket.key,
                    generation = ticket.generation,
                    "discarding result of cancelled fetch"
                );
                return Err(CacheError::FetchCancelled {
                    key: ticket.key.to_string(),
                }
                .into());
            }
        };

        slot.fetch = None;
        slot.last_touched = now;
        match result {
            Ok(data) => {
                if slot.data.as_ref() != Some(&data) {
                    let version = self.clock.next();
                    slot.write(data.clone(), version, now);
                }
                slot.fetched_at = Some(now);
                slot.status = FetchStatus::Success;
                slot.invalidated = false;
                slot.last_error = None;
                StatCounters::bump(&self.stats.fetches);
                debug!(
                    key = %ticket.key,
                    version = %slot.version,
                    records = data.len(),
                    "fetch applied"
                );
                self.emit(&ticket.key, CacheChange::Fetched, slot);
                Ok(data)
            }
            Err(err) => {
                slot.status = FetchStatus::Error;
                slot.last_error = Some(err.to_string());
                StatCounters::bump(&self.stats.fetch_errors);
                debug!(key = %ticket.key, error = %err, "fetch failed");
                self.emit(&ticket.key, CacheChange::FetchFailed, slot);
                Err(err)
            }
        }
    }

    /// Fetch `key` now, creating the entry if needed.
    pub async fn refetch(&self, key: &QueryKey) -> FinanResult<RecordSet> {
        let ticket = self.start_fetch(key);
        self.resolve(ticket).await
    }

    /// Resolve a ticket on a background task.
    ///
    /// Cancelling the ticket's key aborts the task.
    pub fn spawn_resolve(self: &Arc<Self>, ticket: FetchTicket) -> JoinHandle<FinanResult<RecordSet>> {
        let key = ticket.key.clone();
        let generation = ticket.generation;
        let cache = Arc::clone(self);
        let handle = tokio::spawn(async move { cache.resolve(ticket).await });

        let mut entries = self.write_entries();
        if let Some(fetch) = entries
            .get_mut(&key)
            .and_then(|slot| slot.fetch.as_mut())
            .filter(|fetch| fetch.generation == generation)
        {
            fetch.abort = Some(handle.abort_handle());
        }
        handle
    }

    /// Invalidate `key` and refetch it in the background.
    pub fn invalidate_in_background(
        self: &Arc<Self>,
        key: &QueryKey,
    ) -> Option<JoinHandle<FinanResult<RecordSet>>> {
        let ticket = self.invalidate(key)?;
        Some(self.spawn_resolve(ticket))
    }

    /// Read `key`, serving the cached payload if it satisfies `freshness`
    /// and fetching otherwise.
    pub async fn fetch_query(
        &self,
        key: &QueryKey,
        freshness: Freshness,
    ) -> FinanResult<CacheRead<RecordSet>> {
        let now = Utc::now();
        {
            let mut entries = self.write_entries();
            if let Some(slot) = entries.get_mut(key) {
                if let Some(read) = serve_cached(slot, &freshness, now) {
                    slot.last_touched = now;
                    StatCounters::bump(&self.stats.hits);
                    debug!(key = %key, version = %read.version(), "cache hit");
                    return Ok(read);
                }
            }
        }

        StatCounters::bump(&self.stats.misses);
        debug!(key = %key, ?freshness, "cache miss");
        let data = self.refetch(key).await?;
        Ok(CacheRead::from_remote(data, self.version(key)))
    }

    /// [`fetch_query`](Self::fetch_query) using the configured stale time.
    pub async fn query(&self, key: &QueryKey) -> FinanResult<CacheRead<RecordSet>> {
        self.fetch_query(key, Freshness::best_effort(self.config.stale_time))
            .await
    }

    // ------------------------------------------------------------------
    // Mutation bookkeeping
    // ------------------------------------------------------------------

    /// Record that a mutation against `key` has started.
    ///
    /// Returns the number now in flight.
    pub fn begin_mutation(&self, key: &QueryKey) -> usize {
        let now = Utc::now();
        let mut entries = self.write_entries();
        let slot = entries
            .entry(key.clone())
            .or_insert_with(|| EntrySlot::new(now));
        slot.mutations_in_flight += 1;
        slot.last_touched = now;
        slot.mutations_in_flight
    }

    /// Record that a mutation against `key` has settled.
    ///
    /// Returns the number still in flight. A slot that only existed to count
    /// mutations is dropped once the count reaches zero.
    pub fn end_mutation(&self, key: &QueryKey) -> usize {
        let now = Utc::now();
        let mut entries = self.write_entries();
        let Some(slot) = entries.get_mut(key) else {
            return 0;
        };
        slot.mutations_in_flight = slot.mutations_in_flight.saturating_sub(1);
        slot.last_touched = now;
        let remaining = slot.mutations_in_flight;
        if slot.is_vacant() {
            entries.remove(key);
        }
        remaining
    }

    pub fn mutations_in_flight(&self, key: &QueryKey) -> usize {
        self.read_entries()
            .get(key)
            .map_or(0, |slot| slot.mutations_in_flight)
    }

    pub fn record_rollback(&self) {
        StatCounters::bump(&self.stats.rollbacks);
    }

    // ------------------------------------------------------------------
    // Retention
    // ------------------------------------------------------------------

    /// Drop an entry, aborting any fetch task it owns.
    pub fn remove(&self, key: &QueryKey) -> Option<CacheEntry> {
        let mut entries = self.write_entries();
        let mut slot = entries.remove(key)?;
        slot.cancel_fetch();
        debug!(key = %key, "cache entry removed");
        self.emit(key, CacheChange::Removed, &slot);
        Some(slot.view())
    }

    /// Drop entries idle for at least the retention period.
    ///
    /// Entries with a fetch or mutation in flight are kept. Returns the
    /// evicted keys.
    pub fn evict_expired(&self, now: Timestamp) -> Vec<QueryKey> {
        let retention = self.config.retention;
        let mut entries = self.write_entries();
        let expired: Vec<QueryKey> = entries
            .iter()
            .filter(|(_, slot)| !slot.is_busy() && idle_for(slot, now) >= retention)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            if let Some(slot) = entries.remove(key) {
                self.emit(key, CacheChange::Evicted, &slot);
            }
        }
        if !expired.is_empty() {
            StatCounters::add(&self.stats.evictions, expired.len() as u64);
            debug!(count = expired.len(), "evicted idle cache entries");
        }
        expired
    }

    pub fn stats(&self) -> CacheStats {
        let count = self.read_entries().len();
        self.stats.snapshot(count)
    }
}

fn idle_for(slot: &EntrySlot, now: Timestamp) -> Duration {
    (now - slot.last_touched).to_std().unwrap_or(Duration::ZERO)
}

fn serve_cached(
    slot: &EntrySlot,
    freshness: &Freshness,
    now: Timestamp,
) -> Option<CacheRead<RecordSet>> {
    let data = slot.data.as_ref()?;
    let fetched_at = slot.fetched_at?;
    let settled = slot.status == FetchStatus::Success && !slot.invalidated;
    let fresh = freshness.accepts(fetched_at, now, settled);
    fresh.then(|| CacheRead::from_cache(data.clone(), fetched_at, slot.version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use finanboard_core::{FinanError, Record, ShoppingItem, StorageError};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use uuid::Uuid;

    fn owner() -> Uuid {
        Uuid::from_u128(100)
    }

    fn list_id() -> Uuid {
        Uuid::from_u128(200)
    }

    fn item(id: u128, purchased: bool) -> Record {
        Record::ShoppingItem(ShoppingItem {
            id: Uuid::from_u128(id),
            owner_id: owner(),
            list_id: list_id(),
            name: format!("item {}", id),
            quantity: 1,
            purchased,
            created_at: chrono::DateTime::from_timestamp(1_700_000_000 + id as i64, 0).unwrap(),
        })
    }

    fn key() -> QueryKey {
        QueryKey::shopping_items(owner(), list_id())
    }

    #[derive(Default)]
    struct ScriptedFetcher {
        rows: Mutex<RecordSet>,
        fail: AtomicBool,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn with_rows(rows: RecordSet) -> Arc<Self> {
            Arc::new(Self {
                rows: Mutex::new(rows),
                ..Default::default()
            })
        }

        fn set_rows(&self, rows: RecordSet) {
            *self.rows.lock().unwrap() = rows;
        }
    }

    #[async_trait]
    impl QueryFetcher for ScriptedFetcher {
        async fn fetch(&self, _key: &QueryKey) -> FinanResult<RecordSet> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable {
                    reason: "offline".to_string(),
                }
                .into());
            }
            Ok(self.rows.lock().unwrap().clone())
        }
    }

    fn two_items() -> RecordSet {
        vec![item(1, false), item(2, false)].into_iter().collect()
    }

    #[tokio::test]
    async fn test_first_fetch_moves_idle_to_success() {
        let fetcher = ScriptedFetcher::with_rows(two_items());
        let cache = QueryCache::with_defaults(fetcher.clone());

        let ticket = cache.start_fetch(&key());
        let entry = cache.get(&key()).unwrap();
        assert_eq!(entry.status, FetchStatus::Loading);
        assert!(entry.is_empty());

        let data = cache.resolve(ticket).await.unwrap();
        assert_eq!(data, two_items());
        let entry = cache.get(&key()).unwrap();
        assert_eq!(entry.status, FetchStatus::Success);
        assert!(entry.fetched_at.is_some());
        assert!(!entry.invalidated);
    }

    #[tokio::test]
    async fn test_point_write_keeps_status_and_bumps_version() {
        let cache = QueryCache::with_defaults(ScriptedFetcher::with_rows(two_items()));
        cache.refetch(&key()).await.unwrap();
        let before = cache.get(&key()).unwrap();

        let version = cache.set(&key(), vec![item(1, true)].into_iter().collect());
        let after = cache.get(&key()).unwrap();
        assert_eq!(after.status, FetchStatus::Success);
        assert!(version.is_newer_than(&before.version));
        assert_eq!(after.data.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_keeps_stale_value_visible() {
        let fetcher = ScriptedFetcher::with_rows(two_items());
        let cache = QueryCache::with_defaults(fetcher.clone());
        cache.refetch(&key()).await.unwrap();

        fetcher.set_rows(vec![item(1, false)].into_iter().collect());
        let ticket = cache.invalidate(&key()).unwrap();
        let during = cache.get(&key()).unwrap();
        assert_eq!(during.status, FetchStatus::Loading);
        assert!(during.invalidated);
        assert_eq!(during.data.unwrap(), two_items());

        cache.resolve(ticket).await.unwrap();
        let after = cache.get(&key()).unwrap();
        assert_eq!(after.status, FetchStatus::Success);
        assert_eq!(after.data.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_missing_key_is_none() {
        let cache = QueryCache::with_defaults(ScriptedFetcher::with_rows(two_items()));
        assert!(cache.invalidate(&key()).is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_restores_status_and_discards_result() {
        let fetcher = ScriptedFetcher::with_rows(two_items());
        let cache = QueryCache::with_defaults(fetcher.clone());
        cache.refetch(&key()).await.unwrap();

        fetcher.set_rows(RecordSet::new());
        let ticket = cache.invalidate(&key()).unwrap();
        assert!(cache.cancel(&key()));
        assert_eq!(cache.get(&key()).unwrap().status, FetchStatus::Success);

        let err = cache.resolve(ticket).await.unwrap_err();
        assert!(matches!(err, FinanError::Cache(CacheError::FetchCancelled { .. })));
        assert_eq!(cache.data(&key()).unwrap(), two_items());
        assert_eq!(cache.stats().discarded_fetches, 1);
        assert!(!cache.cancel(&key()));
    }

    #[tokio::test]
    async fn test_superseded_fetch_is_discarded() {
        let cache = QueryCache::with_defaults(ScriptedFetcher::with_rows(two_items()));
        let first = cache.start_fetch(&key());
        let second = cache.start_fetch(&key());

        assert!(cache.resolve(first).await.is_err());
        assert!(cache.resolve(second).await.is_ok());
        assert_eq!(cache.get(&key()).unwrap().status, FetchStatus::Success);
    }

    #[tokio::test]
    async fn test_cancel_aborts_spawned_fetch() {
        let fetcher = ScriptedFetcher::with_rows(two_items());
        let cache = Arc::new(QueryCache::with_defaults(fetcher.clone()));
        cache.set(&key(), two_items());

        let handle = cache.invalidate_in_background(&key()).unwrap();
        assert!(cache.cancel(&key()));
        let joined = handle.await;
        assert!(joined.unwrap_err().is_cancelled());
        assert_eq!(cache.get(&key()).unwrap().status, FetchStatus::Idle);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_last_value() {
        let fetcher = ScriptedFetcher::with_rows(two_items());
        let cache = QueryCache::with_defaults(fetcher.clone());
        cache.refetch(&key()).await.unwrap();

        fetcher.fail.store(true, Ordering::SeqCst);
        assert!(cache.refetch(&key()).await.is_err());
        let entry = cache.get(&key()).unwrap();
        assert_eq!(entry.status, FetchStatus::Error);
        assert_eq!(entry.data.unwrap(), two_items());
        assert!(entry.last_error.unwrap().contains("offline"));
        assert_eq!(cache.stats().fetch_errors, 1);
    }

    #[tokio::test]
    async fn test_fetch_query_consistent_hits_after_success() {
        let fetcher = ScriptedFetcher::with_rows(two_items());
        let cache = QueryCache::with_defaults(fetcher.clone());

        let first = cache.fetch_query(&key(), Freshness::consistent()).await.unwrap();
        assert!(first.was_cache_miss());
        let second = cache.fetch_query(&key(), Freshness::consistent()).await.unwrap();
        assert!(second.was_cache_hit());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        let _ticket = cache.invalidate(&key());
        cache.cancel(&key());
        let third = cache.fetch_query(&key(), Freshness::consistent()).await.unwrap();
        assert!(third.was_cache_miss());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
    }

    #[tokio::test]
    async fn test_fetch_query_best_effort_serves_invalidated_data() {
        let fetcher = ScriptedFetcher::with_rows(two_items());
        let cache = QueryCache::with_defaults(fetcher.clone());
        cache.refetch(&key()).await.unwrap();
        let _ticket = cache.invalidate(&key());

        let read = cache
            .fetch_query(&key(), Freshness::best_effort(Duration::from_secs(60)))
            .await
            .unwrap();
        assert!(read.was_cache_hit());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_point_write_alone_is_not_fresh() {
        let fetcher = ScriptedFetcher::with_rows(two_items());
        let cache = QueryCache::with_defaults(fetcher.clone());
        cache.set(&key(), RecordSet::new());

        let read = cache.fetch_query(&key(), Freshness::consistent()).await.unwrap();
        assert!(read.was_cache_miss());
        assert_eq!(read.into_value(), two_items());
    }

    #[tokio::test]
    async fn test_invalidate_prefix_reaches_all_months() {
        let cache = QueryCache::with_defaults(ScriptedFetcher::with_rows(RecordSet::new()));
        let march = QueryKey::budgets(owner(), 3, 2024);
        let april = QueryKey::budgets(owner(), 4, 2024);
        let bills = QueryKey::bills(owner());
        for key in [&march, &april, &bills] {
            cache.set(key, RecordSet::new());
        }

        let prefix = QueryKey::new(finanboard_core::EntityKind::Budget, owner());
        let tickets = cache.invalidate_prefix(&prefix);
        assert_eq!(tickets.len(), 2);
        assert!(cache.get(&march).unwrap().invalidated);
        assert!(cache.get(&april).unwrap().invalidated);
        assert!(!cache.get(&bills).unwrap().invalidated);
    }

    #[tokio::test]
    async fn test_modify_error_leaves_entry_untouched() {
        let cache = QueryCache::with_defaults(ScriptedFetcher::with_rows(RecordSet::new()));
        let version = cache.set(&key(), two_items());

        let result: Result<Option<Modified>, &str> = cache.modify(&key(), |_, _| Err("nope"));
        assert_eq!(result.unwrap_err(), "nope");
        assert_eq!(cache.version(&key()), version);

        let unchanged = cache
            .modify::<_, ()>(&key(), |current, _| Ok(current.clone()))
            .unwrap()
            .unwrap();
        assert!(!unchanged.changed);
        assert_eq!(unchanged.version, version);

        let missing = cache
            .modify::<_, ()>(&QueryKey::bills(owner()), |current, _| Ok(current.clone()))
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_events_are_published() {
        let cache = QueryCache::with_defaults(ScriptedFetcher::with_rows(two_items()));
        let mut events = cache.subscribe();

        cache.refetch(&key()).await.unwrap();
        cache.set(&key(), RecordSet::new());

        let started = events.recv().await.unwrap();
        assert_eq!(started.change, CacheChange::FetchStarted);
        assert_eq!(started.status, FetchStatus::Loading);
        let fetched = events.recv().await.unwrap();
        assert_eq!(fetched.change, CacheChange::Fetched);
        assert_eq!(fetched.data.unwrap(), two_items());
        let set = events.recv().await.unwrap();
        assert_eq!(set.change, CacheChange::DataSet);
    }

    #[tokio::test]
    async fn test_evict_expired_skips_busy_entries() {
        let cache = QueryCache::new(
            ScriptedFetcher::with_rows(RecordSet::new()),
            CacheConfig::new().with_retention(Duration::from_secs(60)),
        );
        let idle = QueryKey::bills(owner());
        let busy = QueryKey::categories(owner());
        cache.set(&idle, RecordSet::new());
        cache.set(&busy, RecordSet::new());
        cache.begin_mutation(&busy);

        let later = Utc::now() + chrono::Duration::seconds(61);
        assert!(cache.evict_expired(Utc::now()).is_empty());
        let evicted = cache.evict_expired(later);
        assert_eq!(evicted, vec![idle.clone()]);
        assert!(cache.contains(&busy));
        assert_eq!(cache.stats().evictions, 1);

        assert_eq!(cache.end_mutation(&busy), 0);
        assert_eq!(cache.evict_expired(later), vec![busy]);
    }

    #[tokio::test]
    async fn test_mutation_counter() {
        let cache = QueryCache::with_defaults(ScriptedFetcher::with_rows(RecordSet::new()));
        assert_eq!(cache.begin_mutation(&key()), 1);
        assert_eq!(cache.begin_mutation(&key()), 2);
        assert_eq!(cache.mutations_in_flight(&key()), 2);
        assert_eq!(cache.end_mutation(&key()), 1);
        assert_eq!(cache.end_mutation(&key()), 0);
        assert_eq!(cache.end_mutation(&key()), 0);
    }

    #[tokio::test]
    async fn test_settled_mutation_on_unread_key_leaves_no_entry() {
        let cache = QueryCache::with_defaults(ScriptedFetcher::with_rows(two_items()));
        cache.begin_mutation(&key());
        assert!(cache.contains(&key()));
        assert_eq!(cache.end_mutation(&key()), 0);
        assert!(!cache.contains(&key()));
        assert!(cache.invalidate(&key()).is_none());

        // A first load started meanwhile keeps the slot.
        cache.begin_mutation(&key());
        let ticket = cache.start_fetch(&key());
        assert_eq!(cache.end_mutation(&key()), 0);
        assert!(cache.contains(&key()));
        assert_eq!(cache.resolve(ticket).await.unwrap(), two_items());
    }

    #[test]
    fn test_cache_config_from_app_config() {
        let app = AppConfig {
            stale_time: Duration::from_secs(5),
            event_capacity: 8,
            ..Default::default()
        };
        let config = CacheConfig::from(&app);
        assert_eq!(config.stale_time, Duration::from_secs(5));
        assert_eq!(config.event_capacity, 8);
        assert_eq!(config.retention, app.retention);
    }
}
