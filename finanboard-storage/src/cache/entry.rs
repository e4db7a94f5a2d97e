//! Cache entry state.

use finanboard_core::{FetchStatus, RecordSet, Timestamp};
use tokio::task::AbortHandle;

use super::version::EntryVersion;

/// Point-in-time view of one cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Last known payload. `None` until the first fetch or point write.
    pub data: Option<RecordSet>,
    pub status: FetchStatus,
    pub version: EntryVersion,
    /// When the payload last changed for any reason.
    pub updated_at: Option<Timestamp>,
    /// When the payload was last replaced by a successful fetch.
    pub fetched_at: Option<Timestamp>,
    pub last_error: Option<String>,
    /// Set by invalidation, cleared by the next successful fetch.
    pub invalidated: bool,
    pub fetching: bool,
    pub mutations_in_flight: usize,
}

impl CacheEntry {
    pub fn is_empty(&self) -> bool {
        self.data.is_none()
    }
}

pub(crate) struct InFlightFetch {
    pub(crate) generation: u64,
    /// Status to restore if this fetch is cancelled.
    pub(crate) status_before: FetchStatus,
    pub(crate) abort: Option<AbortHandle>,
}

pub(crate) struct EntrySlot {
    pub(crate) data: Option<RecordSet>,
    pub(crate) status: FetchStatus,
    pub(crate) version: EntryVersion,
    pub(crate) updated_at: Option<Timestamp>,
    pub(crate) fetched_at: Option<Timestamp>,
    pub(crate) last_error: Option<String>,
    pub(crate) invalidated: bool,
    pub(crate) last_touched: Timestamp,
    pub(crate) fetch: Option<InFlightFetch>,
    pub(crate) next_generation: u64,
    pub(crate) mutations_in_flight: usize,
}

impl EntrySlot {
    pub(crate) fn new(now: Timestamp) -> Self {
        Self {
            data: None,
            status: FetchStatus::Idle,
            version: EntryVersion::zero(),
            updated_at: None,
            fetched_at: None,
            last_error: None,
            invalidated: false,
            last_touched: now,
            fetch: None,
            next_generation: 0,
            mutations_in_flight: 0,
        }
    }

    pub(crate) fn view(&self) -> CacheEntry {
        CacheEntry {
            data: self.data.clone(),
            status: self.status,
            version: self.version,
            updated_at: self.updated_at,
            fetched_at: self.fetched_at,
            last_error: self.last_error.clone(),
            invalidated: self.invalidated,
            fetching: self.fetch.is_some(),
            mutations_in_flight: self.mutations_in_flight,
        }
    }

    /// Point write. Leaves the fetch status alone.
    pub(crate) fn write(&mut self, data: RecordSet, version: EntryVersion, now: Timestamp) {
        self.data = Some(data);
        self.version = version;
        self.updated_at = Some(now);
        self.last_touched = now;
    }

    /// Start a new fetch generation, superseding any fetch in flight.
    pub(crate) fn begin_fetch(&mut self, now: Timestamp) -> u64 {
        let status_before = match self.fetch.take() {
            Some(previous) => {
                if let Some(abort) = previous.abort {
                    abort.abort();
                }
                previous.status_before
            }
            None => self.status,
        };
        self.next_generation += 1;
        let generation = self.next_generation;
        self.fetch = Some(InFlightFetch {
            generation,
            status_before,
            abort: None,
        });
        self.status = FetchStatus::Loading;
        self.last_touched = now;
        generation
    }

    /// Drop the in-flight fetch and restore the status held before it.
    pub(crate) fn cancel_fetch(&mut self) -> bool {
        match self.fetch.take() {
            Some(fetch) => {
                if let Some(abort) = fetch.abort {
                    abort.abort();
                }
                self.status = fetch.status_before;
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_current_fetch(&self, generation: u64) -> bool {
        self.fetch
            .as_ref()
            .map_or(false, |fetch| fetch.generation == generation)
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.fetch.is_some() || self.mutations_in_flight > 0
    }

    /// Nothing was ever loaded into the slot and nothing is using it.
    pub(crate) fn is_vacant(&self) -> bool {
        !self.is_busy() && self.data.is_none() && self.fetched_at.is_none() && self.last_error.is_none()
    }
}
