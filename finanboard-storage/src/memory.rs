//! In-memory remote store.
//!
//! Holds each collection as schemaless JSON rows, the way the hosted
//! database hands them to a client, and validates them into typed records
//! on every read and write. Supports simulated latency and one-shot or
//! sticky fault injection for tests and the demo binary.

use ::async_trait::async_trait;
use finanboard_core::{
    EntityId, EntityKind, FinanResult, Record, RecordFilter, RecordPatch, StorageError,
    ValidationError,
};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;
use tracing::debug;

use crate::RemoteStore;

#[derive(Debug, Default)]
struct FaultPlan {
    /// Consumed one per write attempt.
    write_failures: VecDeque<StorageError>,
    /// Returned by every read while set.
    read_failure: Option<StorageError>,
}

/// Remote store backed by in-process JSON rows.
#[derive(Debug, Default)]
pub struct InMemoryRemoteStore {
    collections: RwLock<HashMap<EntityKind, Vec<Value>>>,
    faults: Mutex<FaultPlan>,
    latency_nanos: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
}

fn row_id(row: &Value) -> Option<EntityId> {
    row.get("id")?.as_str()?.parse().ok()
}

fn position_of(rows: &[Value], id: EntityId) -> Option<usize> {
    rows.iter().position(|row| row_id(row) == Some(id))
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(latency);
        self
    }

    pub fn set_latency(&self, latency: Duration) {
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        self.latency_nanos.store(nanos, Ordering::Relaxed);
    }

    pub fn latency(&self) -> Duration {
        Duration::from_nanos(self.latency_nanos.load(Ordering::Relaxed))
    }

    /// Insert rows directly, bypassing latency, faults and counters.
    pub fn seed<I>(&self, records: I) -> FinanResult<()>
    where
        I: IntoIterator<Item = Record>,
    {
        for record in records {
            self.store_new(record.kind(), &record)?;
        }
        Ok(())
    }

    /// Every row of a collection, decoded, in creation order.
    pub fn rows(&self, kind: EntityKind) -> FinanResult<Vec<Record>> {
        self.decode_matching(kind, &RecordFilter::default())
    }

    /// Fail the next write attempt with `error`. Calls queue up.
    pub fn fail_next_write(&self, error: StorageError) -> FinanResult<()> {
        let mut faults = self.faults.lock().map_err(|_| StorageError::LockPoisoned)?;
        faults.write_failures.push_back(error);
        Ok(())
    }

    /// Fail every read with `error` until cleared with `None`.
    pub fn fail_reads(&self, error: Option<StorageError>) -> FinanResult<()> {
        let mut faults = self.faults.lock().map_err(|_| StorageError::LockPoisoned)?;
        faults.read_failure = error;
        Ok(())
    }

    /// Number of write attempts, including failed ones.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    async fn simulate_latency(&self) {
        let latency = self.latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn take_write_failure(&self) -> FinanResult<()> {
        let mut faults = self.faults.lock().map_err(|_| StorageError::LockPoisoned)?;
        match faults.write_failures.pop_front() {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }

    fn check_read_failure(&self) -> FinanResult<()> {
        let faults = self.faults.lock().map_err(|_| StorageError::LockPoisoned)?;
        match &faults.read_failure {
            Some(error) => Err(error.clone().into()),
            None => Ok(()),
        }
    }

    fn decode_matching(&self, kind: EntityKind, filter: &RecordFilter) -> FinanResult<Vec<Record>> {
        let rows = {
            let collections = self
                .collections
                .read()
                .map_err(|_| StorageError::LockPoisoned)?;
            collections.get(&kind).cloned().unwrap_or_default()
        };

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let record = Record::from_row(kind, row)?;
            if record.matches(filter) {
                records.push(record);
            }
        }
        records.sort_by_key(|record| (record.created_at(), record.id()));
        Ok(records)
    }

    fn store_new(&self, kind: EntityKind, record: &Record) -> FinanResult<Record> {
        if record.kind() != kind {
            return Err(ValidationError::KindMismatch {
                expected: kind,
                got: record.kind(),
            }
            .into());
        }
        record.validate()?;
        let row = record.to_row()?;

        let mut collections = self
            .collections
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        let rows = collections.entry(kind).or_default();
        if position_of(rows, record.id()).is_some() {
            return Err(StorageError::InsertFailed {
                kind,
                reason: format!("duplicate id {}", record.id()),
            }
            .into());
        }
        rows.push(row.clone());
        Ok(Record::from_row(kind, row)?)
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn read(&self, kind: EntityKind, filter: &RecordFilter) -> FinanResult<Vec<Record>> {
        self.simulate_latency().await;
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.check_read_failure()?;
        let records = self.decode_matching(kind, filter)?;
        debug!(collection = %kind, rows = records.len(), "remote read");
        Ok(records)
    }

    async fn insert(&self, kind: EntityKind, record: Record) -> FinanResult<Record> {
        self.simulate_latency().await;
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.take_write_failure()?;
        let stored = self.store_new(kind, &record)?;
        debug!(collection = %kind, id = %stored.id(), "remote insert");
        Ok(stored)
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: EntityId,
        patch: RecordPatch,
    ) -> FinanResult<Record> {
        self.simulate_latency().await;
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.take_write_failure()?;

        if patch.kind() != kind {
            return Err(ValidationError::PatchKindMismatch {
                expected: kind,
                got: patch.kind(),
            }
            .into());
        }

        let mut collections = self
            .collections
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        let rows = collections
            .get_mut(&kind)
            .ok_or(StorageError::NotFound { kind, id })?;
        let index = position_of(rows, id).ok_or(StorageError::NotFound { kind, id })?;

        let current = Record::from_row(kind, rows[index].clone())?;
        let updated = current.apply_patch(&patch)?;
        updated.validate()?;
        rows[index] = updated.to_row()?;
        debug!(collection = %kind, id = %id, "remote update");
        Ok(updated)
    }

    async fn delete(&self, kind: EntityKind, id: EntityId) -> FinanResult<()> {
        self.simulate_latency().await;
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.take_write_failure()?;

        let mut collections = self
            .collections
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        let rows = collections
            .get_mut(&kind)
            .ok_or(StorageError::NotFound { kind, id })?;
        let index = position_of(rows, id).ok_or(StorageError::NotFound { kind, id })?;
        rows.remove(index);
        debug!(collection = %kind, id = %id, "remote delete");
        Ok(())
    }
}
