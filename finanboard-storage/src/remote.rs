//! Remote store contract.
//!
//! The hosted database is reached through four CRUD calls against a named
//! collection. Implementations validate rows into typed records before
//! returning them.

use ::async_trait::async_trait;
use finanboard_core::{EntityId, EntityKind, FinanResult, Record, RecordFilter, RecordPatch};
use std::fmt;

/// Async CRUD access to the remote collections.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Read every row of `kind` that matches `filter`, in creation order.
    async fn read(&self, kind: EntityKind, filter: &RecordFilter) -> FinanResult<Vec<Record>>;

    /// Insert a record into the collection of `kind`, returning the stored row.
    async fn insert(&self, kind: EntityKind, record: Record) -> FinanResult<Record>;

    /// Apply a patch to one row, returning the updated row.
    async fn update(
        &self,
        kind: EntityKind,
        id: EntityId,
        patch: RecordPatch,
    ) -> FinanResult<Record>;

    /// Delete one row.
    async fn delete(&self, kind: EntityKind, id: EntityId) -> FinanResult<()>;
}

/// A single remote write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Insert(Record),
    Update {
        kind: EntityKind,
        id: EntityId,
        patch: RecordPatch,
    },
    Delete {
        kind: EntityKind,
        id: EntityId,
    },
}

/// What a successful [`WriteOp`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted(Record),
    Updated(Record),
    Deleted { kind: EntityKind, id: EntityId },
}

impl WriteOp {
    pub fn insert(record: impl Into<Record>) -> Self {
        WriteOp::Insert(record.into())
    }

    pub fn update(id: EntityId, patch: impl Into<RecordPatch>) -> Self {
        let patch = patch.into();
        WriteOp::Update {
            kind: patch.kind(),
            id,
            patch,
        }
    }

    pub fn delete(kind: EntityKind, id: EntityId) -> Self {
        WriteOp::Delete { kind, id }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            WriteOp::Insert(record) => record.kind(),
            WriteOp::Update { kind, .. } | WriteOp::Delete { kind, .. } => *kind,
        }
    }

    /// Id of the row this write targets.
    pub fn target_id(&self) -> EntityId {
        match self {
            WriteOp::Insert(record) => record.id(),
            WriteOp::Update { id, .. } | WriteOp::Delete { id, .. } => *id,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            WriteOp::Insert(_) => "insert",
            WriteOp::Update { .. } => "update",
            WriteOp::Delete { .. } => "delete",
        }
    }

    /// Issue this write against `store`. Exactly one call is made.
    pub async fn execute(self, store: &dyn RemoteStore) -> FinanResult<WriteOutcome> {
        match self {
            WriteOp::Insert(record) => {
                let kind = record.kind();
                store.insert(kind, record).await.map(WriteOutcome::Inserted)
            }
            WriteOp::Update { kind, id, patch } => {
                store.update(kind, id, patch).await.map(WriteOutcome::Updated)
            }
            WriteOp::Delete { kind, id } => {
                store.delete(kind, id).await?;
                Ok(WriteOutcome::Deleted { kind, id })
            }
        }
    }
}

impl fmt::Display for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.verb(), self.kind(), self.target_id())
    }
}

impl WriteOutcome {
    /// The row returned by an insert or update.
    pub fn record(&self) -> Option<&Record> {
        match self {
            WriteOutcome::Inserted(record) | WriteOutcome::Updated(record) => Some(record),
            WriteOutcome::Deleted { .. } => None,
        }
    }
}
