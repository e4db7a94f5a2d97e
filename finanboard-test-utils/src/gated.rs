//! A remote store whose writes wait for the test to release them.
//!
//! Reads go straight to the wrapped in-memory store. Each write parks until
//! [`GatedRemoteStore::release`] commits or rejects it, which lets a test
//! pick the exact order in which concurrent mutations settle.

use async_trait::async_trait;
use finanboard_core::{
    EntityId, EntityKind, FinanResult, Record, RecordFilter, RecordPatch, StorageError,
};
use finanboard_storage::{InMemoryRemoteStore, RemoteStore};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{oneshot, watch};

/// How a parked write ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Pass the write on to the wrapped store.
    Commit,
    /// Fail the write without touching the wrapped store.
    Reject(StorageError),
}

struct ParkedWrite {
    target: EntityId,
    release: oneshot::Sender<GateDecision>,
}

pub struct GatedRemoteStore {
    inner: Arc<InMemoryRemoteStore>,
    parked: Mutex<Vec<ParkedWrite>>,
    parked_count: watch::Sender<usize>,
}

impl GatedRemoteStore {
    pub fn new(inner: Arc<InMemoryRemoteStore>) -> Self {
        let (parked_count, _) = watch::channel(0);
        Self {
            inner,
            parked: Mutex::new(Vec::new()),
            parked_count,
        }
    }

    pub fn inner(&self) -> &Arc<InMemoryRemoteStore> {
        &self.inner
    }

    /// Number of writes waiting for release.
    pub fn parked(&self) -> usize {
        *self.parked_count.borrow()
    }

    /// Wait until at least `count` writes are parked.
    pub async fn wait_parked(&self, count: usize) {
        let mut rx = self.parked_count.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|parked| *parked >= count).await;
    }

    /// Release the oldest parked write targeting `target`.
    ///
    /// Returns false if no such write is parked.
    pub fn release(&self, target: EntityId, decision: GateDecision) -> bool {
        let parked = {
            let mut parked = self.parked.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(index) = parked.iter().position(|write| write.target == target) else {
                return false;
            };
            let write = parked.remove(index);
            self.parked_count.send_replace(parked.len());
            write
        };
        parked.release.send(decision).is_ok()
    }

    async fn gate(&self, target: EntityId) -> FinanResult<()> {
        let (release, decision) = oneshot::channel();
        {
            let mut parked = self.parked.lock().unwrap_or_else(PoisonError::into_inner);
            parked.push(ParkedWrite { target, release });
            self.parked_count.send_replace(parked.len());
        }
        match decision.await {
            Ok(GateDecision::Commit) => Ok(()),
            Ok(GateDecision::Reject(err)) => Err(err.into()),
            Err(_) => Err(StorageError::Unavailable {
                reason: "gate dropped before release".to_string(),
            }
            .into()),
        }
    }
}

#[async_trait]
impl RemoteStore for GatedRemoteStore {
    async fn read(&self, kind: EntityKind, filter: &RecordFilter) -> FinanResult<Vec<Record>> {
        self.inner.read(kind, filter).await
    }

    async fn insert(&self, kind: EntityKind, record: Record) -> FinanResult<Record> {
        self.gate(record.id()).await?;
        self.inner.insert(kind, record).await
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: EntityId,
        patch: RecordPatch,
    ) -> FinanResult<Record> {
        self.gate(id).await?;
        self.inner.update(kind, id, patch).await
    }

    async fn delete(&self, kind: EntityKind, id: EntityId) -> FinanResult<()> {
        self.gate(id).await?;
        self.inner.delete(kind, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use finanboard_core::ShoppingItemPatch;

    #[tokio::test]
    async fn test_write_waits_for_release() {
        let inner = fixtures::seeded_store(fixtures::shopping_items(2));
        let gated = Arc::new(GatedRemoteStore::new(inner.clone()));

        let task = {
            let gated = gated.clone();
            tokio::spawn(async move {
                gated
                    .update(
                        EntityKind::ShoppingItem,
                        fixtures::id(1),
                        ShoppingItemPatch::purchased(true).into(),
                    )
                    .await
            })
        };
        gated.wait_parked(1).await;
        assert_eq!(inner.write_count(), 0);
        assert!(!gated.release(fixtures::id(2), GateDecision::Commit));
        assert!(gated.release(fixtures::id(1), GateDecision::Commit));

        let updated = task.await.unwrap().unwrap();
        assert!(updated.as_shopping_item().unwrap().purchased);
        assert_eq!(gated.parked(), 0);
    }

    #[tokio::test]
    async fn test_rejected_write_skips_inner_store() {
        let inner = fixtures::seeded_store(fixtures::shopping_items(1));
        let gated = Arc::new(GatedRemoteStore::new(inner.clone()));

        let task = {
            let gated = gated.clone();
            tokio::spawn(async move { gated.delete(EntityKind::ShoppingItem, fixtures::id(1)).await })
        };
        gated.wait_parked(1).await;
        gated.release(
            fixtures::id(1),
            GateDecision::Reject(StorageError::Unauthorized {
                reason: "row level security".to_string(),
            }),
        );

        assert!(task.await.unwrap().is_err());
        assert_eq!(inner.write_count(), 0);
        assert_eq!(inner.rows(EntityKind::ShoppingItem).unwrap().len(), 1);
    }
}
