//! Optimistic update strategies.
//!
//! A strategy computes the provisional value of a cache entry before the
//! remote write resolves. Strategies are pure: the output depends only on
//! the input set and the strategy's own parameters.
//!
//! Each strategy can also undo its own change on a set that other writers
//! may have modified since, which the versioned rollback policy uses.

use finanboard_core::{
    EntityId, FinanResult, Record, RecordPatch, RecordSet, ValidationError,
};
use std::fmt;
use std::sync::Arc;

/// Computes a provisional cache value for one mutation.
pub trait OptimisticStrategy: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Id of the record this strategy touches.
    fn target_id(&self) -> EntityId;

    /// Provisional value derived from `current`.
    fn apply(&self, current: &RecordSet) -> FinanResult<RecordSet>;

    /// Undo this strategy's change on `current`, taking original values
    /// from `snapshot`. Records this strategy did not touch are kept as
    /// they are in `current`.
    fn revert(&self, current: &RecordSet, snapshot: &RecordSet) -> RecordSet;
}

/// Merge a patch into one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldUpdate {
    pub id: EntityId,
    pub patch: RecordPatch,
}

impl FieldUpdate {
    pub fn new(id: EntityId, patch: impl Into<RecordPatch>) -> Self {
        Self {
            id,
            patch: patch.into(),
        }
    }
}

impl OptimisticStrategy for FieldUpdate {
    fn name(&self) -> &'static str {
        "field_update"
    }

    fn target_id(&self) -> EntityId {
        self.id
    }

    fn apply(&self, current: &RecordSet) -> FinanResult<RecordSet> {
        let Some(index) = current.position(self.id) else {
            // Unknown id leaves the set alone, but a patch for another
            // kind is still a caller error.
            if let Some(first) = current.iter().next() {
                if first.kind() != self.patch.kind() {
                    return Err(ValidationError::PatchKindMismatch {
                        expected: first.kind(),
                        got: self.patch.kind(),
                    }
                    .into());
                }
            }
            return Ok(current.clone());
        };

        let Some(record) = current.get(index) else {
            return Ok(current.clone());
        };
        let updated = record.apply_patch(&self.patch)?;
        if updated == **record {
            return Ok(current.clone());
        }
        Ok(current.with_replaced(index, updated))
    }

    fn revert(&self, current: &RecordSet, snapshot: &RecordSet) -> RecordSet {
        let (Some(index), Some(original)) = (current.position(self.id), snapshot.find(self.id))
        else {
            return current.clone();
        };
        let Some(record) = current.get(index) else {
            return current.clone();
        };
        match record.restore_fields(original, &self.patch) {
            Ok(restored) if restored == **original => {
                current.with_replaced_shared(index, Arc::clone(original))
            }
            Ok(restored) => current.with_replaced(index, restored),
            Err(_) => current.clone(),
        }
    }
}

/// Remove one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deletion {
    pub id: EntityId,
}

impl Deletion {
    pub fn new(id: EntityId) -> Self {
        Self { id }
    }
}

impl OptimisticStrategy for Deletion {
    fn name(&self) -> &'static str {
        "deletion"
    }

    fn target_id(&self) -> EntityId {
        self.id
    }

    fn apply(&self, current: &RecordSet) -> FinanResult<RecordSet> {
        Ok(match current.position(self.id) {
            Some(index) => current.with_removed(index),
            None => current.clone(),
        })
    }

    fn revert(&self, current: &RecordSet, snapshot: &RecordSet) -> RecordSet {
        if current.contains(self.id) {
            return current.clone();
        }
        let Some(original_index) = snapshot.position(self.id) else {
            return current.clone();
        };
        let Some(original) = snapshot.get(original_index) else {
            return current.clone();
        };

        // Put it back after the closest earlier neighbour that still exists.
        let insert_at = (0..original_index)
            .rev()
            .filter_map(|i| snapshot.get(i))
            .find_map(|neighbour| current.position(neighbour.id()))
            .map_or(0, |i| i + 1);
        current.with_inserted(insert_at, Arc::clone(original))
    }
}

/// Append a provisional record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insertion {
    pub record: Record,
}

impl Insertion {
    pub fn new(record: impl Into<Record>) -> Self {
        Self {
            record: record.into(),
        }
    }
}

impl OptimisticStrategy for Insertion {
    fn name(&self) -> &'static str {
        "insertion"
    }

    fn target_id(&self) -> EntityId {
        self.record.id()
    }

    fn apply(&self, current: &RecordSet) -> FinanResult<RecordSet> {
        if current.contains(self.record.id()) {
            return Ok(current.clone());
        }
        Ok(current.with_pushed(self.record.clone()))
    }

    fn revert(&self, current: &RecordSet, snapshot: &RecordSet) -> RecordSet {
        let id = self.record.id();
        if snapshot.contains(id) {
            return current.clone();
        }
        match current.position(id) {
            Some(index) => current.with_removed(index),
            None => current.clone(),
        }
    }
}
