//! Ordered, shared record sets held by cache entries

use crate::{EntityId, Record};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// An ordered sequence of shared records.
///
/// Records are held behind `Arc` so a derived set shares every record it
/// did not change with the set it was derived from. Equality compares
/// records by value; use [`RecordSet::shares_record`] to check sharing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSet {
    records: Vec<Arc<Record>>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_shared(records: Vec<Arc<Record>>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Record>> {
        self.records.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Record>> {
        self.records.get(index)
    }

    pub fn position(&self, id: EntityId) -> Option<usize> {
        self.records.iter().position(|r| r.id() == id)
    }

    pub fn find(&self, id: EntityId) -> Option<&Arc<Record>> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.position(id).is_some()
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.records.iter().map(|r| r.id()).collect()
    }

    /// Whether the record at `index` is the same allocation in both sets.
    pub fn shares_record(&self, other: &RecordSet, index: usize) -> bool {
        match (self.records.get(index), other.records.get(index)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Copy of this set with the record at `index` replaced.
    pub fn with_replaced(&self, index: usize, record: Record) -> RecordSet {
        self.with_replaced_shared(index, Arc::new(record))
    }

    /// Like [`RecordSet::with_replaced`], reusing an existing allocation.
    pub fn with_replaced_shared(&self, index: usize, record: Arc<Record>) -> RecordSet {
        let mut records = self.records.clone();
        if let Some(slot) = records.get_mut(index) {
            *slot = record;
        }
        RecordSet { records }
    }

    /// Copy of this set without the record at `index`.
    pub fn with_removed(&self, index: usize) -> RecordSet {
        let mut records = self.records.clone();
        if index < records.len() {
            records.remove(index);
        }
        RecordSet { records }
    }

    /// Copy of this set with `record` inserted at `index` (clamped to the end).
    pub fn with_inserted(&self, index: usize, record: Arc<Record>) -> RecordSet {
        let mut records = self.records.clone();
        let at = index.min(records.len());
        records.insert(at, record);
        RecordSet { records }
    }

    pub fn with_pushed(&self, record: Record) -> RecordSet {
        let mut records = self.records.clone();
        records.push(Arc::new(record));
        RecordSet { records }
    }

    pub fn into_inner(self) -> Vec<Arc<Record>> {
        self.records
    }
}

impl FromIterator<Record> for RecordSet {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().map(Arc::new).collect(),
        }
    }
}

impl FromIterator<Arc<Record>> for RecordSet {
    fn from_iter<I: IntoIterator<Item = Arc<Record>>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a Arc<Record>;
    type IntoIter = std::slice::Iter<'a, Arc<Record>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ShoppingList;
    use chrono::Utc;
    use uuid::Uuid;

    fn list(id: u128) -> Record {
        Record::ShoppingList(ShoppingList {
            id: Uuid::from_u128(id),
            owner_id: Uuid::from_u128(1),
            name: format!("list {}", id),
            created_at: Utc::now(),
        })
    }

    #[test]
    fn test_with_removed_shares_remaining_records() {
        let set: RecordSet = vec![list(1), list(2), list(3)].into_iter().collect();
        let removed = set.with_removed(1);
        assert_eq!(removed.ids(), vec![Uuid::from_u128(1), Uuid::from_u128(3)]);
        assert!(removed.shares_record(&set, 0));
        assert!(Arc::ptr_eq(removed.get(1).unwrap(), set.get(2).unwrap()));
    }

    #[test]
    fn test_record_set_json_shape() {
        let set: RecordSet = vec![list(1), list(2)].into_iter().collect();
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json["records"].as_array().map(Vec::len), Some(2));

        let back: RecordSet = serde_json::from_value(json).unwrap();
        assert_eq!(back, set);
        assert!(!back.shares_record(&set, 0));
    }

    #[test]
    fn test_with_replaced_out_of_range_is_noop() {
        let set: RecordSet = vec![list(1)].into_iter().collect();
        let same = set.with_replaced(5, list(9));
        assert_eq!(same, set);
        assert!(same.shares_record(&set, 0));
    }

    #[test]
    fn test_with_inserted_clamps_to_end() {
        let set: RecordSet = vec![list(1)].into_iter().collect();
        let grown = set.with_inserted(10, Arc::new(list(2)));
        assert_eq!(grown.ids(), vec![Uuid::from_u128(1), Uuid::from_u128(2)]);
    }

    #[test]
    fn test_find_and_position() {
        let set: RecordSet = vec![list(1), list(2)].into_iter().collect();
        assert_eq!(set.position(Uuid::from_u128(2)), Some(1));
        assert!(set.find(Uuid::from_u128(3)).is_none());
        assert!(set.contains(Uuid::from_u128(1)));
    }
}
