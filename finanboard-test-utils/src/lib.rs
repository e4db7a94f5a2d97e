//! FinanBoard Test Utilities
//!
//! Shared test infrastructure for the FinanBoard workspace:
//! - Proptest generators for records, record sets and patches
//! - Fixtures with fixed ids and timestamps
//! - Assertions for FinanBoard errors and derived record sets
//! - A remote store that holds writes until the test releases them

pub mod gated;

pub use gated::{GateDecision, GatedRemoteStore};

pub use finanboard_core::{
    Bill, BillRecurrence, Budget, Category, CategoryKind, EntityId, EntityKind, FinanError,
    FinanResult, KanbanColumn, KanbanTask, OwnerId, QueryKey, Record, RecordSet, ShoppingItem,
    ShoppingItemPatch, ShoppingList, StorageError, Timestamp, Transaction, TransactionKind,
    ValidationError,
};
pub use finanboard_storage::{CacheConfig, InMemoryRemoteStore, QueryCache, StoreFetcher};

use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for FinanBoard records.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<u128>().prop_map(Uuid::from_u128)
    }

    /// Timestamps between 2020 and 2030.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    pub fn arb_item_name() -> impl Strategy<Value = String> {
        "[a-z][a-z ]{0,15}".prop_map(String::from)
    }

    pub fn arb_shopping_item_patch() -> impl Strategy<Value = ShoppingItemPatch> {
        (
            proptest::option::of(arb_item_name()),
            proptest::option::of(1u32..50),
            proptest::option::of(any::<bool>()),
        )
            .prop_map(|(name, quantity, purchased)| ShoppingItemPatch {
                name,
                quantity,
                purchased,
            })
    }

    /// Shopping items of one list with ids `1..=len` and ascending
    /// creation times, i.e. in the order the remote store returns them.
    pub fn arb_shopping_items(max_len: usize) -> impl Strategy<Value = RecordSet> {
        prop::collection::vec((arb_item_name(), 1u32..50, any::<bool>()), 0..=max_len).prop_map(
            |fields| {
                fields
                    .into_iter()
                    .enumerate()
                    .map(|(i, (name, quantity, purchased))| {
                        let mut item = fixtures::shopping_item(i as u128 + 1, purchased);
                        item.name = name;
                        item.quantity = quantity;
                        Record::from(item)
                    })
                    .collect()
            },
        )
    }

    /// A non-empty item set plus the id of one of its records.
    pub fn arb_shopping_items_with_member(
        max_len: usize,
    ) -> impl Strategy<Value = (RecordSet, EntityId)> {
        arb_shopping_items(max_len.max(1))
            .prop_filter("set must not be empty", |set| !set.is_empty())
            .prop_flat_map(|set| {
                let len = set.len();
                (Just(set), 0..len)
            })
            .prop_map(|(set, index)| {
                let id = set.ids()[index];
                (set, id)
            })
    }

    /// An id that [`arb_shopping_items`] never produces.
    pub fn arb_unknown_id() -> impl Strategy<Value = EntityId> {
        (1_000_000u128..u128::MAX).prop_map(Uuid::from_u128)
    }

    pub fn arb_kanban_column() -> impl Strategy<Value = KanbanColumn> {
        prop_oneof![
            Just(KanbanColumn::Todo),
            Just(KanbanColumn::InProgress),
            Just(KanbanColumn::Done),
        ]
    }

    pub fn arb_transaction_kind() -> impl Strategy<Value = TransactionKind> {
        prop_oneof![Just(TransactionKind::Income), Just(TransactionKind::Expense)]
    }

    /// Transactions within one month, with positive amounts.
    pub fn arb_month_transactions(
        month: u32,
        year: i32,
        max_len: usize,
    ) -> impl Strategy<Value = Vec<Transaction>> {
        prop::collection::vec((arb_transaction_kind(), 1i64..1_000_000, 1u32..=28), 0..=max_len)
            .prop_map(move |rows| {
                rows.into_iter()
                    .enumerate()
                    .map(|(i, (kind, amount_cents, day))| {
                        let mut tx = fixtures::transaction(i as u128 + 1, kind, amount_cents);
                        tx.occurred_on =
                            NaiveDate::from_ymd_opt(year, month, day).unwrap_or(tx.occurred_on);
                        tx
                    })
                    .collect()
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Fixtures with fixed ids and timestamps, so separately built records
    //! compare equal.

    use super::*;

    pub fn owner() -> OwnerId {
        Uuid::from_u128(0xF1A4)
    }

    pub fn other_owner() -> OwnerId {
        Uuid::from_u128(0xB0B)
    }

    pub fn list_id() -> EntityId {
        Uuid::from_u128(0x1157)
    }

    pub fn board_id() -> EntityId {
        Uuid::from_u128(0xB0A2D)
    }

    pub fn groceries_id() -> EntityId {
        Uuid::from_u128(0xCA7)
    }

    pub fn salary_id() -> EntityId {
        Uuid::from_u128(0x5A1)
    }

    pub fn id(n: u128) -> EntityId {
        Uuid::from_u128(n)
    }

    /// Creation time `seq` seconds after a fixed epoch.
    pub fn at(seq: u128) -> Timestamp {
        chrono::DateTime::from_timestamp(1_700_000_000 + seq as i64, 0).unwrap_or_else(Utc::now)
    }

    pub fn day(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
    }

    pub fn items_key() -> QueryKey {
        QueryKey::shopping_items(owner(), list_id())
    }

    pub fn shopping_list() -> ShoppingList {
        ShoppingList {
            id: list_id(),
            owner_id: owner(),
            name: "Weekly groceries".to_string(),
            created_at: at(0),
        }
    }

    pub fn shopping_item(n: u128, purchased: bool) -> ShoppingItem {
        ShoppingItem {
            id: id(n),
            owner_id: owner(),
            list_id: list_id(),
            name: format!("item {}", n),
            quantity: 1,
            purchased,
            created_at: at(n),
        }
    }

    /// Items `1..=count`, none purchased.
    pub fn shopping_items(count: u128) -> Vec<Record> {
        (1..=count)
            .map(|n| Record::from(shopping_item(n, false)))
            .collect()
    }

    pub fn item_set(count: u128) -> RecordSet {
        shopping_items(count).into_iter().collect()
    }

    pub fn groceries() -> Category {
        Category {
            id: groceries_id(),
            owner_id: owner(),
            name: "Groceries".to_string(),
            kind: CategoryKind::Expense,
            color: "#4caf50".to_string(),
            created_at: at(0),
        }
    }

    pub fn salary() -> Category {
        Category {
            id: salary_id(),
            owner_id: owner(),
            name: "Salary".to_string(),
            kind: CategoryKind::Income,
            color: "#2196f3".to_string(),
            created_at: at(1),
        }
    }

    /// Budget for groceries, March 2024.
    pub fn budget(n: u128, amount_cents: i64) -> Budget {
        Budget {
            id: id(n),
            owner_id: owner(),
            category_id: groceries_id(),
            month: 3,
            year: 2024,
            amount_cents,
            created_at: at(n),
        }
    }

    pub fn bill(n: u128, due_date: NaiveDate) -> Bill {
        Bill {
            id: id(n),
            owner_id: owner(),
            name: format!("bill {}", n),
            amount_cents: 4_999,
            due_date,
            recurrence: BillRecurrence::Monthly,
            paid: false,
            created_at: at(n),
        }
    }

    /// Transaction on 2024-03-15, filed under groceries or salary by kind.
    pub fn transaction(n: u128, kind: TransactionKind, amount_cents: i64) -> Transaction {
        let category_id = match kind {
            TransactionKind::Income => salary_id(),
            TransactionKind::Expense => groceries_id(),
        };
        Transaction {
            id: id(n),
            owner_id: owner(),
            category_id: Some(category_id),
            kind,
            amount_cents,
            description: format!("transaction {}", n),
            occurred_on: day(2024, 3, 15),
            created_at: at(n),
        }
    }

    pub fn kanban_task(n: u128, column: KanbanColumn) -> KanbanTask {
        KanbanTask {
            id: id(n),
            owner_id: owner(),
            board_id: board_id(),
            title: format!("task {}", n),
            description: String::new(),
            column,
            position: n as i32,
            created_at: at(n),
        }
    }

    /// An in-memory store holding `records`.
    pub fn seeded_store(records: impl IntoIterator<Item = Record>) -> Arc<InMemoryRemoteStore> {
        let store = Arc::new(InMemoryRemoteStore::new());
        if let Err(err) = store.seed(records) {
            panic!("fixture records must be valid: {}", err);
        }
        store
    }

    /// A cache reading from `store`, with default settings.
    pub fn cache_over(store: Arc<InMemoryRemoteStore>) -> Arc<QueryCache> {
        Arc::new(QueryCache::new(
            Arc::new(StoreFetcher::new(store)),
            CacheConfig::default(),
        ))
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for FinanBoard results and record sets.

    use super::*;

    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &FinanResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    #[track_caller]
    pub fn assert_storage_error<T: std::fmt::Debug>(result: &FinanResult<T>) {
        match result {
            Err(FinanError::Storage(_)) => {}
            other => panic!("Expected Storage error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &FinanResult<T>, kind: EntityKind) {
        match result {
            Err(FinanError::Storage(StorageError::NotFound { kind: k, .. })) => {
                assert_eq!(*k, kind, "Wrong kind in NotFound error");
            }
            other => panic!("Expected NotFound error for {}, got: {:?}", kind, other),
        }
    }

    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &FinanResult<T>) {
        match result {
            Err(FinanError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    /// Assert `after` differs from `before` only at `index`, with every
    /// other record pointer-equal and in the same position.
    #[track_caller]
    pub fn assert_only_changed_at(before: &RecordSet, after: &RecordSet, index: usize) {
        assert_eq!(before.len(), after.len(), "Record count changed");
        for i in 0..before.len() {
            if i == index {
                assert_ne!(before.get(i), after.get(i), "Record {} did not change", i);
            } else {
                assert!(
                    after.shares_record(before, i),
                    "Record {} was rebuilt or moved",
                    i
                );
            }
        }
    }

    /// Assert `after` is `before` with the records of `removed` taken out,
    /// keeping order.
    #[track_caller]
    pub fn assert_removed(before: &RecordSet, after: &RecordSet, removed: EntityId) {
        let expected: Vec<EntityId> = before.ids().into_iter().filter(|id| *id != removed).collect();
        assert_eq!(after.ids(), expected);
    }

    #[track_caller]
    pub fn assert_purchased(set: &RecordSet, id: EntityId, purchased: bool) {
        let item = set
            .find(id)
            .and_then(|record| record.as_shopping_item())
            .unwrap_or_else(|| panic!("No shopping item {} in set", id));
        assert_eq!(item.purchased, purchased, "Wrong purchased flag on {}", id);
    }
}

// ============================================================================
// TESTS
// ============================================================================
