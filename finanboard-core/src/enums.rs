//! Enum types for FinanBoard records and cache state

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// ENTITY KINDS
// ============================================================================

/// Record kind discriminator. Each kind maps to one remote collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    ShoppingList,
    ShoppingItem,
    Budget,
    Bill,
    Transaction,
    Category,
    KanbanTask,
}

impl EntityKind {
    /// Every kind, in a stable order.
    pub const ALL: [EntityKind; 7] = [
        EntityKind::ShoppingList,
        EntityKind::ShoppingItem,
        EntityKind::Budget,
        EntityKind::Bill,
        EntityKind::Transaction,
        EntityKind::Category,
        EntityKind::KanbanTask,
    ];

    /// Name of the remote collection (table) holding this kind.
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::ShoppingList => "shopping_lists",
            EntityKind::ShoppingItem => "shopping_items",
            EntityKind::Budget => "budgets",
            EntityKind::Bill => "bills",
            EntityKind::Transaction => "transactions",
            EntityKind::Category => "categories",
            EntityKind::KanbanTask => "kanban_tasks",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

/// Error returned when parsing an unknown collection name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCollection(pub String);

impl fmt::Display for UnknownCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown collection: {}", self.0)
    }
}

impl std::error::Error for UnknownCollection {}

impl FromStr for EntityKind {
    type Err = UnknownCollection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.collection() == s)
            .ok_or_else(|| UnknownCollection(s.to_string()))
    }
}

// ============================================================================
// CACHE / MUTATION STATE
// ============================================================================

/// Fetch status of a cache entry.
///
/// `Idle` with no data is the "empty" state of a never-loaded entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

impl FetchStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, FetchStatus::Loading)
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, FetchStatus::Success | FetchStatus::Error)
    }
}

/// Status of a mutation as observed by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationStatus {
    #[default]
    Idle,
    Pending,
    Success,
    Error,
}

// ============================================================================
// DOMAIN ENUMS
// ============================================================================

/// Direction of a ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
}

/// Which ledger side a category groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    Income,
    Expense,
}

impl CategoryKind {
    /// Whether transactions of `kind` may be filed under this category.
    pub fn accepts(&self, kind: TransactionKind) -> bool {
        matches!(
            (self, kind),
            (CategoryKind::Income, TransactionKind::Income)
                | (CategoryKind::Expense, TransactionKind::Expense)
        )
    }
}

/// How often a bill repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillRecurrence {
    #[default]
    Once,
    Weekly,
    Monthly,
    Yearly,
}

/// Column of the kanban board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KanbanColumn {
    #[default]
    Todo,
    InProgress,
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_collection_roundtrip() {
        for kind in EntityKind::ALL {
            let parsed: EntityKind = kind.collection().parse().expect("known collection");
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_entity_kind_unknown_collection() {
        let err = "payments".parse::<EntityKind>().unwrap_err();
        assert_eq!(err, UnknownCollection("payments".to_string()));
    }

    #[test]
    fn test_fetch_status_default_is_idle() {
        assert_eq!(FetchStatus::default(), FetchStatus::Idle);
        assert!(!FetchStatus::Idle.is_settled());
        assert!(FetchStatus::Error.is_settled());
        assert!(FetchStatus::Loading.is_loading());
    }

    #[test]
    fn test_category_accepts_matching_kind() {
        assert!(CategoryKind::Expense.accepts(TransactionKind::Expense));
        assert!(!CategoryKind::Expense.accepts(TransactionKind::Income));
        assert!(CategoryKind::Income.accepts(TransactionKind::Income));
    }
}
