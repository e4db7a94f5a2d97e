//! Error types for FinanBoard operations

use crate::EntityKind;
use thiserror::Error;
use uuid::Uuid;

/// Remote store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Record not found: {kind} with id {id}")]
    NotFound { kind: EntityKind, id: Uuid },

    #[error("Insert failed for {kind}: {reason}")]
    InsertFailed { kind: EntityKind, reason: String },

    #[error("Update failed for {kind} with id {id}: {reason}")]
    UpdateFailed {
        kind: EntityKind,
        id: Uuid,
        reason: String,
    },

    #[error("Delete failed for {kind} with id {id}: {reason}")]
    DeleteFailed {
        kind: EntityKind,
        id: Uuid,
        reason: String,
    },

    #[error("Remote store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Not authorized: {reason}")]
    Unauthorized { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Validation errors raised at the remote store boundary and by strategies.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Patch kind mismatch: expected {expected}, got {got}")]
    PatchKindMismatch { expected: EntityKind, got: EntityKind },

    #[error("Record kind mismatch: collection {expected} cannot hold {got}")]
    KindMismatch { expected: EntityKind, got: EntityKind },

    #[error("Row in {kind} could not be decoded: {reason}")]
    RowDecode { kind: EntityKind, reason: String },
}

/// Query cache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Fetch for {key} was cancelled")]
    FetchCancelled { key: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all FinanBoard errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FinanError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl FinanError {
    /// Short, user-facing description suitable for a notification.
    pub fn user_message(&self) -> String {
        match self {
            FinanError::Storage(StorageError::Unavailable { .. }) => {
                "The server could not be reached. Please try again.".to_string()
            }
            FinanError::Storage(StorageError::Unauthorized { .. }) => {
                "You are not allowed to change this record.".to_string()
            }
            FinanError::Storage(StorageError::NotFound { kind, .. }) => {
                format!("This {} no longer exists.", kind_label(*kind))
            }
            FinanError::Validation(e) => e.to_string(),
            other => other.to_string(),
        }
    }
}

fn kind_label(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::ShoppingList => "shopping list",
        EntityKind::ShoppingItem => "shopping item",
        EntityKind::Budget => "budget",
        EntityKind::Bill => "bill",
        EntityKind::Transaction => "transaction",
        EntityKind::Category => "category",
        EntityKind::KanbanTask => "task",
    }
}

/// Result type alias for FinanBoard operations.
pub type FinanResult<T> = Result<T, FinanError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_not_found() {
        let err = StorageError::NotFound {
            kind: EntityKind::ShoppingItem,
            id: Uuid::nil(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Record not found"));
        assert!(msg.contains("shopping_items"));
        assert!(msg.contains("00000000-0000-0000-0000-000000000000"));
    }

    #[test]
    fn test_validation_error_display_patch_kind_mismatch() {
        let err = ValidationError::PatchKindMismatch {
            expected: EntityKind::ShoppingItem,
            got: EntityKind::Budget,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("shopping_items"));
        assert!(msg.contains("budgets"));
    }

    #[test]
    fn test_finan_error_from_variants() {
        let storage = FinanError::from(StorageError::LockPoisoned);
        assert!(matches!(storage, FinanError::Storage(_)));

        let validation = FinanError::from(ValidationError::RequiredFieldMissing {
            field: "name".to_string(),
        });
        assert!(matches!(validation, FinanError::Validation(_)));

        let cache = FinanError::from(CacheError::FetchCancelled {
            key: "budgets".to_string(),
        });
        assert!(matches!(cache, FinanError::Cache(_)));

        let config = FinanError::from(ConfigError::InvalidValue {
            field: "stale_time".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        });
        assert!(matches!(config, FinanError::Config(_)));
    }

    #[test]
    fn test_user_message_hides_transport_detail() {
        let err = FinanError::from(StorageError::Unavailable {
            reason: "connection reset by peer".to_string(),
        });
        let msg = err.user_message();
        assert!(!msg.contains("connection reset"));
        assert!(msg.contains("try again"));
    }

    #[test]
    fn test_user_message_names_missing_record() {
        let err = FinanError::from(StorageError::NotFound {
            kind: EntityKind::KanbanTask,
            id: Uuid::nil(),
        });
        assert_eq!(err.user_message(), "This task no longer exists.");
    }
}
