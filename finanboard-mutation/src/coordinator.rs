//! Mutation coordinator.
//!
//! Runs one remote write with optional optimistic install:
//!
//! 1. pre-flight: cancel reconciliation for the key, snapshot, install
//! 2. exactly one remote write
//! 3. on failure: roll back, then notify
//! 4. on settle: invalidate and refetch
//!
//! # Example
//!
//! ```ignore
//! let coordinator = MutationCoordinator::new(cache, store, Arc::new(TracingNotifier));
//! let mutation = Mutation::field_update(key, item_id, ShoppingItemPatch::purchased(true));
//! let report = coordinator.execute(mutation).await?;
//! ```

use finanboard_core::{
    AppConfig, EntityId, EntityKind, FinanError, QueryKey, Record, RecordPatch, RollbackPolicy,
    ValidationError,
};
use finanboard_storage::{QueryCache, RemoteStore, WriteOp, WriteOutcome};
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{info, info_span, warn, Instrument};

use crate::context::MutationContext;
use crate::hooks::{self, ReconcileOutcome, ReconcilePlan, RollbackOutcome};
use crate::notify::{Notice, Notifier};
use crate::strategy::{Deletion, FieldUpdate, Insertion, OptimisticStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub rollback_policy: RollbackPolicy,
    /// Await the reconciliation refetch before `execute` returns.
    pub await_reconciliation: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            rollback_policy: RollbackPolicy::Versioned,
            await_reconciliation: true,
        }
    }
}

impl From<&AppConfig> for CoordinatorConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            rollback_policy: config.rollback_policy,
            await_reconciliation: config.await_reconciliation,
        }
    }
}

/// One mutating operation against a cached query.
#[derive(Debug, Clone)]
pub struct Mutation {
    pub key: QueryKey,
    pub op: WriteOp,
    pub strategy: Option<Arc<dyn OptimisticStrategy>>,
    /// Extra prefixes invalidated when the mutation settles.
    pub also_invalidate: Vec<QueryKey>,
    pub success_message: Option<String>,
}

impl Mutation {
    /// A write with no optimistic install.
    pub fn new(key: QueryKey, op: WriteOp) -> Self {
        Self {
            key,
            op,
            strategy: None,
            also_invalidate: Vec::new(),
            success_message: None,
        }
    }

    pub fn with_strategy(mut self, strategy: impl OptimisticStrategy + 'static) -> Self {
        self.strategy = Some(Arc::new(strategy));
        self
    }

    pub fn also_invalidate(mut self, prefix: QueryKey) -> Self {
        self.also_invalidate.push(prefix);
        self
    }

    pub fn with_success_notice(mut self, message: impl Into<String>) -> Self {
        self.success_message = Some(message.into());
        self
    }

    /// Update one row, merging the patch into the cached record up front.
    pub fn field_update(key: QueryKey, id: EntityId, patch: impl Into<RecordPatch>) -> Self {
        let patch = patch.into();
        Self::new(key, WriteOp::update(id, patch.clone()))
            .with_strategy(FieldUpdate { id, patch })
    }

    /// Delete one row, dropping it from the cached set up front.
    pub fn deletion(key: QueryKey, kind: EntityKind, id: EntityId) -> Self {
        Self::new(key, WriteOp::delete(kind, id)).with_strategy(Deletion::new(id))
    }

    /// Insert a row, appending it to the cached set up front.
    pub fn insertion(key: QueryKey, record: impl Into<Record>) -> Self {
        let record = record.into();
        Self::new(key, WriteOp::insert(record.clone())).with_strategy(Insertion::new(record))
    }
}

/// A mutation the remote store accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationReport {
    pub outcome: WriteOutcome,
    /// Whether a provisional value was installed.
    pub optimistic: bool,
    pub reconciliation: ReconcileOutcome,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MutationError {
    /// Nothing was written locally or remotely.
    #[error("Mutation aborted before the remote call: {0}")]
    PreFlight(#[source] FinanError),

    #[error("Remote store rejected {op}: {source}")]
    Rejected {
        op: String,
        #[source]
        source: FinanError,
        rollback: RollbackOutcome,
        reconciliation: ReconcileOutcome,
    },
}

impl MutationError {
    pub fn cause(&self) -> &FinanError {
        match self {
            MutationError::PreFlight(err) => err,
            MutationError::Rejected { source, .. } => source,
        }
    }

    pub fn user_message(&self) -> String {
        self.cause().user_message()
    }
}

/// Runs mutations against one cache and remote store.
pub struct MutationCoordinator {
    cache: Arc<QueryCache>,
    store: Arc<dyn RemoteStore>,
    notifier: Arc<dyn Notifier>,
    config: CoordinatorConfig,
}

impl MutationCoordinator {
    pub fn new(
        cache: Arc<QueryCache>,
        store: Arc<dyn RemoteStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::with_config(cache, store, notifier, CoordinatorConfig::default())
    }

    pub fn with_config(
        cache: Arc<QueryCache>,
        store: Arc<dyn RemoteStore>,
        notifier: Arc<dyn Notifier>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            cache,
            store,
            notifier,
            config,
        }
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    pub fn config(&self) -> CoordinatorConfig {
        self.config
    }

    /// Run one mutation to completion.
    ///
    /// The remote write is attempted exactly once. A failed reconciliation
    /// refetch does not fail the mutation; it shows up in the report.
    pub async fn execute(&self, mutation: Mutation) -> Result<MutationReport, MutationError> {
        let span = info_span!("mutation", key = %mutation.key, op = %mutation.op);
        self.run(mutation).instrument(span).await
    }

    async fn run(&self, mutation: Mutation) -> Result<MutationReport, MutationError> {
        let Mutation {
            key,
            op,
            strategy,
            also_invalidate,
            success_message,
        } = mutation;

        if op.kind() != key.kind() {
            let err = FinanError::from(ValidationError::KindMismatch {
                expected: key.kind(),
                got: op.kind(),
            });
            self.notify_error(&key, &err);
            return Err(MutationError::PreFlight(err));
        }

        let context = match hooks::pre_flight(&self.cache, &key, strategy) {
            Ok(context) => context,
            Err(err) => {
                self.notify_error(&key, &err);
                return Err(MutationError::PreFlight(err));
            }
        };

        let guard = InFlight::begin(&self.cache, &context, self.config.rollback_policy);
        let op_label = op.to_string();
        let settled = match op.execute(self.store.as_ref()).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                let rollback = hooks::rollback(&self.cache, &context, self.config.rollback_policy);
                self.notify_error(&key, &err);
                Err((err, rollback))
            }
        };
        let in_flight = guard.settle();

        let plan = ReconcilePlan {
            policy: self.config.rollback_policy,
            await_refetch: self.config.await_reconciliation,
            in_flight,
        };
        let reconciliation = hooks::reconcile(&self.cache, &context, &also_invalidate, plan).await;

        match settled {
            Ok(outcome) => {
                info!(?reconciliation, "mutation committed");
                if let Some(message) = success_message {
                    self.notifier.notify(Notice::success(key, message));
                }
                Ok(MutationReport {
                    outcome,
                    optimistic: context.is_optimistic(),
                    reconciliation,
                })
            }
            Err((source, rollback)) => {
                info!(?rollback, ?reconciliation, error = %source, "mutation rejected");
                Err(MutationError::Rejected {
                    op: op_label,
                    source,
                    rollback,
                    reconciliation,
                })
            }
        }
    }

    fn notify_error(&self, key: &QueryKey, err: &FinanError) {
        self.notifier
            .notify(Notice::error(key.clone(), err.user_message()));
    }
}

/// Counts a mutation as in flight on its key until the write settles.
///
/// If the mutation future is dropped first, the write's fate is unknown.
/// The optimistic value is rolled back and the key refetched.
struct InFlight<'a> {
    cache: &'a Arc<QueryCache>,
    context: &'a MutationContext,
    policy: RollbackPolicy,
    settled: bool,
}

impl<'a> InFlight<'a> {
    fn begin(cache: &'a Arc<QueryCache>, context: &'a MutationContext, policy: RollbackPolicy) -> Self {
        cache.begin_mutation(&context.key);
        Self {
            cache,
            context,
            policy,
            settled: false,
        }
    }

    /// Returns the number of mutations still in flight on the key.
    fn settle(mut self) -> usize {
        self.settled = true;
        self.cache.end_mutation(&self.context.key)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let key = &self.context.key;
        let rollback = hooks::rollback(self.cache, self.context, self.policy);
        let in_flight = self.cache.end_mutation(key);
        warn!(key = %key, ?rollback, in_flight, "mutation dropped before its write settled");

        if in_flight > 0 && self.policy == RollbackPolicy::Versioned {
            return;
        }
        let Some(ticket) = self.cache.invalidate(key) else {
            return;
        };
        if Handle::try_current().is_ok() {
            hooks::spawn_reconcile(self.cache, ticket);
        } else {
            // No runtime to refetch on; the entry stays invalidated.
            self.cache.cancel(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finanboard_core::{BudgetPatch, ShoppingItemPatch, StorageError};
    use uuid::Uuid;

    fn key() -> QueryKey {
        QueryKey::shopping_items(Uuid::from_u128(1), Uuid::from_u128(2))
    }

    #[test]
    fn test_field_update_builds_matching_write_and_strategy() {
        let mutation = Mutation::field_update(key(), Uuid::from_u128(5), ShoppingItemPatch::purchased(true))
            .with_success_notice("saved");
        assert_eq!(mutation.op.kind(), EntityKind::ShoppingItem);
        assert_eq!(mutation.op.target_id(), Uuid::from_u128(5));
        let strategy = mutation.strategy.unwrap();
        assert_eq!(strategy.name(), "field_update");
        assert_eq!(strategy.target_id(), Uuid::from_u128(5));
        assert_eq!(mutation.success_message.as_deref(), Some("saved"));
    }

    #[test]
    fn test_deletion_builder() {
        let mutation = Mutation::deletion(key(), EntityKind::ShoppingItem, Uuid::from_u128(7))
            .also_invalidate(QueryKey::new(EntityKind::ShoppingList, Uuid::from_u128(1)));
        assert_eq!(mutation.op.verb(), "delete");
        assert_eq!(mutation.also_invalidate.len(), 1);
        assert_eq!(mutation.strategy.unwrap().name(), "deletion");
    }

    #[test]
    fn test_error_cause_and_message() {
        let err = MutationError::Rejected {
            op: WriteOp::update(Uuid::nil(), BudgetPatch::default()).to_string(),
            source: StorageError::Unavailable {
                reason: "timeout".to_string(),
            }
            .into(),
            rollback: RollbackOutcome::Restored,
            reconciliation: ReconcileOutcome::Refetched,
        };
        assert!(matches!(err.cause(), FinanError::Storage(_)));
        assert_eq!(
            err.user_message(),
            "The server could not be reached. Please try again."
        );
        assert!(err.to_string().starts_with("Remote store rejected update budgets/"));
    }

    #[test]
    fn test_config_from_app_config() {
        let app = AppConfig {
            rollback_policy: RollbackPolicy::Unconditional,
            await_reconciliation: false,
            ..AppConfig::default()
        };
        let config = CoordinatorConfig::from(&app);
        assert_eq!(config.rollback_policy, RollbackPolicy::Unconditional);
        assert!(!config.await_reconciliation);
    }
}
