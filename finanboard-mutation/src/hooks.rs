//! Mutation lifecycle hooks.
//!
//! `pre_flight` runs before the remote write, `rollback` after a rejected
//! write, and `reconcile` once the write has settled either way. Each is a
//! plain function over the cache so the coordinator can compose them and
//! tests can drive them one at a time.

use finanboard_core::{CacheError, FinanError, FinanResult, QueryKey, RollbackPolicy};
use finanboard_storage::{FetchTicket, QueryCache};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::context::{Installed, MutationContext};
use crate::strategy::OptimisticStrategy;

fn infallible<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

/// Cancel reconciliation for `key`, snapshot the entry and install the
/// strategy's provisional value.
///
/// A failing strategy leaves the cache untouched. With no strategy, or an
/// entry holding no data, nothing is installed.
pub fn pre_flight(
    cache: &QueryCache,
    key: &QueryKey,
    strategy: Option<Arc<dyn OptimisticStrategy>>,
) -> FinanResult<MutationContext> {
    let mut context = MutationContext::new(key.clone());
    let Some(strategy) = strategy else {
        return Ok(context);
    };

    let modified = cache.modify(key, |current, _| strategy.apply(current))?;
    // Nothing can run between the install above and this cancel. An entry
    // without data has nothing to protect, and its fetch is a first load.
    if modified.is_some() && cache.cancel(key) {
        debug!(key = %key, "cancelled in-flight fetch before optimistic install");
    }

    context.installed = modified.map(|modified| Installed {
        snapshot: modified.previous,
        version: modified.version,
        changed: modified.changed,
    });
    match &context.installed {
        Some(installed) => debug!(
            key = %key,
            strategy = strategy.name(),
            version = %installed.version,
            changed = installed.changed,
            "optimistic value installed"
        ),
        None => debug!(key = %key, "entry empty, optimistic install skipped"),
    }
    context.strategy = Some(strategy);
    Ok(context)
}

/// What a rollback did to the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// No optimistic value was installed.
    NotNeeded,
    /// The snapshot was put back wholesale.
    Restored,
    /// Another writer changed the entry since the install; only this
    /// mutation's record was reverted.
    Reverted,
    /// The entry was removed or emptied while the mutation ran.
    EntryGone,
}

/// Undo a failed mutation's optimistic install.
pub fn rollback(
    cache: &QueryCache,
    context: &MutationContext,
    policy: RollbackPolicy,
) -> RollbackOutcome {
    let (Some(installed), Some(strategy)) = (&context.installed, &context.strategy) else {
        return RollbackOutcome::NotNeeded;
    };

    let mut outcome = RollbackOutcome::EntryGone;
    let modified = infallible(cache.modify(&context.key, |current, version| {
        match policy {
            RollbackPolicy::Unconditional => {
                outcome = RollbackOutcome::Restored;
                Ok(installed.snapshot.clone())
            }
            RollbackPolicy::Versioned if version == installed.version => {
                outcome = RollbackOutcome::Restored;
                Ok(installed.snapshot.clone())
            }
            RollbackPolicy::Versioned => {
                outcome = RollbackOutcome::Reverted;
                Ok(strategy.revert(current, &installed.snapshot))
            }
        }
    }));

    if modified.is_some() {
        cache.record_rollback();
    }
    match outcome {
        RollbackOutcome::Reverted => warn!(
            key = %context.key,
            strategy = strategy.name(),
            installed = %installed.version,
            "entry changed since optimistic install, reverted only the touched record"
        ),
        _ => warn!(key = %context.key, ?outcome, "optimistic value rolled back"),
    }
    outcome
}

/// What reconciliation did for the mutation's own key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The entry was refetched and now matches the remote store.
    Refetched,
    /// A refetch was started on a background task.
    Spawned,
    /// Other mutations on the key are still in flight; the last to settle
    /// refetches.
    Deferred { in_flight: usize },
    /// A later mutation cancelled this refetch and will reconcile itself.
    Superseded,
    /// No entry to reconcile.
    NoEntry,
    /// The refetch failed; the last known value stays visible.
    Failed(FinanError),
}

/// Reconciliation settings for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub policy: RollbackPolicy,
    /// Await refetches instead of spawning them.
    pub await_refetch: bool,
    /// Mutations still in flight on the key after this one settled.
    pub in_flight: usize,
}

/// Invalidate the mutation's key and any extra prefixes, then refetch.
///
/// Refetch failures are logged and reported but never returned as errors.
pub async fn reconcile(
    cache: &Arc<QueryCache>,
    context: &MutationContext,
    also_invalidate: &[QueryKey],
    plan: ReconcilePlan,
) -> ReconcileOutcome {
    let mut tickets = Vec::new();
    for prefix in also_invalidate {
        tickets.extend(cache.invalidate_prefix(prefix));
    }

    let defer = plan.policy == RollbackPolicy::Versioned && plan.in_flight > 0;
    // An extra prefix may already cover the mutation's own key.
    let covered = tickets.iter().any(|ticket| ticket.key() == &context.key);
    let own = if defer {
        if covered {
            cache.cancel(&context.key);
        }
        None
    } else {
        cache.invalidate(&context.key)
    };
    tickets.retain(|ticket| ticket.key() != &context.key);

    if !plan.await_refetch {
        for ticket in tickets {
            spawn_reconcile(cache, ticket);
        }
        return match (defer, own) {
            (true, _) => ReconcileOutcome::Deferred {
                in_flight: plan.in_flight,
            },
            (false, Some(ticket)) => {
                spawn_reconcile(cache, ticket);
                ReconcileOutcome::Spawned
            }
            (false, None) => ReconcileOutcome::NoEntry,
        };
    }

    for ticket in tickets {
        let key = ticket.key().clone();
        if let Err(err) = cache.resolve(ticket).await {
            log_refetch_failure(&key, &err);
        }
    }

    if defer {
        debug!(key = %context.key, in_flight = plan.in_flight, "reconciliation deferred");
        return ReconcileOutcome::Deferred {
            in_flight: plan.in_flight,
        };
    }
    let Some(ticket) = own else {
        return ReconcileOutcome::NoEntry;
    };
    match cache.resolve(ticket).await {
        Ok(_) => ReconcileOutcome::Refetched,
        Err(FinanError::Cache(CacheError::FetchCancelled { .. })) => {
            debug!(key = %context.key, "reconciliation superseded");
            ReconcileOutcome::Superseded
        }
        Err(err) => {
            log_refetch_failure(&context.key, &err);
            ReconcileOutcome::Failed(err)
        }
    }
}

/// Resolve a reconciliation ticket on a background task.
///
/// The returned handle yields what the refetch did. Failures are logged
/// here, so callers may drop the handle.
pub fn spawn_reconcile(cache: &Arc<QueryCache>, ticket: FetchTicket) -> JoinHandle<ReconcileOutcome> {
    let key = ticket.key().clone();
    let fetch = cache.spawn_resolve(ticket);
    tokio::spawn(async move {
        match fetch.await {
            Ok(Ok(_)) => ReconcileOutcome::Refetched,
            Ok(Err(FinanError::Cache(CacheError::FetchCancelled { .. }))) => {
                debug!(key = %key, "reconciliation superseded");
                ReconcileOutcome::Superseded
            }
            Ok(Err(err)) => {
                log_refetch_failure(&key, &err);
                ReconcileOutcome::Failed(err)
            }
            Err(join) if join.is_cancelled() => {
                debug!(key = %key, "reconciliation aborted");
                ReconcileOutcome::Superseded
            }
            Err(join) => std::panic::resume_unwind(join.into_panic()),
        }
    })
}

fn log_refetch_failure(key: &QueryKey, err: &FinanError) {
    match err {
        FinanError::Cache(CacheError::FetchCancelled { .. }) => {
            debug!(key = %key, "reconciliation superseded");
        }
        _ => warn!(key = %key, error = %err, "reconciliation refetch failed, keeping last value"),
    }
}
