//! FinanBoard Mutation - Optimistic Writes Against the Query Cache
//!
//! A mutation installs a provisional value in the cache, issues one remote
//! write, rolls back if the write is rejected and refetches once it settles.
//! Strategies compute the provisional value; hooks are the individual
//! lifecycle steps; the coordinator composes them.

pub mod context;
pub mod coordinator;
pub mod hooks;
pub mod notify;
pub mod status;
pub mod strategy;

pub use context::{Installed, MutationContext};
pub use coordinator::{
    CoordinatorConfig, Mutation, MutationCoordinator, MutationError, MutationReport,
};
pub use hooks::{
    pre_flight, reconcile, rollback, spawn_reconcile, ReconcileOutcome, ReconcilePlan,
    RollbackOutcome,
};
pub use notify::{ChannelNotifier, Notice, NoticeLevel, Notifier, TracingNotifier};
pub use status::MutationTracker;
pub use strategy::{Deletion, FieldUpdate, Insertion, OptimisticStrategy};
