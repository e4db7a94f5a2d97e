//! Screen Services
//!
//! One service per FinanBoard screen. A service owns the query keys its
//! screen reads and the mutations it issues, and publishes a
//! [`MutationStatus`](finanboard_core::MutationStatus) per mutation through
//! a [`MutationTracker`].

mod bill_service;
mod budget_service;
mod category_service;
mod kanban_service;
mod shopping_service;
mod summary_service;
mod transaction_service;

pub use bill_service::*;
pub use budget_service::*;
pub use category_service::*;
pub use kanban_service::*;
pub use shopping_service::*;
pub use summary_service::*;
pub use transaction_service::*;

use finanboard_core::{Record, RecordSet};
use finanboard_mutation::{Mutation, MutationReport, MutationTracker};

use crate::context::AppContext;
use crate::error::AppResult;

/// Run `mutation`, publishing its progress on `tracker`.
pub(crate) async fn run_tracked(
    context: &AppContext,
    tracker: &MutationTracker,
    mutation: Mutation,
) -> AppResult<MutationReport> {
    let result = tracker.track(context.coordinator().execute(mutation)).await;
    Ok(result?)
}

/// Typed copies of the records `pick` accepts, in set order.
pub(crate) fn collect<T: Clone>(set: &RecordSet, pick: impl Fn(&Record) -> Option<&T>) -> Vec<T> {
    set.iter().filter_map(|record| pick(record.as_ref()).cloned()).collect()
}
