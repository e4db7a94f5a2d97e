//! Budget Service
//!
//! Monthly per-category budgets.

use chrono::Utc;
use finanboard_core::{
    new_entity_id, Budget, BudgetPatch, Cents, EntityId, EntityKind, OwnerId, QueryKey, Record,
};
use finanboard_mutation::{Mutation, MutationReport, MutationTracker};
use finanboard_storage::WriteOp;
use std::sync::Arc;

use super::{collect, run_tracked};
use crate::context::AppContext;
use crate::error::AppResult;

#[derive(Debug, Default)]
pub struct BudgetStatus {
    pub set_budget: MutationTracker,
    pub update_amount: MutationTracker,
    pub delete_budget: MutationTracker,
}

pub struct BudgetService {
    context: Arc<AppContext>,
    owner: OwnerId,
    pub status: BudgetStatus,
}

impl BudgetService {
    pub fn new(context: Arc<AppContext>, owner: OwnerId) -> Self {
        Self {
            context,
            owner,
            status: BudgetStatus::default(),
        }
    }

    pub fn month_key(&self, month: u32, year: i32) -> QueryKey {
        QueryKey::budgets(self.owner, month, year)
    }

    pub async fn budgets(&self, month: u32, year: i32) -> AppResult<Vec<Budget>> {
        let set = self.context.read(&self.month_key(month, year)).await?;
        Ok(collect(&set, Record::as_budget))
    }

    /// Create a budget for a category and month.
    pub async fn set_budget(
        &self,
        category_id: EntityId,
        month: u32,
        year: i32,
        amount_cents: Cents,
    ) -> AppResult<MutationReport> {
        let budget = Budget {
            id: new_entity_id(),
            owner_id: self.owner,
            category_id,
            month,
            year,
            amount_cents,
            created_at: Utc::now(),
        };
        let mutation = Mutation::new(self.month_key(month, year), WriteOp::insert(budget))
            .with_success_notice("Budget saved");
        run_tracked(&self.context, &self.status.set_budget, mutation).await
    }

    pub async fn update_amount(
        &self,
        month: u32,
        year: i32,
        budget_id: EntityId,
        amount_cents: Cents,
    ) -> AppResult<MutationReport> {
        let patch = BudgetPatch {
            amount_cents: Some(amount_cents),
            ..Default::default()
        };
        let mutation = Mutation::field_update(self.month_key(month, year), budget_id, patch);
        run_tracked(&self.context, &self.status.update_amount, mutation).await
    }

    pub async fn delete_budget(
        &self,
        month: u32,
        year: i32,
        budget_id: EntityId,
    ) -> AppResult<MutationReport> {
        let mutation =
            Mutation::deletion(self.month_key(month, year), EntityKind::Budget, budget_id)
                .with_success_notice("Budget removed");
        run_tracked(&self.context, &self.status.delete_budget, mutation).await
    }
}
