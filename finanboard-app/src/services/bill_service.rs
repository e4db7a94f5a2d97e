//! Bill Service

use chrono::{NaiveDate, Utc};
use finanboard_core::{
    new_entity_id, Bill, BillPatch, BillRecurrence, Cents, EntityId, EntityKind, OwnerId,
    QueryKey, Record,
};
use finanboard_mutation::{Mutation, MutationReport, MutationTracker};
use finanboard_storage::WriteOp;
use std::sync::Arc;

use super::{collect, run_tracked};
use crate::context::AppContext;
use crate::error::AppResult;

/// Fields the bill form collects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBill {
    pub name: String,
    pub amount_cents: Cents,
    pub due_date: NaiveDate,
    pub recurrence: BillRecurrence,
}

#[derive(Debug, Default)]
pub struct BillStatus {
    pub add_bill: MutationTracker,
    pub set_paid: MutationTracker,
    pub delete_bill: MutationTracker,
}

pub struct BillService {
    context: Arc<AppContext>,
    owner: OwnerId,
    pub status: BillStatus,
}

impl BillService {
    pub fn new(context: Arc<AppContext>, owner: OwnerId) -> Self {
        Self {
            context,
            owner,
            status: BillStatus::default(),
        }
    }

    pub fn key(&self) -> QueryKey {
        QueryKey::bills(self.owner)
    }

    pub async fn bills(&self) -> AppResult<Vec<Bill>> {
        let set = self.context.read(&self.key()).await?;
        Ok(collect(&set, Record::as_bill))
    }

    /// Unpaid bills due before `today`, earliest first.
    pub async fn overdue(&self, today: NaiveDate) -> AppResult<Vec<Bill>> {
        let mut bills: Vec<Bill> = self
            .bills()
            .await?
            .into_iter()
            .filter(|bill| bill.is_overdue(today))
            .collect();
        bills.sort_by_key(|bill| bill.due_date);
        Ok(bills)
    }

    pub async fn add_bill(&self, new_bill: NewBill) -> AppResult<MutationReport> {
        let bill = Bill {
            id: new_entity_id(),
            owner_id: self.owner,
            name: new_bill.name,
            amount_cents: new_bill.amount_cents,
            due_date: new_bill.due_date,
            recurrence: new_bill.recurrence,
            paid: false,
            created_at: Utc::now(),
        };
        let mutation =
            Mutation::new(self.key(), WriteOp::insert(bill)).with_success_notice("Bill added");
        run_tracked(&self.context, &self.status.add_bill, mutation).await
    }

    pub async fn set_paid(&self, bill_id: EntityId, paid: bool) -> AppResult<MutationReport> {
        let patch = BillPatch {
            paid: Some(paid),
            ..Default::default()
        };
        let mutation = Mutation::field_update(self.key(), bill_id, patch);
        run_tracked(&self.context, &self.status.set_paid, mutation).await
    }

    pub async fn delete_bill(&self, bill_id: EntityId) -> AppResult<MutationReport> {
        let mutation = Mutation::deletion(self.key(), EntityKind::Bill, bill_id);
        run_tracked(&self.context, &self.status.delete_bill, mutation).await
    }
}
