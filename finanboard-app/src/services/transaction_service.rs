//! Transaction Service
//!
//! Ledger entries. Writes are not optimistic: a transaction moves month
//! totals and budget progress, so screens wait for the confirmed rows.

use chrono::{Datelike, NaiveDate, Utc};
use finanboard_core::{
    new_entity_id, Cents, EntityId, EntityKind, OwnerId, QueryKey, Record, Transaction,
    TransactionKind, TransactionPatch,
};
use finanboard_mutation::{Mutation, MutationReport, MutationTracker};
use finanboard_storage::WriteOp;
use std::sync::Arc;

use super::{collect, run_tracked};
use crate::context::AppContext;
use crate::error::AppResult;

/// Fields the transaction form collects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub category_id: Option<EntityId>,
    pub kind: TransactionKind,
    pub amount_cents: Cents,
    pub description: String,
    pub occurred_on: NaiveDate,
}

#[derive(Debug, Default)]
pub struct TransactionStatus {
    pub add: MutationTracker,
    pub update: MutationTracker,
    pub delete: MutationTracker,
}

pub struct TransactionService {
    context: Arc<AppContext>,
    owner: OwnerId,
    pub status: TransactionStatus,
}

impl TransactionService {
    pub fn new(context: Arc<AppContext>, owner: OwnerId) -> Self {
        Self {
            context,
            owner,
            status: TransactionStatus::default(),
        }
    }

    pub fn month_key(&self, month: u32, year: i32) -> QueryKey {
        QueryKey::transactions(self.owner, month, year)
    }

    pub async fn transactions(&self, month: u32, year: i32) -> AppResult<Vec<Transaction>> {
        let set = self.context.read(&self.month_key(month, year)).await?;
        Ok(collect(&set, Record::as_transaction))
    }

    // Every month of transactions and budgets may show the change.
    fn with_ledger_prefixes(&self, mutation: Mutation) -> Mutation {
        mutation
            .also_invalidate(QueryKey::new(EntityKind::Transaction, self.owner))
            .also_invalidate(QueryKey::new(EntityKind::Budget, self.owner))
    }

    pub async fn add(&self, new_tx: NewTransaction) -> AppResult<MutationReport> {
        let key = self.month_key(new_tx.occurred_on.month(), new_tx.occurred_on.year());
        let tx = Transaction {
            id: new_entity_id(),
            owner_id: self.owner,
            category_id: new_tx.category_id,
            kind: new_tx.kind,
            amount_cents: new_tx.amount_cents,
            description: new_tx.description,
            occurred_on: new_tx.occurred_on,
            created_at: Utc::now(),
        };
        let mutation = self
            .with_ledger_prefixes(Mutation::new(key, WriteOp::insert(tx)))
            .with_success_notice("Transaction added");
        run_tracked(&self.context, &self.status.add, mutation).await
    }

    /// Update a transaction listed under `month`/`year`.
    pub async fn update(
        &self,
        month: u32,
        year: i32,
        tx_id: EntityId,
        patch: TransactionPatch,
    ) -> AppResult<MutationReport> {
        let mutation = self
            .with_ledger_prefixes(Mutation::new(
                self.month_key(month, year),
                WriteOp::update(tx_id, patch),
            ))
            .with_success_notice("Transaction updated");
        run_tracked(&self.context, &self.status.update, mutation).await
    }

    pub async fn delete(&self, month: u32, year: i32, tx_id: EntityId) -> AppResult<MutationReport> {
        let mutation = self
            .with_ledger_prefixes(Mutation::new(
                self.month_key(month, year),
                WriteOp::delete(EntityKind::Transaction, tx_id),
            ))
            .with_success_notice("Transaction deleted");
        run_tracked(&self.context, &self.status.delete, mutation).await
    }
}
