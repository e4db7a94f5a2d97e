//! Summary Service
//!
//! Month totals and budget progress for the dashboard. The arithmetic is
//! pure; the service only gathers the cached queries it needs.

use chrono::Datelike;
use finanboard_core::{
    Budget, Category, Cents, EntityId, OwnerId, QueryKey, Record, Transaction, TransactionKind,
};
use std::collections::HashMap;
use std::sync::Arc;

use super::collect;
use crate::context::AppContext;
use crate::error::AppResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonthlyTotals {
    pub income: Cents,
    pub expense: Cents,
    /// Income minus expense.
    pub balance: Cents,
}

/// Sum income and expense over `transactions`.
pub fn monthly_totals(transactions: &[Transaction]) -> MonthlyTotals {
    let mut totals = MonthlyTotals::default();
    for tx in transactions {
        match tx.kind {
            TransactionKind::Income => totals.income += tx.amount_cents,
            TransactionKind::Expense => totals.expense += tx.amount_cents,
        }
        totals.balance += tx.signed_amount();
    }
    totals
}

/// Spending against one budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetProgress {
    pub budget_id: EntityId,
    pub category_id: EntityId,
    /// `None` if the category is not loaded or no longer exists.
    pub category_name: Option<String>,
    pub budgeted: Cents,
    pub spent: Cents,
    pub remaining: Cents,
}

impl BudgetProgress {
    pub fn is_over(&self) -> bool {
        self.spent > self.budgeted
    }

    /// Share of the budget spent, in whole percent. May exceed 100.
    pub fn percent_used(&self) -> u32 {
        if self.budgeted <= 0 {
            return if self.spent > 0 { 100 } else { 0 };
        }
        let percent = self.spent.max(0).saturating_mul(100) / self.budgeted;
        u32::try_from(percent).unwrap_or(u32::MAX)
    }
}

/// Expense spent per budget, counting transactions in the budget's
/// category and month.
pub fn budget_progress(
    budgets: &[Budget],
    transactions: &[Transaction],
    categories: &[Category],
) -> Vec<BudgetProgress> {
    let names: HashMap<EntityId, &str> = categories
        .iter()
        .map(|category| (category.id, category.name.as_str()))
        .collect();

    let mut spent: HashMap<(EntityId, u32, i32), Cents> = HashMap::new();
    for tx in transactions {
        if tx.kind != TransactionKind::Expense {
            continue;
        }
        let Some(category_id) = tx.category_id else {
            continue;
        };
        let month = (category_id, tx.occurred_on.month(), tx.occurred_on.year());
        *spent.entry(month).or_default() += tx.amount_cents;
    }

    budgets
        .iter()
        .map(|budget| {
            let spent = spent
                .get(&(budget.category_id, budget.month, budget.year))
                .copied()
                .unwrap_or(0);
            BudgetProgress {
                budget_id: budget.id,
                category_id: budget.category_id,
                category_name: names.get(&budget.category_id).map(|name| name.to_string()),
                budgeted: budget.amount_cents,
                spent,
                remaining: budget.amount_cents - spent,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthSummary {
    pub month: u32,
    pub year: i32,
    pub totals: MonthlyTotals,
    pub budgets: Vec<BudgetProgress>,
}

pub struct SummaryService {
    context: Arc<AppContext>,
    owner: OwnerId,
}

impl SummaryService {
    pub fn new(context: Arc<AppContext>, owner: OwnerId) -> Self {
        Self { context, owner }
    }

    pub async fn month_summary(&self, month: u32, year: i32) -> AppResult<MonthSummary> {
        let transactions = self
            .context
            .read(&QueryKey::transactions(self.owner, month, year))
            .await?;
        let budgets = self
            .context
            .read(&QueryKey::budgets(self.owner, month, year))
            .await?;
        let categories = self.context.read(&QueryKey::categories(self.owner)).await?;

        let transactions = collect(&transactions, Record::as_transaction);
        let budgets = collect(&budgets, Record::as_budget);
        let categories = collect(&categories, Record::as_category);
        Ok(MonthSummary {
            month,
            year,
            totals: monthly_totals(&transactions),
            budgets: budget_progress(&budgets, &transactions, &categories),
        })
    }
}
