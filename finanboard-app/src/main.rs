//! FinanBoard demo shell.
//!
//! Seeds an in-memory store and drives each screen service through the
//! optimistic-update flows, logging cache transitions and notices.

use chrono::{Datelike, Duration as ChronoDuration, Utc};
use finanboard_app::{
    init_tracing, AppContext, AppResult, BillService, BudgetService, CategoryService,
    KanbanService, NewBill, NewTransaction, ShoppingService, SummaryService, TransactionService,
};
use finanboard_core::{
    format_cents, new_entity_id, AppConfig, BillRecurrence, CategoryKind, EntityId, KanbanColumn,
    OwnerId, Record, ShoppingItem, ShoppingList, StorageError, Timestamp, TransactionKind,
};
use finanboard_mutation::{ChannelNotifier, NoticeLevel};
use finanboard_storage::InMemoryRemoteStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

struct Demo {
    owner: OwnerId,
    list: EntityId,
    milk: EntityId,
    eggs: EntityId,
    bread: EntityId,
    board: EntityId,
}

fn seed_records(demo: &Demo) -> Vec<Record> {
    let base = Utc::now();
    let at = |seconds: i64| -> Timestamp { base + ChronoDuration::seconds(seconds) };
    let item = |id: EntityId, name: &str, seconds: i64| {
        Record::from(ShoppingItem {
            id,
            owner_id: demo.owner,
            list_id: demo.list,
            name: name.to_string(),
            quantity: 1,
            purchased: false,
            created_at: at(seconds),
        })
    };
    vec![
        Record::from(ShoppingList {
            id: demo.list,
            owner_id: demo.owner,
            name: "Weekly groceries".to_string(),
            created_at: at(0),
        }),
        item(demo.milk, "Milk", 1),
        item(demo.eggs, "Eggs", 2),
        item(demo.bread, "Bread", 3),
    ]
}

async fn shopping_flows(
    context: &Arc<AppContext>,
    store: &InMemoryRemoteStore,
    demo: &Demo,
) -> AppResult<()> {
    let shopping = ShoppingService::new(Arc::clone(context), demo.owner);
    let items = shopping.items(demo.list).await?;
    info!(count = items.len(), "shopping items loaded");

    // Toggle rejected by the server: the tick appears, then rolls back.
    store.fail_next_write(StorageError::Unavailable {
        reason: "simulated outage".to_string(),
    })?;
    if let Err(err) = shopping.toggle_item(demo.list, demo.milk, true).await {
        warn!(error = %err, status = ?shopping.status.toggle_item.status(), "toggle rejected");
    }

    shopping.toggle_item(demo.list, demo.eggs, true).await?;
    shopping.delete_item(demo.list, demo.bread).await?;
    shopping.add_item(demo.list, "Coffee", 2).await?;

    // Unknown id: nothing to guess locally, and the server has no such row.
    if let Err(err) = shopping.toggle_item(demo.list, new_entity_id(), true).await {
        warn!(message = %err.user_message(), "toggle of unknown item");
    }

    for item in shopping.items(demo.list).await? {
        info!(name = %item.name, purchased = item.purchased, "shopping item");
    }
    Ok(())
}

async fn finance_flows(context: &Arc<AppContext>, demo: &Demo) -> AppResult<()> {
    let today = Utc::now().date_naive();
    let (month, year) = (today.month(), today.year());

    let categories = CategoryService::new(Arc::clone(context), demo.owner);
    categories.create("Groceries", CategoryKind::Expense, "#4caf50").await?;
    categories.create("Salary", CategoryKind::Income, "#2196f3").await?;
    let loaded = categories.categories().await?;
    let groceries = loaded.iter().find(|c| c.kind == CategoryKind::Expense).map(|c| c.id);
    let salary = loaded.iter().find(|c| c.kind == CategoryKind::Income).map(|c| c.id);

    let budgets = BudgetService::new(Arc::clone(context), demo.owner);
    if let Some(groceries) = groceries {
        budgets.set_budget(groceries, month, year, 40_000).await?;
    }

    let transactions = TransactionService::new(Arc::clone(context), demo.owner);
    transactions
        .add(NewTransaction {
            category_id: salary,
            kind: TransactionKind::Income,
            amount_cents: 320_000,
            description: "Paycheck".to_string(),
            occurred_on: today,
        })
        .await?;
    transactions
        .add(NewTransaction {
            category_id: groceries,
            kind: TransactionKind::Expense,
            amount_cents: 12_345,
            description: "Supermarket".to_string(),
            occurred_on: today,
        })
        .await?;

    let summary = SummaryService::new(Arc::clone(context), demo.owner)
        .month_summary(month, year)
        .await?;
    info!(
        income = %format_cents(summary.totals.income),
        expense = %format_cents(summary.totals.expense),
        balance = %format_cents(summary.totals.balance),
        "month totals"
    );
    for progress in &summary.budgets {
        info!(
            category = progress.category_name.as_deref().unwrap_or("?"),
            spent = %format_cents(progress.spent),
            budgeted = %format_cents(progress.budgeted),
            percent = progress.percent_used(),
            "budget progress"
        );
    }

    let bills = BillService::new(Arc::clone(context), demo.owner);
    bills
        .add_bill(NewBill {
            name: "Internet".to_string(),
            amount_cents: 4_999,
            due_date: today - ChronoDuration::days(3),
            recurrence: BillRecurrence::Monthly,
        })
        .await?;
    let overdue = bills.overdue(today).await?;
    info!(count = overdue.len(), "overdue bills");
    for bill in overdue {
        bills.set_paid(bill.id, true).await?;
    }
    Ok(())
}

async fn kanban_flows(context: &Arc<AppContext>, demo: &Demo) -> AppResult<()> {
    let kanban = KanbanService::new(Arc::clone(context), demo.owner);
    kanban.add_task(demo.board, "Review budget", "").await?;
    kanban
        .add_task(demo.board, "Cancel unused subscription", "Streaming service")
        .await?;
    if let Some(task) = kanban.column(demo.board, KanbanColumn::Todo).await?.first() {
        kanban.move_task(demo.board, task.id, KanbanColumn::Done, 0).await?;
    }
    for column in [KanbanColumn::Todo, KanbanColumn::InProgress, KanbanColumn::Done] {
        let tasks = kanban.column(demo.board, column).await?;
        info!(?column, count = tasks.len(), "kanban column");
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> AppResult<()> {
    let config = AppConfig::from_env();
    config.validate()?;
    init_tracing(&config)?;

    let demo = Demo {
        owner: new_entity_id(),
        list: new_entity_id(),
        milk: new_entity_id(),
        eggs: new_entity_id(),
        bread: new_entity_id(),
        board: new_entity_id(),
    };
    let store = Arc::new(InMemoryRemoteStore::new().with_latency(config.store_latency));
    store.seed(seed_records(&demo))?;

    let (notifier, mut notices) = ChannelNotifier::channel();
    let context = Arc::new(AppContext::new(config.clone(), store.clone(), Arc::new(notifier)));
    let janitor = context.spawn_janitor(config.retention.max(Duration::from_secs(1)));
    let toasts = tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            match notice.level {
                NoticeLevel::Success => info!(key = %notice.key, "toast: {}", notice.message),
                NoticeLevel::Error => warn!(key = %notice.key, "toast: {}", notice.message),
            }
        }
    });

    shopping_flows(&context, &store, &demo).await?;
    finance_flows(&context, &demo).await?;
    kanban_flows(&context, &demo).await?;

    // Let the toast task drain what is queued.
    tokio::task::yield_now().await;
    let stats = context.cache().stats();
    info!(
        hits = stats.hits,
        misses = stats.misses,
        fetches = stats.fetches,
        rollbacks = stats.rollbacks,
        entries = stats.entry_count,
        "cache stats"
    );

    janitor.abort();
    toasts.abort();
    Ok(())
}
