//! Screen services against an in-memory store.

use finanboard_app::{
    AppContext, AppError, BillService, BudgetService, CategoryService, KanbanService,
    NewTransaction, ShoppingService, SummaryService, TransactionService,
};
use finanboard_core::{AppConfig, MutationStatus};
use finanboard_mutation::{ChannelNotifier, Notice, NoticeLevel, ReconcileOutcome};
use finanboard_test_utils::fixtures::*;
use finanboard_test_utils::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

fn context_over(
    store: &Arc<InMemoryRemoteStore>,
    config: AppConfig,
) -> (Arc<AppContext>, UnboundedReceiver<Notice>) {
    let (notifier, notices) = ChannelNotifier::channel();
    let context = AppContext::new(config, store.clone(), Arc::new(notifier));
    (Arc::new(context), notices)
}

fn shopping_store() -> Arc<InMemoryRemoteStore> {
    let mut records = vec![Record::from(shopping_list())];
    records.extend(shopping_items(3));
    seeded_store(records)
}

fn drain(notices: &mut UnboundedReceiver<Notice>) -> Vec<Notice> {
    let mut drained = Vec::new();
    while let Ok(notice) = notices.try_recv() {
        drained.push(notice);
    }
    drained
}

// ============================================================================
// Shopping
// ============================================================================

#[tokio::test]
async fn test_toggle_item_commits_and_reports_success() {
    let store = shopping_store();
    let (context, _notices) = context_over(&store, AppConfig::default());
    let shopping = ShoppingService::new(context.clone(), owner());

    shopping.items(list_id()).await.unwrap();
    let report = shopping.toggle_item(list_id(), id(2), true).await.unwrap();

    assert!(report.optimistic);
    assert_eq!(report.reconciliation, ReconcileOutcome::Refetched);
    assert_eq!(shopping.status.toggle_item.status(), MutationStatus::Success);

    let items = shopping.items(list_id()).await.unwrap();
    let purchased: Vec<_> = items.iter().filter(|i| i.purchased).map(|i| i.id).collect();
    assert_eq!(purchased, vec![id(2)]);
    assert_eq!(store.write_count(), 1);
}

#[tokio::test]
async fn test_rejected_toggle_rolls_back_and_notifies() {
    let store = shopping_store();
    let (context, mut notices) = context_over(&store, AppConfig::default());
    let shopping = ShoppingService::new(context.clone(), owner());
    let key = shopping.items_key(list_id());

    shopping.items(list_id()).await.unwrap();
    let before = context.cache().data(&key).unwrap();
    store
        .fail_next_write(StorageError::Unavailable {
            reason: "offline".to_string(),
        })
        .unwrap();

    let err = shopping.toggle_item(list_id(), id(1), true).await.unwrap_err();

    assert!(matches!(err, AppError::Mutation(_)));
    assert_eq!(
        err.user_message(),
        "The server could not be reached. Please try again."
    );
    assert_eq!(shopping.status.toggle_item.status(), MutationStatus::Error);
    assert_eq!(context.cache().data(&key).unwrap(), before);
    assert_eq!(context.cache().stats().rollbacks, 1);

    let drained = drain(&mut notices);
    assert_eq!(drained.len(), 1);
    assert_eq!(drained[0].level, NoticeLevel::Error);
    assert_eq!(drained[0].key, key);
}

#[tokio::test]
async fn test_toggle_of_unknown_item_reaches_store() {
    let store = shopping_store();
    let (context, _notices) = context_over(&store, AppConfig::default());
    let shopping = ShoppingService::new(context.clone(), owner());
    let key = shopping.items_key(list_id());

    shopping.items(list_id()).await.unwrap();
    let before = context.cache().data(&key).unwrap();

    let err = shopping.toggle_item(list_id(), id(404), true).await.unwrap_err();

    assert!(matches!(
        err.cause(),
        Some(FinanError::Storage(StorageError::NotFound { .. }))
    ));
    assert_eq!(store.write_count(), 1);
    assert_eq!(context.cache().data(&key).unwrap(), before);
    assert_eq!(shopping.status.toggle_item.status(), MutationStatus::Error);
}

#[tokio::test]
async fn test_add_and_delete_items() {
    let store = shopping_store();
    let (context, _notices) = context_over(&store, AppConfig::default());
    let shopping = ShoppingService::new(context, owner());

    shopping.items(list_id()).await.unwrap();
    shopping.add_item(list_id(), "Coffee", 2).await.unwrap();
    shopping.delete_item(list_id(), id(1)).await.unwrap();

    let names: Vec<String> = shopping
        .items(list_id())
        .await
        .unwrap()
        .into_iter()
        .map(|item| item.name)
        .collect();
    assert_eq!(names, vec!["item 2", "item 3", "Coffee"]);
    assert_eq!(shopping.status.add_item.status(), MutationStatus::Success);
    assert_eq!(shopping.status.delete_item.status(), MutationStatus::Success);
}

#[tokio::test]
async fn test_delete_list_drops_its_items_query() {
    let store = shopping_store();
    let (context, mut notices) = context_over(&store, AppConfig::default());
    let shopping = ShoppingService::new(context.clone(), owner());

    shopping.lists().await.unwrap();
    shopping.items(list_id()).await.unwrap();
    shopping.delete_list(list_id()).await.unwrap();

    assert!(shopping.lists().await.unwrap().is_empty());
    assert!(!context.cache().contains(&shopping.items_key(list_id())));
    let drained = drain(&mut notices);
    assert!(drained.iter().all(|n| n.level == NoticeLevel::Success));
}

#[tokio::test]
async fn test_create_and_rename_list_track_separately() {
    let store = seeded_store(Vec::new());
    let (context, _notices) = context_over(&store, AppConfig::default());
    let shopping = ShoppingService::new(context, owner());

    shopping.create_list("Party").await.unwrap();
    let list = shopping.lists().await.unwrap().remove(0);
    store
        .fail_next_write(StorageError::Unavailable {
            reason: "offline".to_string(),
        })
        .unwrap();
    assert!(shopping.rename_list(list.id, "BBQ").await.is_err());

    assert_eq!(shopping.status.create_list.status(), MutationStatus::Success);
    assert_eq!(shopping.status.rename_list.status(), MutationStatus::Error);
    assert_eq!(shopping.lists().await.unwrap()[0].name, "Party");
}

// ============================================================================
// Finances
// ============================================================================

fn ledger_store() -> Arc<InMemoryRemoteStore> {
    seeded_store(vec![
        Record::from(groceries()),
        Record::from(salary()),
        Record::from(budget(10, 20_000)),
        Record::from(transaction(20, TransactionKind::Income, 300_000)),
        Record::from(transaction(21, TransactionKind::Expense, 15_000)),
    ])
}

#[tokio::test]
async fn test_month_summary() {
    let store = ledger_store();
    let (context, _notices) = context_over(&store, AppConfig::default());

    let summary = SummaryService::new(context, owner())
        .month_summary(3, 2024)
        .await
        .unwrap();

    assert_eq!(summary.totals.income, 300_000);
    assert_eq!(summary.totals.expense, 15_000);
    assert_eq!(summary.totals.balance, 285_000);
    assert_eq!(summary.budgets.len(), 1);
    assert_eq!(summary.budgets[0].category_name.as_deref(), Some("Groceries"));
    assert_eq!(summary.budgets[0].percent_used(), 75);
}

#[tokio::test]
async fn test_transaction_refreshes_ledger_queries() {
    let store = ledger_store();
    let (context, _notices) = context_over(&store, AppConfig::default());
    let transactions = TransactionService::new(context.clone(), owner());
    let summary = SummaryService::new(context.clone(), owner());

    summary.month_summary(3, 2024).await.unwrap();
    let budgets_key = QueryKey::budgets(owner(), 3, 2024);
    let budgets_version = context.cache().version(&budgets_key);

    transactions
        .add(NewTransaction {
            category_id: Some(groceries_id()),
            kind: TransactionKind::Expense,
            amount_cents: 10_000,
            description: "Market".to_string(),
            occurred_on: day(2024, 3, 20),
        })
        .await
        .unwrap();

    // The budget month was refetched alongside the transaction month.
    assert!(context.cache().version(&budgets_key) > budgets_version);
    let after = summary.month_summary(3, 2024).await.unwrap();
    assert_eq!(after.totals.expense, 25_000);
    assert!(after.budgets[0].is_over());
    assert_eq!(transactions.status.add.status(), MutationStatus::Success);
}

#[tokio::test]
async fn test_delete_transaction_of_other_month_leaves_month_alone() {
    let store = ledger_store();
    let (context, _notices) = context_over(&store, AppConfig::default());
    let transactions = TransactionService::new(context, owner());

    transactions.delete(3, 2024, id(21)).await.unwrap();

    let march = transactions.transactions(3, 2024).await.unwrap();
    assert_eq!(march.len(), 1);
    assert!(transactions.transactions(4, 2024).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_budget_amount_update_is_optimistic() {
    let store = ledger_store();
    let (context, _notices) = context_over(&store, AppConfig::default());
    let budgets = BudgetService::new(context, owner());

    budgets.budgets(3, 2024).await.unwrap();
    let report = budgets.update_amount(3, 2024, id(10), 50_000).await.unwrap();

    assert!(report.optimistic);
    assert_eq!(budgets.budgets(3, 2024).await.unwrap()[0].amount_cents, 50_000);
}

#[tokio::test]
async fn test_delete_category_keeps_other_categories() {
    let store = ledger_store();
    let (context, _notices) = context_over(&store, AppConfig::default());
    let categories = CategoryService::new(context, owner());

    categories.categories().await.unwrap();
    categories.delete(groceries_id()).await.unwrap();

    let remaining = categories.categories().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, salary_id());
    assert_eq!(categories.status.delete.status(), MutationStatus::Success);
}

#[tokio::test]
async fn test_overdue_bills_and_paying_them() {
    let mut paid = bill(3, day(2024, 2, 1));
    paid.paid = true;
    let store = seeded_store(vec![
        Record::from(bill(1, day(2024, 3, 1))),
        Record::from(bill(2, day(2024, 4, 1))),
        Record::from(paid),
    ]);
    let (context, _notices) = context_over(&store, AppConfig::default());
    let bills = BillService::new(context, owner());

    let overdue = bills.overdue(day(2024, 3, 15)).await.unwrap();
    assert_eq!(overdue.iter().map(|b| b.id).collect::<Vec<_>>(), vec![id(1)]);

    bills.set_paid(id(1), true).await.unwrap();
    assert!(bills.overdue(day(2024, 3, 15)).await.unwrap().is_empty());
    assert_eq!(bills.status.set_paid.status(), MutationStatus::Success);
}

// ============================================================================
// Kanban
// ============================================================================

fn board_store() -> Arc<InMemoryRemoteStore> {
    seeded_store(vec![
        Record::from(kanban_task(1, KanbanColumn::Todo)),
        Record::from(kanban_task(2, KanbanColumn::Todo)),
        Record::from(kanban_task(3, KanbanColumn::InProgress)),
    ])
}

#[tokio::test]
async fn test_move_task_between_columns() {
    let store = board_store();
    let (context, _notices) = context_over(&store, AppConfig::default());
    let kanban = KanbanService::new(context, owner());

    kanban.tasks(board_id()).await.unwrap();
    kanban
        .move_task(board_id(), id(1), KanbanColumn::Done, 0)
        .await
        .unwrap();

    let done = kanban.column(board_id(), KanbanColumn::Done).await.unwrap();
    let todo = kanban.column(board_id(), KanbanColumn::Todo).await.unwrap();
    assert_eq!(done.iter().map(|t| t.id).collect::<Vec<_>>(), vec![id(1)]);
    assert_eq!(todo.iter().map(|t| t.id).collect::<Vec<_>>(), vec![id(2)]);
    assert_eq!(kanban.status.move_task.status(), MutationStatus::Success);
}

#[tokio::test]
async fn test_new_task_goes_to_bottom_of_todo() {
    let store = board_store();
    let (context, _notices) = context_over(&store, AppConfig::default());
    let kanban = KanbanService::new(context, owner());

    kanban.add_task(board_id(), "Plan trip", "").await.unwrap();

    let todo = kanban.column(board_id(), KanbanColumn::Todo).await.unwrap();
    assert_eq!(todo.len(), 3);
    assert_eq!(todo[2].title, "Plan trip");
    assert_eq!(todo[2].position, 3);
}

#[tokio::test]
async fn test_delete_task() {
    let store = board_store();
    let (context, _notices) = context_over(&store, AppConfig::default());
    let kanban = KanbanService::new(context, owner());

    kanban.tasks(board_id()).await.unwrap();
    kanban.delete_task(board_id(), id(3)).await.unwrap();

    let tasks = kanban.tasks(board_id()).await.unwrap();
    assert!(tasks.iter().all(|t| t.id != id(3)));
    assert_eq!(tasks.len(), 2);
}

// ============================================================================
// Context
// ============================================================================

#[tokio::test]
async fn test_evict_idle_with_zero_retention() {
    let store = shopping_store();
    let config = AppConfig {
        retention: Duration::ZERO,
        ..AppConfig::default()
    };
    let (context, _notices) = context_over(&store, config);
    let shopping = ShoppingService::new(context.clone(), owner());

    shopping.items(list_id()).await.unwrap();
    let evicted = context.evict_idle();

    assert_eq!(evicted, vec![shopping.items_key(list_id())]);
    assert!(context.cache().is_empty());
}
