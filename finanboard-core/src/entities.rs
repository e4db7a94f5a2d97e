//! Record structures and their patches
//!
//! Every remote collection has a typed record and a patch whose fields are
//! all optional. [`Record`] and [`RecordPatch`] are the tagged variants the
//! cache and the mutation layer work with.

use crate::{
    BillRecurrence, CategoryKind, Cents, EntityId, EntityKind, FinanResult, KanbanColumn,
    OwnerId, RecordFilter, Timestamp, TransactionKind, ValidationError,
};
use chrono::{Datelike, NaiveDate};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

// ============================================================================
// RECORD TRAIT
// ============================================================================

/// Behaviour shared by every typed record.
pub trait DomainRecord: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Patch type for partial updates.
    type Patch: Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// The kind (and therefore collection) this record lives in.
    const KIND: EntityKind;

    fn id(&self) -> EntityId;

    fn owner_id(&self) -> OwnerId;

    fn created_at(&self) -> Timestamp;

    /// Check field-level constraints. Called at the store boundary.
    fn validate(&self) -> Result<(), ValidationError>;

    /// Return a copy with every `Some` field of the patch written over.
    fn apply(&self, patch: &Self::Patch) -> Self;

    /// Whether this record satisfies the scope part of a filter.
    ///
    /// Filter fields that do not apply to this kind are ignored.
    fn matches_scope(&self, _filter: &RecordFilter) -> bool {
        true
    }
}

fn require_text(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn require_non_negative(field: &str, amount: Cents) -> Result<(), ValidationError> {
    if amount < 0 {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: format!("must be non-negative, got {}", amount),
        });
    }
    Ok(())
}

fn month_year_matches(filter: &RecordFilter, month: u32, year: i32) -> bool {
    filter.month.map_or(true, |m| m == month) && filter.year.map_or(true, |y| y == year)
}

// ============================================================================
// SHOPPING
// ============================================================================

/// A named shopping list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShoppingList {
    pub id: EntityId,
    pub owner_id: OwnerId,
    pub name: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShoppingListPatch {
    pub name: Option<String>,
}

impl DomainRecord for ShoppingList {
    type Patch = ShoppingListPatch;
    const KIND: EntityKind = EntityKind::ShoppingList;

    fn id(&self) -> EntityId {
        self.id
    }

    fn owner_id(&self) -> OwnerId {
        self.owner_id
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)
    }

    fn apply(&self, patch: &Self::Patch) -> Self {
        let mut next = self.clone();
        if let Some(name) = &patch.name {
            next.name = name.clone();
        }
        next
    }
}

/// One line on a shopping list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShoppingItem {
    pub id: EntityId,
    pub owner_id: OwnerId,
    pub list_id: EntityId,
    pub name: String,
    pub quantity: u32,
    pub purchased: bool,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShoppingItemPatch {
    pub name: Option<String>,
    pub quantity: Option<u32>,
    pub purchased: Option<bool>,
}

impl ShoppingItemPatch {
    pub fn purchased(purchased: bool) -> Self {
        Self {
            purchased: Some(purchased),
            ..Default::default()
        }
    }
}

impl DomainRecord for ShoppingItem {
    type Patch = ShoppingItemPatch;
    const KIND: EntityKind = EntityKind::ShoppingItem;

    fn id(&self) -> EntityId {
        self.id
    }

    fn owner_id(&self) -> OwnerId {
        self.owner_id
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        if self.quantity == 0 {
            return Err(ValidationError::InvalidValue {
                field: "quantity".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    fn apply(&self, patch: &Self::Patch) -> Self {
        let mut next = self.clone();
        if let Some(name) = &patch.name {
            next.name = name.clone();
        }
        if let Some(quantity) = patch.quantity {
            next.quantity = quantity;
        }
        if let Some(purchased) = patch.purchased {
            next.purchased = purchased;
        }
        next
    }

    fn matches_scope(&self, filter: &RecordFilter) -> bool {
        filter.list_id.map_or(true, |list| list == self.list_id)
    }
}

// ============================================================================
// BUDGETS
// ============================================================================

/// Planned spending for one category in one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub id: EntityId,
    pub owner_id: OwnerId,
    pub category_id: EntityId,
    pub month: u32,
    pub year: i32,
    pub amount_cents: Cents,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetPatch {
    pub category_id: Option<EntityId>,
    pub amount_cents: Option<Cents>,
}

impl DomainRecord for Budget {
    type Patch = BudgetPatch;
    const KIND: EntityKind = EntityKind::Budget;

    fn id(&self) -> EntityId {
        self.id
    }

    fn owner_id(&self) -> OwnerId {
        self.owner_id
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if !(1..=12).contains(&self.month) {
            return Err(ValidationError::InvalidValue {
                field: "month".to_string(),
                reason: format!("must be between 1 and 12, got {}", self.month),
            });
        }
        if !(1970..=9999).contains(&self.year) {
            return Err(ValidationError::InvalidValue {
                field: "year".to_string(),
                reason: format!("out of range: {}", self.year),
            });
        }
        require_non_negative("amount_cents", self.amount_cents)
    }

    fn apply(&self, patch: &Self::Patch) -> Self {
        let mut next = self.clone();
        if let Some(category_id) = patch.category_id {
            next.category_id = category_id;
        }
        if let Some(amount) = patch.amount_cents {
            next.amount_cents = amount;
        }
        next
    }

    fn matches_scope(&self, filter: &RecordFilter) -> bool {
        month_year_matches(filter, self.month, self.year)
    }
}

// ============================================================================
// BILLS
// ============================================================================

/// A payable bill with a due date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bill {
    pub id: EntityId,
    pub owner_id: OwnerId,
    pub name: String,
    pub amount_cents: Cents,
    pub due_date: NaiveDate,
    pub recurrence: BillRecurrence,
    pub paid: bool,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillPatch {
    pub name: Option<String>,
    pub amount_cents: Option<Cents>,
    pub due_date: Option<NaiveDate>,
    pub recurrence: Option<BillRecurrence>,
    pub paid: Option<bool>,
}

impl Bill {
    /// Whether the bill is unpaid and its due date has passed.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.paid && self.due_date < today
    }
}

impl DomainRecord for Bill {
    type Patch = BillPatch;
    const KIND: EntityKind = EntityKind::Bill;

    fn id(&self) -> EntityId {
        self.id
    }

    fn owner_id(&self) -> OwnerId {
        self.owner_id
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        require_non_negative("amount_cents", self.amount_cents)
    }

    fn apply(&self, patch: &Self::Patch) -> Self {
        let mut next = self.clone();
        if let Some(name) = &patch.name {
            next.name = name.clone();
        }
        if let Some(amount) = patch.amount_cents {
            next.amount_cents = amount;
        }
        if let Some(due_date) = patch.due_date {
            next.due_date = due_date;
        }
        if let Some(recurrence) = patch.recurrence {
            next.recurrence = recurrence;
        }
        if let Some(paid) = patch.paid {
            next.paid = paid;
        }
        next
    }
}

// ============================================================================
// TRANSACTIONS
// ============================================================================

/// A ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: EntityId,
    pub owner_id: OwnerId,
    pub category_id: Option<EntityId>,
    pub kind: TransactionKind,
    pub amount_cents: Cents,
    pub description: String,
    pub occurred_on: NaiveDate,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPatch {
    pub category_id: Option<EntityId>,
    pub kind: Option<TransactionKind>,
    pub amount_cents: Option<Cents>,
    pub description: Option<String>,
    pub occurred_on: Option<NaiveDate>,
}

impl Transaction {
    /// Amount with sign applied: income positive, expense negative.
    pub fn signed_amount(&self) -> Cents {
        match self.kind {
            TransactionKind::Income => self.amount_cents,
            TransactionKind::Expense => -self.amount_cents,
        }
    }
}

impl DomainRecord for Transaction {
    type Patch = TransactionPatch;
    const KIND: EntityKind = EntityKind::Transaction;

    fn id(&self) -> EntityId {
        self.id
    }

    fn owner_id(&self) -> OwnerId {
        self.owner_id
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.amount_cents <= 0 {
            return Err(ValidationError::InvalidValue {
                field: "amount_cents".to_string(),
                reason: format!("must be positive, got {}", self.amount_cents),
            });
        }
        Ok(())
    }

    fn apply(&self, patch: &Self::Patch) -> Self {
        let mut next = self.clone();
        if let Some(category_id) = patch.category_id {
            next.category_id = Some(category_id);
        }
        if let Some(kind) = patch.kind {
            next.kind = kind;
        }
        if let Some(amount) = patch.amount_cents {
            next.amount_cents = amount;
        }
        if let Some(description) = &patch.description {
            next.description = description.clone();
        }
        if let Some(occurred_on) = patch.occurred_on {
            next.occurred_on = occurred_on;
        }
        next
    }

    fn matches_scope(&self, filter: &RecordFilter) -> bool {
        month_year_matches(filter, self.occurred_on.month(), self.occurred_on.year())
    }
}

// ============================================================================
// CATEGORIES
// ============================================================================

/// A user-defined income or expense category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: EntityId,
    pub owner_id: OwnerId,
    pub name: String,
    pub kind: CategoryKind,
    /// Display color as `#rrggbb`.
    pub color: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub color: Option<String>,
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

impl DomainRecord for Category {
    type Patch = CategoryPatch;
    const KIND: EntityKind = EntityKind::Category;

    fn id(&self) -> EntityId {
        self.id
    }

    fn owner_id(&self) -> OwnerId {
        self.owner_id
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        if !is_hex_color(&self.color) {
            return Err(ValidationError::InvalidValue {
                field: "color".to_string(),
                reason: format!("expected #rrggbb, got {:?}", self.color),
            });
        }
        Ok(())
    }

    fn apply(&self, patch: &Self::Patch) -> Self {
        let mut next = self.clone();
        if let Some(name) = &patch.name {
            next.name = name.clone();
        }
        if let Some(color) = &patch.color {
            next.color = color.clone();
        }
        next
    }
}

// ============================================================================
// KANBAN
// ============================================================================

/// A card on a kanban board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KanbanTask {
    pub id: EntityId,
    pub owner_id: OwnerId,
    pub board_id: EntityId,
    pub title: String,
    pub description: String,
    pub column: KanbanColumn,
    pub position: i32,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KanbanTaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub column: Option<KanbanColumn>,
    pub position: Option<i32>,
}

impl DomainRecord for KanbanTask {
    type Patch = KanbanTaskPatch;
    const KIND: EntityKind = EntityKind::KanbanTask;

    fn id(&self) -> EntityId {
        self.id
    }

    fn owner_id(&self) -> OwnerId {
        self.owner_id
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)?;
        if self.position < 0 {
            return Err(ValidationError::InvalidValue {
                field: "position".to_string(),
                reason: format!("must be non-negative, got {}", self.position),
            });
        }
        Ok(())
    }

    fn apply(&self, patch: &Self::Patch) -> Self {
        let mut next = self.clone();
        if let Some(title) = &patch.title {
            next.title = title.clone();
        }
        if let Some(description) = &patch.description {
            next.description = description.clone();
        }
        if let Some(column) = patch.column {
            next.column = column;
        }
        if let Some(position) = patch.position {
            next.position = position;
        }
        next
    }

    fn matches_scope(&self, filter: &RecordFilter) -> bool {
        filter.board_id.map_or(true, |board| board == self.board_id)
    }
}

// ============================================================================
// TAGGED VARIANTS
// ============================================================================

/// Any FinanBoard record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum Record {
    ShoppingList(ShoppingList),
    ShoppingItem(ShoppingItem),
    Budget(Budget),
    Bill(Bill),
    Transaction(Transaction),
    Category(Category),
    KanbanTask(KanbanTask),
}

/// A partial update for any FinanBoard record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "patch", rename_all = "snake_case")]
pub enum RecordPatch {
    ShoppingList(ShoppingListPatch),
    ShoppingItem(ShoppingItemPatch),
    Budget(BudgetPatch),
    Bill(BillPatch),
    Transaction(TransactionPatch),
    Category(CategoryPatch),
    KanbanTask(KanbanTaskPatch),
}

macro_rules! each_record {
    ($record:expr, $inner:ident => $body:expr) => {
        match $record {
            Record::ShoppingList($inner) => $body,
            Record::ShoppingItem($inner) => $body,
            Record::Budget($inner) => $body,
            Record::Bill($inner) => $body,
            Record::Transaction($inner) => $body,
            Record::Category($inner) => $body,
            Record::KanbanTask($inner) => $body,
        }
    };
}

fn decode_row<T: DomainRecord>(row: serde_json::Value) -> Result<T, ValidationError> {
    let record: T = serde_json::from_value(row).map_err(|e| ValidationError::RowDecode {
        kind: T::KIND,
        reason: e.to_string(),
    })?;
    record.validate()?;
    Ok(record)
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Record::ShoppingList(_) => EntityKind::ShoppingList,
            Record::ShoppingItem(_) => EntityKind::ShoppingItem,
            Record::Budget(_) => EntityKind::Budget,
            Record::Bill(_) => EntityKind::Bill,
            Record::Transaction(_) => EntityKind::Transaction,
            Record::Category(_) => EntityKind::Category,
            Record::KanbanTask(_) => EntityKind::KanbanTask,
        }
    }

    pub fn id(&self) -> EntityId {
        each_record!(self, r => r.id())
    }

    pub fn owner_id(&self) -> OwnerId {
        each_record!(self, r => r.owner_id())
    }

    pub fn created_at(&self) -> Timestamp {
        each_record!(self, r => r.created_at())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        each_record!(self, r => r.validate())
    }

    /// Whether the record belongs to the filter's owner and scope.
    pub fn matches(&self, filter: &RecordFilter) -> bool {
        let owner_ok = filter.owner_id.map_or(true, |owner| owner == self.owner_id());
        owner_ok && each_record!(self, r => r.matches_scope(filter))
    }

    /// Merge a patch into a copy of this record.
    ///
    /// Fails when the patch targets a different kind.
    pub fn apply_patch(&self, patch: &RecordPatch) -> FinanResult<Record> {
        let next = match (self, patch) {
            (Record::ShoppingList(r), RecordPatch::ShoppingList(p)) => Record::ShoppingList(r.apply(p)),
            (Record::ShoppingItem(r), RecordPatch::ShoppingItem(p)) => Record::ShoppingItem(r.apply(p)),
            (Record::Budget(r), RecordPatch::Budget(p)) => Record::Budget(r.apply(p)),
            (Record::Bill(r), RecordPatch::Bill(p)) => Record::Bill(r.apply(p)),
            (Record::Transaction(r), RecordPatch::Transaction(p)) => Record::Transaction(r.apply(p)),
            (Record::Category(r), RecordPatch::Category(p)) => Record::Category(r.apply(p)),
            (Record::KanbanTask(r), RecordPatch::KanbanTask(p)) => Record::KanbanTask(r.apply(p)),
            _ => {
                return Err(ValidationError::PatchKindMismatch {
                    expected: self.kind(),
                    got: patch.kind(),
                }
                .into())
            }
        };
        Ok(next)
    }

    /// Serialize to the untagged row shape stored in a remote collection.
    pub fn to_row(&self) -> Result<serde_json::Value, ValidationError> {
        let kind = self.kind();
        each_record!(self, r => serde_json::to_value(r)).map_err(|e| ValidationError::RowDecode {
            kind,
            reason: e.to_string(),
        })
    }

    /// Decode and validate a row read from the collection of `kind`.
    pub fn from_row(kind: EntityKind, row: serde_json::Value) -> Result<Record, ValidationError> {
        Ok(match kind {
            EntityKind::ShoppingList => Record::ShoppingList(decode_row(row)?),
            EntityKind::ShoppingItem => Record::ShoppingItem(decode_row(row)?),
            EntityKind::Budget => Record::Budget(decode_row(row)?),
            EntityKind::Bill => Record::Bill(decode_row(row)?),
            EntityKind::Transaction => Record::Transaction(decode_row(row)?),
            EntityKind::Category => Record::Category(decode_row(row)?),
            EntityKind::KanbanTask => Record::KanbanTask(decode_row(row)?),
        })
    }

    /// Copy of this record with every field `patch` sets taken from
    /// `original` instead. Fields the patch leaves alone keep their
    /// current values.
    pub fn restore_fields(
        &self,
        original: &Record,
        patch: &RecordPatch,
    ) -> Result<Record, ValidationError> {
        let kind = self.kind();
        if original.kind() != kind {
            return Err(ValidationError::KindMismatch {
                expected: kind,
                got: original.kind(),
            });
        }
        if patch.kind() != kind {
            return Err(ValidationError::PatchKindMismatch {
                expected: kind,
                got: patch.kind(),
            });
        }

        let mut row = self.to_row()?;
        let source = original.to_row()?;
        let touched = patch.to_fields()?;
        if let (Some(row), Some(source)) = (row.as_object_mut(), source.as_object()) {
            for (field, value) in touched {
                if value.is_null() {
                    continue;
                }
                if let Some(old) = source.get(&field) {
                    row.insert(field, old.clone());
                }
            }
        }
        Record::from_row(kind, row)
    }

    pub fn as_shopping_item(&self) -> Option<&ShoppingItem> {
        match self {
            Record::ShoppingItem(item) => Some(item),
            _ => None,
        }
    }

    pub fn as_budget(&self) -> Option<&Budget> {
        match self {
            Record::Budget(budget) => Some(budget),
            _ => None,
        }
    }

    pub fn as_bill(&self) -> Option<&Bill> {
        match self {
            Record::Bill(bill) => Some(bill),
            _ => None,
        }
    }

    pub fn as_transaction(&self) -> Option<&Transaction> {
        match self {
            Record::Transaction(tx) => Some(tx),
            _ => None,
        }
    }

    pub fn as_category(&self) -> Option<&Category> {
        match self {
            Record::Category(category) => Some(category),
            _ => None,
        }
    }

    pub fn as_kanban_task(&self) -> Option<&KanbanTask> {
        match self {
            Record::KanbanTask(task) => Some(task),
            _ => None,
        }
    }
}

macro_rules! each_patch {
    ($patch:expr, $inner:ident => $body:expr) => {
        match $patch {
            RecordPatch::ShoppingList($inner) => $body,
            RecordPatch::ShoppingItem($inner) => $body,
            RecordPatch::Budget($inner) => $body,
            RecordPatch::Bill($inner) => $body,
            RecordPatch::Transaction($inner) => $body,
            RecordPatch::Category($inner) => $body,
            RecordPatch::KanbanTask($inner) => $body,
        }
    };
}

impl RecordPatch {
    /// The patch as a field map. Unset fields map to `null`.
    pub fn to_fields(&self) -> Result<serde_json::Map<String, serde_json::Value>, ValidationError> {
        let kind = self.kind();
        let value = each_patch!(self, p => serde_json::to_value(p)).map_err(|e| {
            ValidationError::RowDecode {
                kind,
                reason: e.to_string(),
            }
        })?;
        match value {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(ValidationError::RowDecode {
                kind,
                reason: format!("patch is not an object: {}", other),
            }),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            RecordPatch::ShoppingList(_) => EntityKind::ShoppingList,
            RecordPatch::ShoppingItem(_) => EntityKind::ShoppingItem,
            RecordPatch::Budget(_) => EntityKind::Budget,
            RecordPatch::Bill(_) => EntityKind::Bill,
            RecordPatch::Transaction(_) => EntityKind::Transaction,
            RecordPatch::Category(_) => EntityKind::Category,
            RecordPatch::KanbanTask(_) => EntityKind::KanbanTask,
        }
    }
}

macro_rules! impl_from_record {
    ($($variant:ident => $record:ty, $patch:ty;)+) => {
        $(
            impl From<$record> for Record {
                fn from(record: $record) -> Self {
                    Record::$variant(record)
                }
            }

            impl From<$patch> for RecordPatch {
                fn from(patch: $patch) -> Self {
                    RecordPatch::$variant(patch)
                }
            }
        )+
    };
}

impl_from_record! {
    ShoppingList => ShoppingList, ShoppingListPatch;
    ShoppingItem => ShoppingItem, ShoppingItemPatch;
    Budget => Budget, BudgetPatch;
    Bill => Bill, BillPatch;
    Transaction => Transaction, TransactionPatch;
    Category => Category, CategoryPatch;
    KanbanTask => KanbanTask, KanbanTaskPatch;
}
