//! Composite query keys
//!
//! A query key is the ordered tuple `(kind, owner, scope...)` that addresses
//! one cached result set. A key with fewer scope parameters is a prefix of
//! every key that extends it, which is how a single invalidation reaches all
//! months of an owner's budgets.

use crate::{EntityId, EntityKind, OwnerId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One scope parameter of a query key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeParam {
    List(EntityId),
    Board(EntityId),
    Month(u32),
    Year(i32),
}

impl fmt::Display for ScopeParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeParam::List(id) => write!(f, "list={}", id),
            ScopeParam::Board(id) => write!(f, "board={}", id),
            ScopeParam::Month(m) => write!(f, "month={}", m),
            ScopeParam::Year(y) => write!(f, "year={}", y),
        }
    }
}

/// Filter passed to the remote store's `read`.
///
/// `None` fields do not constrain the read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub owner_id: Option<OwnerId>,
    pub list_id: Option<EntityId>,
    pub board_id: Option<EntityId>,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

impl RecordFilter {
    pub fn owner(owner_id: OwnerId) -> Self {
        Self {
            owner_id: Some(owner_id),
            ..Default::default()
        }
    }
}

/// Key of one cached query result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryKey {
    kind: EntityKind,
    owner_id: OwnerId,
    scope: Vec<ScopeParam>,
}

impl QueryKey {
    /// Key with no scope parameters. Also the prefix of every key for
    /// this kind and owner.
    pub fn new(kind: EntityKind, owner_id: OwnerId) -> Self {
        Self {
            kind,
            owner_id,
            scope: Vec::new(),
        }
    }

    /// Append a scope parameter.
    pub fn with(mut self, param: ScopeParam) -> Self {
        self.scope.push(param);
        self
    }

    pub fn shopping_lists(owner_id: OwnerId) -> Self {
        Self::new(EntityKind::ShoppingList, owner_id)
    }

    pub fn shopping_items(owner_id: OwnerId, list_id: EntityId) -> Self {
        Self::new(EntityKind::ShoppingItem, owner_id).with(ScopeParam::List(list_id))
    }

    pub fn budgets(owner_id: OwnerId, month: u32, year: i32) -> Self {
        Self::new(EntityKind::Budget, owner_id)
            .with(ScopeParam::Year(year))
            .with(ScopeParam::Month(month))
    }

    pub fn transactions(owner_id: OwnerId, month: u32, year: i32) -> Self {
        Self::new(EntityKind::Transaction, owner_id)
            .with(ScopeParam::Year(year))
            .with(ScopeParam::Month(month))
    }

    pub fn bills(owner_id: OwnerId) -> Self {
        Self::new(EntityKind::Bill, owner_id)
    }

    pub fn categories(owner_id: OwnerId) -> Self {
        Self::new(EntityKind::Category, owner_id)
    }

    pub fn kanban_tasks(owner_id: OwnerId, board_id: EntityId) -> Self {
        Self::new(EntityKind::KanbanTask, owner_id).with(ScopeParam::Board(board_id))
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn owner_id(&self) -> OwnerId {
        self.owner_id
    }

    pub fn scope(&self) -> &[ScopeParam] {
        &self.scope
    }

    /// Whether `other` begins with this key.
    ///
    /// Every key is a prefix of itself.
    pub fn is_prefix_of(&self, other: &QueryKey) -> bool {
        self.kind == other.kind
            && self.owner_id == other.owner_id
            && other.scope.len() >= self.scope.len()
            && other.scope[..self.scope.len()] == self.scope[..]
    }

    /// Remote store filter selecting the rows this key caches.
    pub fn to_filter(&self) -> RecordFilter {
        let mut filter = RecordFilter::owner(self.owner_id);
        for param in &self.scope {
            match *param {
                ScopeParam::List(id) => filter.list_id = Some(id),
                ScopeParam::Board(id) => filter.board_id = Some(id),
                ScopeParam::Month(m) => filter.month = Some(m),
                ScopeParam::Year(y) => filter.year = Some(y),
            }
        }
        filter
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.owner_id)?;
        for param in &self.scope {
            write!(f, "/{}", param)?;
        }
        Ok(())
    }
}
