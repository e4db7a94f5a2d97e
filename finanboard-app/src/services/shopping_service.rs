//! Shopping Service
//!
//! Shopping lists and their items. Item changes are optimistic so ticking
//! an item off feels instant.

use chrono::Utc;
use finanboard_core::{
    new_entity_id, EntityId, EntityKind, OwnerId, QueryKey, Record, ShoppingItem,
    ShoppingItemPatch, ShoppingList, ShoppingListPatch,
};
use finanboard_mutation::{Mutation, MutationReport, MutationTracker};
use finanboard_storage::WriteOp;
use std::sync::Arc;

use super::{collect, run_tracked};
use crate::context::AppContext;
use crate::error::AppResult;

/// Status of each shopping mutation.
#[derive(Debug, Default)]
pub struct ShoppingStatus {
    pub create_list: MutationTracker,
    pub rename_list: MutationTracker,
    pub delete_list: MutationTracker,
    pub add_item: MutationTracker,
    pub toggle_item: MutationTracker,
    pub update_item: MutationTracker,
    pub delete_item: MutationTracker,
}

pub struct ShoppingService {
    context: Arc<AppContext>,
    owner: OwnerId,
    pub status: ShoppingStatus,
}

impl ShoppingService {
    pub fn new(context: Arc<AppContext>, owner: OwnerId) -> Self {
        Self {
            context,
            owner,
            status: ShoppingStatus::default(),
        }
    }

    pub fn lists_key(&self) -> QueryKey {
        QueryKey::shopping_lists(self.owner)
    }

    pub fn items_key(&self, list_id: EntityId) -> QueryKey {
        QueryKey::shopping_items(self.owner, list_id)
    }

    pub async fn lists(&self) -> AppResult<Vec<ShoppingList>> {
        let set = self.context.read(&self.lists_key()).await?;
        Ok(collect(&set, |record| match record {
            Record::ShoppingList(list) => Some(list),
            _ => None,
        }))
    }

    pub async fn items(&self, list_id: EntityId) -> AppResult<Vec<ShoppingItem>> {
        let set = self.context.read(&self.items_key(list_id)).await?;
        Ok(collect(&set, Record::as_shopping_item))
    }

    pub async fn create_list(&self, name: impl Into<String>) -> AppResult<MutationReport> {
        let list = ShoppingList {
            id: new_entity_id(),
            owner_id: self.owner,
            name: name.into(),
            created_at: Utc::now(),
        };
        let mutation = Mutation::new(self.lists_key(), WriteOp::insert(list))
            .with_success_notice("List created");
        run_tracked(&self.context, &self.status.create_list, mutation).await
    }

    pub async fn rename_list(
        &self,
        list_id: EntityId,
        name: impl Into<String>,
    ) -> AppResult<MutationReport> {
        let patch = ShoppingListPatch {
            name: Some(name.into()),
        };
        let mutation = Mutation::field_update(self.lists_key(), list_id, patch);
        run_tracked(&self.context, &self.status.rename_list, mutation).await
    }

    /// Delete a list. Its cached items are dropped once the delete lands.
    pub async fn delete_list(&self, list_id: EntityId) -> AppResult<MutationReport> {
        let mutation = Mutation::deletion(self.lists_key(), EntityKind::ShoppingList, list_id)
            .with_success_notice("List deleted");
        let report = run_tracked(&self.context, &self.status.delete_list, mutation).await?;
        self.context.cache().remove(&self.items_key(list_id));
        Ok(report)
    }

    /// Add an item. It shows at the end of the list right away.
    pub async fn add_item(
        &self,
        list_id: EntityId,
        name: impl Into<String>,
        quantity: u32,
    ) -> AppResult<MutationReport> {
        let item = ShoppingItem {
            id: new_entity_id(),
            owner_id: self.owner,
            list_id,
            name: name.into(),
            quantity,
            purchased: false,
            created_at: Utc::now(),
        };
        let mutation = Mutation::insertion(self.items_key(list_id), item);
        run_tracked(&self.context, &self.status.add_item, mutation).await
    }

    pub async fn toggle_item(
        &self,
        list_id: EntityId,
        item_id: EntityId,
        purchased: bool,
    ) -> AppResult<MutationReport> {
        let mutation = Mutation::field_update(
            self.items_key(list_id),
            item_id,
            ShoppingItemPatch::purchased(purchased),
        );
        run_tracked(&self.context, &self.status.toggle_item, mutation).await
    }

    pub async fn update_item(
        &self,
        list_id: EntityId,
        item_id: EntityId,
        patch: ShoppingItemPatch,
    ) -> AppResult<MutationReport> {
        let mutation = Mutation::field_update(self.items_key(list_id), item_id, patch)
            .with_success_notice("Item updated");
        run_tracked(&self.context, &self.status.update_item, mutation).await
    }

    pub async fn delete_item(&self, list_id: EntityId, item_id: EntityId) -> AppResult<MutationReport> {
        let mutation = Mutation::deletion(self.items_key(list_id), EntityKind::ShoppingItem, item_id);
        run_tracked(&self.context, &self.status.delete_item, mutation).await
    }
}
