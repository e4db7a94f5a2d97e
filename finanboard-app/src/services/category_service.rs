//! Category Service

use chrono::Utc;
use finanboard_core::{
    new_entity_id, Category, CategoryKind, CategoryPatch, EntityId, EntityKind, OwnerId,
    QueryKey, Record,
};
use finanboard_mutation::{Mutation, MutationReport, MutationTracker};
use finanboard_storage::WriteOp;
use std::sync::Arc;

use super::{collect, run_tracked};
use crate::context::AppContext;
use crate::error::AppResult;

#[derive(Debug, Default)]
pub struct CategoryStatus {
    pub create: MutationTracker,
    pub rename: MutationTracker,
    pub delete: MutationTracker,
}

pub struct CategoryService {
    context: Arc<AppContext>,
    owner: OwnerId,
    pub status: CategoryStatus,
}

impl CategoryService {
    pub fn new(context: Arc<AppContext>, owner: OwnerId) -> Self {
        Self {
            context,
            owner,
            status: CategoryStatus::default(),
        }
    }

    pub fn key(&self) -> QueryKey {
        QueryKey::categories(self.owner)
    }

    pub async fn categories(&self) -> AppResult<Vec<Category>> {
        let set = self.context.read(&self.key()).await?;
        Ok(collect(&set, Record::as_category))
    }

    pub async fn create(
        &self,
        name: impl Into<String>,
        kind: CategoryKind,
        color: impl Into<String>,
    ) -> AppResult<MutationReport> {
        let category = Category {
            id: new_entity_id(),
            owner_id: self.owner,
            name: name.into(),
            kind,
            color: color.into(),
            created_at: Utc::now(),
        };
        let mutation = Mutation::new(self.key(), WriteOp::insert(category))
            .with_success_notice("Category created");
        run_tracked(&self.context, &self.status.create, mutation).await
    }

    pub async fn rename(&self, category_id: EntityId, name: impl Into<String>) -> AppResult<MutationReport> {
        let patch = CategoryPatch {
            name: Some(name.into()),
            ..Default::default()
        };
        let mutation = Mutation::new(self.key(), WriteOp::update(category_id, patch))
            .with_success_notice("Category renamed");
        run_tracked(&self.context, &self.status.rename, mutation).await
    }

    /// Delete a category. Transactions and budgets that referenced it are
    /// refetched.
    pub async fn delete(&self, category_id: EntityId) -> AppResult<MutationReport> {
        let mutation = Mutation::new(self.key(), WriteOp::delete(EntityKind::Category, category_id))
            .also_invalidate(QueryKey::new(EntityKind::Transaction, self.owner))
            .also_invalidate(QueryKey::new(EntityKind::Budget, self.owner))
            .with_success_notice("Category deleted");
        run_tracked(&self.context, &self.status.delete, mutation).await
    }
}
