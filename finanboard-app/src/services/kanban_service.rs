//! Kanban Service

use chrono::Utc;
use finanboard_core::{
    new_entity_id, EntityId, EntityKind, KanbanColumn, KanbanTask, KanbanTaskPatch, OwnerId,
    QueryKey, Record,
};
use finanboard_mutation::{Mutation, MutationReport, MutationTracker};
use std::sync::Arc;

use super::{collect, run_tracked};
use crate::context::AppContext;
use crate::error::AppResult;

#[derive(Debug, Default)]
pub struct KanbanStatus {
    pub add_task: MutationTracker,
    pub move_task: MutationTracker,
    pub delete_task: MutationTracker,
}

pub struct KanbanService {
    context: Arc<AppContext>,
    owner: OwnerId,
    pub status: KanbanStatus,
}

impl KanbanService {
    pub fn new(context: Arc<AppContext>, owner: OwnerId) -> Self {
        Self {
            context,
            owner,
            status: KanbanStatus::default(),
        }
    }

    pub fn board_key(&self, board_id: EntityId) -> QueryKey {
        QueryKey::kanban_tasks(self.owner, board_id)
    }

    pub async fn tasks(&self, board_id: EntityId) -> AppResult<Vec<KanbanTask>> {
        let set = self.context.read(&self.board_key(board_id)).await?;
        Ok(collect(&set, Record::as_kanban_task))
    }

    /// Tasks of one column ordered by position.
    pub async fn column(&self, board_id: EntityId, column: KanbanColumn) -> AppResult<Vec<KanbanTask>> {
        let mut tasks: Vec<KanbanTask> = self
            .tasks(board_id)
            .await?
            .into_iter()
            .filter(|task| task.column == column)
            .collect();
        tasks.sort_by_key(|task| task.position);
        Ok(tasks)
    }

    /// Add a task at the bottom of the to-do column.
    pub async fn add_task(
        &self,
        board_id: EntityId,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> AppResult<MutationReport> {
        let position = self
            .column(board_id, KanbanColumn::Todo)
            .await?
            .last()
            .map_or(0, |task| task.position + 1);
        let task = KanbanTask {
            id: new_entity_id(),
            owner_id: self.owner,
            board_id,
            title: title.into(),
            description: description.into(),
            column: KanbanColumn::Todo,
            position,
            created_at: Utc::now(),
        };
        let mutation = Mutation::insertion(self.board_key(board_id), task);
        run_tracked(&self.context, &self.status.add_task, mutation).await
    }

    pub async fn move_task(
        &self,
        board_id: EntityId,
        task_id: EntityId,
        column: KanbanColumn,
        position: i32,
    ) -> AppResult<MutationReport> {
        let patch = KanbanTaskPatch {
            column: Some(column),
            position: Some(position),
            ..Default::default()
        };
        let mutation = Mutation::field_update(self.board_key(board_id), task_id, patch);
        run_tracked(&self.context, &self.status.move_task, mutation).await
    }

    pub async fn delete_task(&self, board_id: EntityId, task_id: EntityId) -> AppResult<MutationReport> {
        let mutation = Mutation::deletion(self.board_key(board_id), EntityKind::KanbanTask, task_id);
        run_tracked(&self.context, &self.status.delete_task, mutation).await
    }
}
