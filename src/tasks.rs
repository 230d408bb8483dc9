//! Task use cases on top of a [`TaskRepository`].

use std::sync::Arc;

use validator::Validate;

use crate::error::AppError;
use crate::models::{Task, TaskInput, TaskQuery, TaskUpdate};
use crate::repository::{TaskFilter, TaskRepository};
use crate::sanitizer::Sanitizer;

#[derive(Clone)]
pub struct TaskService {
    repo: Arc<dyn TaskRepository>,
    sanitizer: Arc<Sanitizer>,
}

impl TaskService {
    pub fn new(repo: Arc<dyn TaskRepository>, sanitizer: Arc<Sanitizer>) -> Self {
        Self { repo, sanitizer }
    }

    /// Unscoped tasks plus the viewer's own, high priority first and newest first.
    pub async fn list(&self, query: TaskQuery, viewer: Option<i64>) -> Result<Vec<Task>, AppError> {
        query.validate()?;
        self.repo
            .list(TaskFilter {
                viewer,
                priority: query.priority,
                skip: query.skip,
                limit: query.limit,
            })
            .await
    }

    /// `None` both for unknown ids and for tasks owned by someone else.
    pub async fn get(&self, id: i64, viewer: Option<i64>) -> Result<Option<Task>, AppError> {
        self.repo.find(id, viewer).await
    }

    /// Owned by `owner` when given, otherwise unscoped.
    pub async fn create(&self, input: TaskInput, owner: Option<i64>) -> Result<Task, AppError> {
        let new_task = input.sanitized(&self.sanitizer)?;
        let task = self.repo.insert(new_task, owner).await?;
        log::info!("Created task {} (owner: {:?})", task.id, task.user_id);
        Ok(task)
    }

    /// Applies only the fields present in `update`.
    pub async fn update(&self, mut task: Task, update: TaskUpdate) -> Result<Task, AppError> {
        let update = update.sanitized(&self.sanitizer)?;
        if update.is_empty() {
            return Ok(task);
        }
        update.apply_to(&mut task);
        let task = self.repo.update(&task).await?;
        log::info!("Updated task {}", task.id);
        Ok(task)
    }

    pub async fn delete(&self, task: Task) -> Result<(), AppError> {
        if !self.repo.delete(task.id).await? {
            return Err(not_found(task.id));
        }
        log::info!("Deleted task {}", task.id);
        Ok(())
    }
}

pub fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Task with id {} not found", id))
}
