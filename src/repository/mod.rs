//! Storage seams for users and tasks.
//!
//! Services hold repositories as `Arc<dyn ...>` so the Postgres store and the in-memory
//! store are interchangeable.

pub mod memory;
pub mod postgres;

use std::cmp::Ordering;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{NewTask, NewUser, Task, TaskPriority, User};

pub use memory::{MemoryTaskRepository, MemoryUserRepository};
pub use postgres::{PgTaskRepository, PgUserRepository};

/// Which tasks a listing returns and how many.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskFilter {
    /// The caller. `None` sees only unscoped tasks.
    pub viewer: Option<i64>,
    pub priority: Option<TaskPriority>,
    pub skip: u32,
    pub limit: u32,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `AppError::Conflict` when the email is taken.
    async fn insert(&self, user: NewUser) -> Result<User, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Replaces the stored hash and bumps `updated_at`. Returns false if no such user.
    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, AppError>;

    async fn set_active(&self, id: i64, active: bool) -> Result<bool, AppError>;
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Visible tasks ordered high → medium → low, newest first within a priority,
    /// then paginated.
    async fn list(&self, filter: TaskFilter) -> Result<Vec<Task>, AppError>;

    /// Single lookup under the same visibility rule as `list`.
    async fn find(&self, id: i64, viewer: Option<i64>) -> Result<Option<Task>, AppError>;

    async fn insert(&self, task: NewTask, owner: Option<i64>) -> Result<Task, AppError>;

    /// Persists every mutable field of `task` and returns the stored row.
    async fn update(&self, task: &Task) -> Result<Task, AppError>;

    /// Returns false if the task did not exist.
    async fn delete(&self, id: i64) -> Result<bool, AppError>;
}

/// Unscoped tasks are visible to everyone; owned tasks only to their owner.
pub fn is_visible(task: &Task, viewer: Option<i64>) -> bool {
    match task.user_id {
        None => true,
        Some(owner) => viewer == Some(owner),
    }
}

/// Listing order. Ties on `created_at` fall back to the newer id.
pub fn listing_order(a: &Task, b: &Task) -> Ordering {
    a.priority
        .rank()
        .cmp(&b.priority.rank())
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| b.id.cmp(&a.id))
}
