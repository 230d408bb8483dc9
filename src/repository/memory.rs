//! In-process stores with the same semantics as the Postgres ones.
//!
//! Used when no `DATABASE_URL` is configured, and by the test suite.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{is_visible, listing_order, TaskFilter, TaskRepository, UserRepository};
use crate::error::AppError;
use crate::models::{NewTask, NewUser, Task, User};

struct Table<T> {
    rows: Vec<T>,
    next_id: i64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            next_id: 1,
        }
    }
}

impl<T> Table<T> {
    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

#[derive(Default)]
pub struct MemoryUserRepository {
    table: RwLock<Table<User>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn insert(&self, user: NewUser) -> Result<User, AppError> {
        let mut table = self.table.write().await;
        if table.rows.iter().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("Email address is already registered".into()));
        }

        let now = Utc::now();
        let stored = User {
            id: table.allocate_id(),
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        table.rows.push(stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let table = self.table.read().await;
        Ok(table.rows.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let table = self.table.read().await;
        Ok(table.rows.iter().find(|u| u.email == email).cloned())
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, AppError> {
        let mut table = self.table.write().await;
        match table.rows.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_active(&self, id: i64, active: bool) -> Result<bool, AppError> {
        let mut table = self.table.write().await;
        match table.rows.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.is_active = active;
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct MemoryTaskRepository {
    table: RwLock<Table<Task>>,
}

impl MemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskRepository for MemoryTaskRepository {
    async fn list(&self, filter: TaskFilter) -> Result<Vec<Task>, AppError> {
        let table = self.table.read().await;
        let mut visible: Vec<Task> = table
            .rows
            .iter()
            .filter(|t| is_visible(t, filter.viewer))
            .filter(|t| filter.priority.map_or(true, |p| t.priority == p))
            .cloned()
            .collect();
        visible.sort_by(listing_order);

        Ok(visible
            .into_iter()
            .skip(filter.skip as usize)
            .take(filter.limit as usize)
            .collect())
    }

    async fn find(&self, id: i64, viewer: Option<i64>) -> Result<Option<Task>, AppError> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .iter()
            .find(|t| t.id == id && is_visible(t, viewer))
            .cloned())
    }

    async fn insert(&self, task: NewTask, owner: Option<i64>) -> Result<Task, AppError> {
        let mut table = self.table.write().await;
        let now = Utc::now();
        let stored = Task {
            id: table.allocate_id(),
            title: task.title,
            description: task.description,
            completed: task.completed,
            priority: task.priority,
            user_id: owner,
            created_at: now,
            updated_at: now,
        };
        table.rows.push(stored.clone());
        Ok(stored)
    }

    async fn update(&self, task: &Task) -> Result<Task, AppError> {
        let mut table = self.table.write().await;
        let stored = table
            .rows
            .iter_mut()
            .find(|t| t.id == task.id)
            .ok_or_else(|| AppError::NotFound(format!("Task with id {} not found", task.id)))?;

        stored.title = task.title.clone();
        stored.description = task.description.clone();
        stored.completed = task.completed;
        stored.priority = task.priority;
        stored.updated_at = task.updated_at;
        Ok(stored.clone())
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let mut table = self.table.write().await;
        let before = table.rows.len();
        table.rows.retain(|t| t.id != id);
        Ok(table.rows.len() != before)
    }
}
