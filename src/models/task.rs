use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::error::{AppError, FieldError};
use crate::sanitizer::Sanitizer;

/// Represents the priority of a task.
/// Corresponds to the `task_priority` SQL enum.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    /// Sort position in listings: high first, low last.
    pub fn rank(self) -> u8 {
        match self {
            TaskPriority::High => 0,
            TaskPriority::Medium => 1,
            TaskPriority::Low => 2,
        }
    }
}

/// Represents a task entity as stored in the database and returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub priority: TaskPriority,
    /// Owning user. `None` marks an unscoped task visible to every caller.
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input structure for creating a task.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct TaskInput {
    /// Must be between 1 and 200 characters.
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,

    /// Maximum length of 1000 characters if provided.
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    #[serde(default)]
    pub completed: bool,

    /// Defaults to `medium` when omitted.
    #[serde(default)]
    pub priority: TaskPriority,
}

impl TaskInput {
    /// Validates lengths, then passes the free-text fields through the sanitizer.
    pub fn sanitized(self, sanitizer: &Sanitizer) -> Result<NewTask, AppError> {
        self.validate()?;

        let mut errors = Vec::new();
        let title = collect(&mut errors, sanitizer.clean_field("title", "Title", &self.title));
        let description = match &self.description {
            Some(text) => collect(
                &mut errors,
                sanitizer.clean_field("description", "Description", text),
            ),
            None => None,
        };

        match title {
            Some(title) if errors.is_empty() => Ok(NewTask {
                title,
                description,
                completed: self.completed,
                priority: self.priority,
            }),
            _ => Err(AppError::Validation(errors)),
        }
    }
}

/// Partial update. Absent fields are left untouched; `"description": null` clears it.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct TaskUpdate {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "present")]
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<Option<String>>,

    pub completed: Option<bool>,

    pub priority: Option<TaskPriority>,
}

impl TaskUpdate {
    pub fn sanitized(self, sanitizer: &Sanitizer) -> Result<TaskUpdate, AppError> {
        self.validate()?;

        let mut errors = Vec::new();
        let title = match &self.title {
            Some(text) => collect(&mut errors, sanitizer.clean_field("title", "Title", text)),
            None => None,
        };
        let description = match &self.description {
            Some(Some(text)) => Some(collect(
                &mut errors,
                sanitizer.clean_field("description", "Description", text),
            )),
            Some(None) => Some(None),
            None => None,
        };

        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        Ok(TaskUpdate {
            title,
            description,
            completed: self.completed,
            priority: self.priority,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.completed.is_none()
            && self.priority.is_none()
    }

    /// Applies the provided fields and bumps `updated_at`.
    pub fn apply_to(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        task.updated_at = Utc::now();
    }
}

/// A sanitized task ready to be stored; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub priority: TaskPriority,
}

/// Represents query parameters for listing tasks.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct TaskQuery {
    #[serde(default)]
    pub skip: u32,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 1000, message = "limit must be between 1 and 1000"))]
    pub limit: u32,
    pub priority: Option<TaskPriority>,
}

impl Default for TaskQuery {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: default_limit(),
            priority: None,
        }
    }
}

fn default_limit() -> u32 {
    100
}

fn collect<T>(errors: &mut Vec<FieldError>, result: Result<T, FieldError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            errors.push(e);
            None
        }
    }
}

/// Distinguishes an explicit `null` (`Some(None)`) from an absent field (`None`).
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
