pub mod task;
pub mod user;

pub use task::{NewTask, Task, TaskInput, TaskPriority, TaskQuery, TaskUpdate};
pub use user::{normalize_email, NewUser, User, UserResponse};
