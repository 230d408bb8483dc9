#![doc = "The `tasktracker` library crate."]
#![doc = ""]
#![doc = "A task tracking HTTP API: user accounts with JWT access and refresh tokens, tasks that"]
#![doc = "are either unscoped or owned by a user, input sanitization, request validation and"]
#![doc = "rate limiting. The binary (`main.rs`) loads configuration, builds an [`app::AppState`]"]
#![doc = "and serves [`app::configure`] with actix-web."]

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod sanitizer;
pub mod tasks;

pub use app::AppState;
pub use config::Config;
pub use error::AppError;
