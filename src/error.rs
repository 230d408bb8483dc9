//!
//! # Custom Error Handling
//!
//! This module defines the custom error type `AppError` used throughout the application.
//! Every failure a request can hit, from a duplicate email to an exhausted rate limit,
//! is one of its variants, and each variant maps to a stable HTTP status.
//!
//! `AppError` implements `actix_web::error::ResponseError`, rendering bodies of the form
//! `{"detail": "..."}`; validation failures add an `errors` list with one entry per field.
//! Internal failures are logged and answered with a generic message.

use std::fmt;

use actix_web::{
    error::{JsonPayloadError, PathError, QueryPayloadError, ResponseError},
    http::{header, StatusCode},
    HttpResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::ValidationErrors;

use crate::auth::token::TokenError;

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Represents all possible errors that can occur within the application.
#[derive(Debug)]
pub enum AppError {
    /// HTTP 400. Malformed requests that are not field validation failures.
    BadRequest(String),
    /// HTTP 401. Missing, invalid, expired or wrong-kind token, or bad credentials.
    Unauthorized(String),
    /// HTTP 404. Also used for records outside the caller's visibility.
    NotFound(String),
    /// HTTP 409. Duplicate unique value, e.g. an email already registered.
    Conflict(String),
    /// HTTP 413.
    PayloadTooLarge { limit: usize },
    /// HTTP 415.
    UnsupportedMediaType(String),
    /// HTTP 422 with a per-field error list.
    Validation(Vec<FieldError>),
    /// HTTP 429. `retry_after` is in seconds.
    RateLimited { retry_after: u64 },
    /// HTTP 500.
    InternalServerError(String),
    /// HTTP 500. Wraps errors from the `sqlx` crate.
    DatabaseError(String),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation(vec![FieldError::new(field, message)])
    }

    fn detail(&self) -> String {
        match self {
            AppError::BadRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::UnsupportedMediaType(msg) => msg.clone(),
            AppError::PayloadTooLarge { limit } => {
                format!("Request body too large (limit is {} bytes)", limit)
            }
            AppError::Validation(_) => "Validation failed".to_string(),
            AppError::RateLimited { .. } => "Rate limit exceeded".to_string(),
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::PayloadTooLarge { limit } => write!(f, "Payload Too Large: limit {}", limit),
            AppError::UnsupportedMediaType(msg) => write!(f, "Unsupported Media Type: {}", msg),
            AppError::Validation(errors) => {
                let fields: Vec<String> = errors
                    .iter()
                    .map(|e| format!("{}: {}", e.field, e.message))
                    .collect();
                write!(f, "Validation Error: {}", fields.join("; "))
            }
            AppError::RateLimited { retry_after } => {
                write!(f, "Rate Limited: retry after {}s", retry_after)
            }
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database Error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());

        match self {
            AppError::Unauthorized(_) => {
                builder.insert_header((header::WWW_AUTHENTICATE, "Bearer"));
            }
            AppError::RateLimited { retry_after } => {
                builder.insert_header((header::RETRY_AFTER, retry_after.to_string()));
            }
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                log::error!("{}", self);
            }
            _ => {}
        }

        match self {
            AppError::Validation(errors) => builder.json(json!({
                "detail": self.detail(),
                "errors": errors,
            })),
            _ => builder.json(json!({ "detail": self.detail() })),
        }
    }
}

/// Unique violations become `Conflict`, a missing row becomes `NotFound`, everything
/// else is a `DatabaseError`.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("Record already exists".into())
            }
            _ => AppError::DatabaseError(error.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(error: sqlx::migrate::MigrateError) -> AppError {
        AppError::DatabaseError(error.to_string())
    }
}

/// Flattens `validator` output into one `FieldError` per failed rule.
impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> AppError {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |err| {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value ({})", err.code));
                    FieldError::new(field, message)
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        AppError::Validation(fields)
    }
}

impl From<TokenError> for AppError {
    fn from(error: TokenError) -> AppError {
        match error {
            TokenError::Encoding(_) | TokenError::LifetimeOutOfRange(_) => {
                AppError::InternalServerError(format!("Failed to generate token: {}", error))
            }
            _ => AppError::Unauthorized("Could not validate credentials".into()),
        }
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}

impl From<JsonPayloadError> for AppError {
    fn from(error: JsonPayloadError) -> AppError {
        match error {
            JsonPayloadError::OverflowKnownLength { limit, .. }
            | JsonPayloadError::Overflow { limit } => AppError::PayloadTooLarge { limit },
            JsonPayloadError::ContentType => {
                AppError::UnsupportedMediaType("Content-Type must be application/json".into())
            }
            JsonPayloadError::Deserialize(e) => AppError::validation("body", e.to_string()),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

impl From<QueryPayloadError> for AppError {
    fn from(error: QueryPayloadError) -> AppError {
        AppError::validation("query", error.to_string())
    }
}

impl From<PathError> for AppError {
    fn from(error: PathError) -> AppError {
        AppError::validation("path", error.to_string())
    }
}
