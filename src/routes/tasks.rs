use actix_web::{delete, get, post, put, web, HttpResponse, Responder};

use crate::{
    app::AppState,
    auth::MaybeUser,
    error::AppError,
    models::{TaskInput, TaskQuery, TaskUpdate},
    tasks::not_found,
};

/// Lists the tasks visible to the caller.
///
/// Anonymous callers see unscoped tasks only; authenticated callers also see their own.
/// Results are ordered high → medium → low priority, newest first within a priority.
///
/// ## Query Parameters:
/// - `skip` (optional, default 0): Number of tasks to skip.
/// - `limit` (optional, default 100): Page size, 1 to 1000.
/// - `priority` (optional): Only tasks of this priority (`low`, `medium`, `high`).
///
/// ## Responses:
/// - `200 OK`: A JSON array of `Task` objects.
/// - `401 Unauthorized`: An `Authorization` header was sent but its token is not valid.
/// - `422 Unprocessable Entity`: Malformed or out-of-range query parameters.
#[get("")]
pub async fn list_tasks(
    user: MaybeUser,
    state: web::Data<AppState>,
    query: web::Query<TaskQuery>,
) -> Result<impl Responder, AppError> {
    let tasks = state.tasks.list(query.into_inner(), user.id()).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// Creates a task.
///
/// The task is owned by the caller when authenticated, otherwise it is unscoped.
/// `title` and `description` are whitespace-normalized and screened for markup,
/// special characters, SQL-like patterns and forbidden words.
///
/// ## Request Body:
/// - `title`: 1 to 200 characters (required).
/// - `description` (optional): Up to 1000 characters.
/// - `completed` (optional): Defaults to `false`.
/// - `priority` (optional): `low`, `medium` or `high`. Defaults to `medium`.
///
/// ## Responses:
/// - `201 Created`: The stored `Task`.
/// - `401 Unauthorized`: Invalid token.
/// - `415 Unsupported Media Type`: Body is not JSON.
/// - `422 Unprocessable Entity`: Validation or sanitization failure, with per-field errors.
#[post("")]
pub async fn create_task(
    user: MaybeUser,
    state: web::Data<AppState>,
    task_data: web::Json<TaskInput>,
) -> Result<impl Responder, AppError> {
    let task = state.tasks.create(task_data.into_inner(), user.id()).await?;
    Ok(HttpResponse::Created().json(task))
}

/// Retrieves a specific task by its ID.
///
/// ## Responses:
/// - `200 OK`: The `Task`.
/// - `404 Not Found`: No such task, or it belongs to another user.
#[get("/{id}")]
pub async fn get_task(
    user: MaybeUser,
    state: web::Data<AppState>,
    task_id: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    let id = task_id.into_inner();
    let task = state
        .tasks
        .get(id, user.id())
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(HttpResponse::Ok().json(task))
}

/// Partially updates a task.
///
/// Only the fields present in the body change; `"description": null` clears the
/// description. `updated_at` is refreshed.
///
/// ## Responses:
/// - `200 OK`: The updated `Task`.
/// - `404 Not Found`: No such task, or it belongs to another user.
/// - `422 Unprocessable Entity`: Validation or sanitization failure.
#[put("/{id}")]
pub async fn update_task(
    user: MaybeUser,
    state: web::Data<AppState>,
    task_id: web::Path<i64>,
    task_data: web::Json<TaskUpdate>,
) -> Result<impl Responder, AppError> {
    let id = task_id.into_inner();
    let task = state
        .tasks
        .get(id, user.id())
        .await?
        .ok_or_else(|| not_found(id))?;

    let updated = state.tasks.update(task, task_data.into_inner()).await?;
    Ok(HttpResponse::Ok().json(updated))
}

/// Deletes a task.
///
/// ## Responses:
/// - `204 No Content`: Deleted.
/// - `404 Not Found`: No such task, or it belongs to another user.
#[delete("/{id}")]
pub async fn delete_task(
    user: MaybeUser,
    state: web::Data<AppState>,
    task_id: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    let id = task_id.into_inner();
    let task = state
        .tasks
        .get(id, user.id())
        .await?
        .ok_or_else(|| not_found(id))?;

    state.tasks.delete(task).await?;
    Ok(HttpResponse::NoContent().finish())
}
