use crate::{
    app::AppState,
    auth::{
        CurrentUser, LoginRequest, PasswordResetConfirm, PasswordResetRequest, RefreshRequest,
        RegisterRequest,
    },
    error::AppError,
    models::UserResponse,
};
use actix_web::{get, post, web, HttpResponse, Responder};
use serde_json::json;
use validator::Validate;

const RESET_REQUESTED: &str = "If the email exists, a password reset link has been sent";

/// Register a new user
///
/// Creates an account and returns it without credentials.
///
/// ## Responses:
/// - `201 Created`: The new user.
/// - `409 Conflict`: The email is already registered.
/// - `422 Unprocessable Entity`: Invalid email, name or weak password.
#[post("/register")]
pub async fn register(
    state: web::Data<AppState>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    let user = state.auth.register(register_data.into_inner()).await?;
    Ok(HttpResponse::Created().json(UserResponse::from(&user)))
}

/// Login user
///
/// Exchanges email and password for an access/refresh token pair.
///
/// ## Responses:
/// - `200 OK`: `{access_token, refresh_token, token_type, expires_in}`.
/// - `401 Unauthorized`: Unknown email, wrong password or inactive account.
#[post("/login")]
pub async fn login(
    state: web::Data<AppState>,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    let login_data = login_data.into_inner().normalized();
    login_data.validate()?;

    let tokens = state
        .auth
        .login(&login_data.email, &login_data.password)
        .await?;
    Ok(HttpResponse::Ok().json(tokens))
}

/// Refresh tokens
///
/// ## Responses:
/// - `200 OK`: A new token pair.
/// - `401 Unauthorized`: The refresh token is invalid, expired, of the wrong kind, or its
///   user is no longer active.
#[post("/refresh")]
pub async fn refresh(
    state: web::Data<AppState>,
    refresh_data: web::Json<RefreshRequest>,
) -> Result<impl Responder, AppError> {
    let tokens = state.auth.refresh(&refresh_data.refresh_token).await?;
    Ok(HttpResponse::Ok().json(tokens))
}

/// The authenticated user.
#[get("/me")]
pub async fn me(user: CurrentUser) -> Result<impl Responder, AppError> {
    Ok(HttpResponse::Ok().json(UserResponse::from(&user.0)))
}

/// Request a password reset
///
/// Always answers with the same message, whether or not the email is registered.
#[post("/password-reset/request")]
pub async fn password_reset_request(
    state: web::Data<AppState>,
    reset_data: web::Json<PasswordResetRequest>,
) -> Result<impl Responder, AppError> {
    let reset_data = reset_data.into_inner().normalized();
    reset_data.validate()?;

    state.auth.request_password_reset(&reset_data.email).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": RESET_REQUESTED })))
}

/// Confirm a password reset
///
/// ## Responses:
/// - `200 OK`: The password was changed.
/// - `400 Bad Request`: Invalid or expired reset token.
/// - `422 Unprocessable Entity`: The new password is too weak.
#[post("/password-reset/confirm")]
pub async fn password_reset_confirm(
    state: web::Data<AppState>,
    confirm_data: web::Json<PasswordResetConfirm>,
) -> Result<impl Responder, AppError> {
    let confirm = confirm_data.into_inner();
    state
        .auth
        .confirm_password_reset(&confirm.token, &confirm.new_password)
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Password has been reset successfully" })))
}
