#![allow(dead_code)]

use std::collections::HashMap;

use actix_cors::Cors;
use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::header;
use actix_web::middleware::Logger;
use actix_web::{test, App};
use serde_json::{json, Value};
use tasktracker::auth::TokenResponse;
use tasktracker::{app, AppState, Config};

pub const PASSWORD: &str = "Pass1234";

// Helper struct to hold auth details
pub struct TestUser {
    pub id: i64,
    pub access_token: String,
    pub refresh_token: String,
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Test configuration: cheap bcrypt, rate limiting off, then `overrides`.
pub fn test_config(overrides: &[(&str, &str)]) -> Config {
    let mut values: HashMap<String, String> = [
        ("JWT_SECRET", "integration-test-secret"),
        ("BCRYPT_ROUNDS", "4"),
        ("RATE_LIMIT_ENABLED", "false"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in overrides {
        values.insert(k.to_string(), v.to_string());
    }

    Config::from_lookup(move |key| values.get(key).cloned()).expect("valid test configuration")
}

pub fn test_state(overrides: &[(&str, &str)]) -> AppState {
    init_logger();
    AppState::in_memory(test_config(overrides))
}

pub async fn init_app(
    state: &AppState,
) -> impl Service<actix_http::Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error>
{
    test::init_service(
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .configure(|cfg| app::configure(cfg, state)),
    )
    .await
}

pub fn bearer(token: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {}", token))
}

/// Sends a request and returns status plus parsed JSON body (`Value::Null` when empty).
pub async fn send(
    app: &impl Service<actix_http::Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error>,
    req: test::TestRequest,
) -> (u16, Value) {
    let resp = test::call_service(app, req.to_request()).await;
    let status = resp.status().as_u16();
    let body = test::read_body(resp).await;
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into()))
    };
    (status, json)
}

pub async fn register_and_login_user(
    app: &impl Service<actix_http::Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error>,
    email: &str,
    name: &str,
) -> Result<TestUser, String> {
    let (status, body) = send(
        app,
        test::TestRequest::post()
            .uri("/api/v1/auth/register")
            .set_json(json!({ "email": email, "name": name, "password": PASSWORD })),
    )
    .await;
    if status != 201 {
        return Err(format!("Failed to register user. Status: {}. Body: {}", status, body));
    }
    let id = body["id"].as_i64().ok_or("registration response has no id")?;

    let (status, body) = send(
        app,
        test::TestRequest::post()
            .uri("/api/v1/auth/login")
            .set_json(json!({ "email": email, "password": PASSWORD })),
    )
    .await;
    if status != 200 {
        return Err(format!("Failed to log in. Status: {}. Body: {}", status, body));
    }
    let tokens: TokenResponse =
        serde_json::from_value(body).map_err(|e| format!("Failed to parse login response: {}", e))?;

    Ok(TestUser {
        id,
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    })
}

pub async fn create_task(
    app: &impl Service<actix_http::Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error>,
    token: Option<&str>,
    body: Value,
) -> (u16, Value) {
    let mut req = test::TestRequest::post().uri("/api/v1/tasks").set_json(body);
    if let Some(token) = token {
        req = req.insert_header(bearer(token));
    }
    send(app, req).await
}
