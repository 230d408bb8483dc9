mod common;

use actix_web::{http::header, test};
use common::{bearer, init_app, register_and_login_user, send, test_state, PASSWORD};
use pretty_assertions::assert_eq;
use serde_json::json;

#[actix_rt::test]
async fn test_register_and_login_flow() {
    let state = test_state(&[]);
    let app = init_app(&state).await;

    let register_payload = json!({
        "email": "Integration@Example.com",
        "name": "Integration User",
        "password": "Pass123!"
    });
    let (status, body) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/auth/register")
            .set_json(&register_payload),
    )
    .await;
    assert_eq!(status, 201, "Registration failed. Body: {}", body);
    assert_eq!(body["email"], "integration@example.com");
    assert_eq!(body["name"], "Integration User");
    assert_eq!(body["is_active"], true);
    assert!(body.get("password_hash").is_none());

    // Same email again, differently cased
    let (status, body) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/auth/register")
            .set_json(&register_payload),
    )
    .await;
    assert_eq!(status, 409, "Duplicate registration did not fail. Body: {}", body);

    let (status, body) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/auth/login")
            .set_json(json!({ "email": "integration@example.com", "password": "Pass123!" })),
    )
    .await;
    assert_eq!(status, 200, "Login failed. Body: {}", body);
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["expires_in"], 1800);
    let access_token = body["access_token"].as_str().unwrap().to_string();
    let refresh_token = body["refresh_token"].as_str().unwrap().to_string();
    assert_ne!(access_token, refresh_token);

    let (status, body) = send(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/auth/me")
            .insert_header(bearer(&access_token)),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["email"], "integration@example.com");

    // A refresh token is not an access token
    let (status, body) = send(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/auth/me")
            .insert_header(bearer(&refresh_token)),
    )
    .await;
    assert_eq!(status, 401);
    assert_eq!(body["detail"], "Could not validate credentials");
}

#[actix_rt::test]
async fn test_padded_mixed_case_email_is_normalized() {
    let state = test_state(&[]);
    let app = init_app(&state).await;

    let (status, body) = send(
        &app,
        test::TestRequest::post().uri("/api/v1/auth/register").set_json(json!({
            "email": "  Padded@Example.COM ",
            "name": "Padded",
            "password": PASSWORD
        })),
    )
    .await;
    assert_eq!(status, 201, "Registration failed. Body: {}", body);
    assert_eq!(body["email"], "padded@example.com");

    let (status, body) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/auth/login")
            .set_json(json!({ "email": " PADDED@example.com\t", "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, 200, "Login failed. Body: {}", body);

    let (status, body) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/auth/password-reset/request")
            .set_json(json!({ "email": "  padded@EXAMPLE.com  " })),
    )
    .await;
    assert_eq!(status, 200, "Reset request failed. Body: {}", body);
    assert_eq!(
        body["message"],
        "If the email exists, a password reset link has been sent"
    );
}

#[actix_rt::test]
async fn test_register_validation() {
    let state = test_state(&[]);
    let app = init_app(&state).await;

    let cases = vec![
        (json!({ "email": "invalid-email", "name": "Test", "password": "Pass123!" }), "email"),
        (json!({ "email": "weak@example.com", "name": "Test", "password": "weak" }), "password"),
        (json!({ "email": "name@example.com", "name": "<b>Bold</b>", "password": "Pass123!" }), "name"),
        (json!({ "email": "long@example.com", "name": "n".repeat(101), "password": "Pass123!" }), "name"),
    ];

    for (payload, field) in cases {
        let (status, body) = send(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/auth/register")
                .set_json(&payload),
        )
        .await;
        assert_eq!(status, 422, "payload {} was accepted: {}", payload, body);
        let fields: Vec<&str> = body["errors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["field"].as_str().unwrap())
            .collect();
        assert!(fields.contains(&field), "expected error on {} in {}", field, body);
    }
}

#[actix_rt::test]
async fn test_login_failures_are_indistinguishable() {
    let state = test_state(&[]);
    let app = init_app(&state).await;
    register_and_login_user(&app, "known@example.com", "Known").await.unwrap();

    for (email, password) in [("known@example.com", "Wrong1234"), ("unknown@example.com", PASSWORD)] {
        let (status, body) = send(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/auth/login")
                .set_json(json!({ "email": email, "password": password })),
        )
        .await;
        assert_eq!(status, 401);
        assert_eq!(body["detail"], "Incorrect email or password");
    }
}

#[actix_rt::test]
async fn test_me_requires_authorization_header() {
    let state = test_state(&[]);
    let app = init_app(&state).await;

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/v1/auth/me").to_request(),
    )
    .await;
    assert_eq!(resp.status(), 401);
    assert_eq!(resp.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], "Authorization header missing");

    let (status, _) = send(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/auth/me")
            .insert_header((header::AUTHORIZATION, "Basic dXNlcjpwYXNz")),
    )
    .await;
    assert_eq!(status, 401);
}

#[actix_rt::test]
async fn test_refresh_flow() {
    let state = test_state(&[]);
    let app = init_app(&state).await;
    let user = register_and_login_user(&app, "refresh@example.com", "Refresher").await.unwrap();

    let (status, body) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/auth/refresh")
            .set_json(json!({ "refresh_token": user.refresh_token })),
    )
    .await;
    assert_eq!(status, 200, "Refresh failed. Body: {}", body);
    let new_access = body["access_token"].as_str().unwrap().to_string();
    assert_ne!(new_access, user.access_token);

    let (status, body) = send(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/auth/me")
            .insert_header(bearer(&new_access)),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["id"], user.id);

    // An access token cannot be used to refresh
    let (status, _) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/auth/refresh")
            .set_json(json!({ "refresh_token": user.access_token })),
    )
    .await;
    assert_eq!(status, 401);

    // Nor can a refresh token for a deactivated account
    state.auth.users().set_active(user.id, false).await.unwrap();
    let (status, _) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/auth/refresh")
            .set_json(json!({ "refresh_token": user.refresh_token })),
    )
    .await;
    assert_eq!(status, 401);
}

#[actix_rt::test]
async fn test_password_reset_flow() {
    let state = test_state(&[]);
    let app = init_app(&state).await;
    register_and_login_user(&app, "reset@example.com", "Resetter").await.unwrap();

    // Same answer whether or not the account exists
    for email in ["reset@example.com", "ghost@example.com"] {
        let (status, body) = send(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/auth/password-reset/request")
                .set_json(json!({ "email": email })),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(
            body["message"],
            "If the email exists, a password reset link has been sent"
        );
    }

    let (status, body) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/auth/password-reset/confirm")
            .set_json(json!({ "token": "not-a-token", "new_password": "NewPass123" })),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["detail"], "Invalid or expired reset token");

    let token = state.tokens.issue_password_reset_token("reset@example.com").unwrap();

    let (status, _) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/auth/password-reset/confirm")
            .set_json(json!({ "token": token, "new_password": "weak" })),
    )
    .await;
    assert_eq!(status, 422);

    let (status, body) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/auth/password-reset/confirm")
            .set_json(json!({ "token": token, "new_password": "NewPass123" })),
    )
    .await;
    assert_eq!(status, 200, "Reset failed. Body: {}", body);

    let (status, _) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/auth/login")
            .set_json(json!({ "email": "reset@example.com", "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, 401);

    let (status, _) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/auth/login")
            .set_json(json!({ "email": "reset@example.com", "password": "NewPass123" })),
    )
    .await;
    assert_eq!(status, 200);

    // An access token is not a reset token
    let user = state.auth.login("reset@example.com", "NewPass123").await.unwrap();
    let (status, _) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/auth/password-reset/confirm")
            .set_json(json!({ "token": user.access_token, "new_password": "Other1234" })),
    )
    .await;
    assert_eq!(status, 400);
}
