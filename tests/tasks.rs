mod common;

use std::net::TcpListener;

use actix_web::middleware::Logger;
use actix_web::{rt, test, App, HttpServer};
use common::{bearer, create_task, init_app, register_and_login_user, send, test_state};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tasktracker::app;
use tasktracker::models::{Task, TaskPriority};

fn titles(body: &Value) -> Vec<String> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap().to_string())
        .collect()
}

#[actix_rt::test]
async fn test_create_task_defaults() {
    let state = test_state(&[]);
    let app = init_app(&state).await;

    let (status, body) = create_task(&app, None, json!({ "title": "Buy milk" })).await;
    assert_eq!(status, 201, "Create failed. Body: {}", body);

    let task: Task = serde_json::from_value(body).unwrap();
    assert_eq!(task.title, "Buy milk");
    assert_eq!(task.priority, TaskPriority::Medium);
    assert!(!task.completed);
    assert_eq!(task.description, None);
    assert_eq!(task.user_id, None);

    let (status, body) = create_task(&app, None, json!({ "title": "  Plan    the   week  " })).await;
    assert_eq!(status, 201);
    assert_eq!(body["title"], "Plan the week");
}

#[actix_rt::test]
async fn test_create_task_rejects_unsafe_text() {
    let state = test_state(&[("FORBIDDEN_WORDS", "casino")]);
    let app = init_app(&state).await;

    let payloads = vec![
        json!({ "title": "<b>hi</b>" }),
        json!({ "title": "<script>alert('x')</script>" }),
        json!({ "title": "Array [0]" }),
        json!({ "title": "Braces {x}" }),
        json!({ "title": "x'; DROP TABLE tasks; --" }),
        json!({ "title": "admin' OR '1'='1" }),
        json!({ "title": "Visit the Casino" }),
        json!({ "title": "   " }),
        json!({ "title": "" }),
        json!({ "title": "a".repeat(201) }),
        json!({ "title": "Valid", "description": "d".repeat(1001) }),
        json!({ "title": "Valid", "description": "<i>styled</i>" }),
    ];

    for payload in payloads {
        let (status, body) = create_task(&app, None, payload.clone()).await;
        assert_eq!(status, 422, "payload {} was accepted: {}", payload, body);
        assert!(body["errors"].is_array());
    }

    let (_, body) = send(&app, test::TestRequest::get().uri("/api/v1/tasks")).await;
    assert_eq!(body, json!([]));
}

#[actix_rt::test]
async fn test_get_unknown_task() {
    let state = test_state(&[]);
    let app = init_app(&state).await;

    let (status, body) = send(&app, test::TestRequest::get().uri("/api/v1/tasks/999")).await;
    assert_eq!(status, 404);
    assert_eq!(body["detail"], "Task with id 999 not found");
}

#[actix_rt::test]
async fn test_list_ordering_and_pagination() {
    let state = test_state(&[]);
    let app = init_app(&state).await;

    for (title, priority) in [
        ("low one", "low"),
        ("high one", "high"),
        ("medium one", "medium"),
        ("high two", "high"),
        ("low two", "low"),
    ] {
        let (status, _) = create_task(&app, None, json!({ "title": title, "priority": priority })).await;
        assert_eq!(status, 201);
    }

    let (status, body) = send(&app, test::TestRequest::get().uri("/api/v1/tasks")).await;
    assert_eq!(status, 200);
    assert_eq!(
        titles(&body),
        vec!["high two", "high one", "medium one", "low two", "low one"]
    );

    let (_, body) = send(&app, test::TestRequest::get().uri("/api/v1/tasks?skip=1&limit=2")).await;
    assert_eq!(titles(&body), vec!["high one", "medium one"]);

    let (_, body) = send(&app, test::TestRequest::get().uri("/api/v1/tasks?priority=low")).await;
    assert_eq!(titles(&body), vec!["low two", "low one"]);

    for uri in [
        "/api/v1/tasks?limit=0",
        "/api/v1/tasks?limit=1001",
        "/api/v1/tasks?skip=-1",
        "/api/v1/tasks?priority=urgent",
    ] {
        let (status, body) = send(&app, test::TestRequest::get().uri(uri)).await;
        assert_eq!(status, 422, "{} was accepted: {}", uri, body);
    }
}

#[actix_rt::test]
async fn test_task_ownership_and_visibility() {
    let state = test_state(&[]);
    let app = init_app(&state).await;

    let alice = register_and_login_user(&app, "alice@example.com", "Alice").await.unwrap();
    let bob = register_and_login_user(&app, "bob@example.com", "Bob").await.unwrap();

    let (status, shared) = create_task(&app, None, json!({ "title": "Shared" })).await;
    assert_eq!(status, 201);
    let (status, private) =
        create_task(&app, Some(&alice.access_token), json!({ "title": "Alice only" })).await;
    assert_eq!(status, 201);
    assert_eq!(private["user_id"], alice.id);

    let private_uri = format!("/api/v1/tasks/{}", private["id"]);
    let shared_uri = format!("/api/v1/tasks/{}", shared["id"]);

    let (status, _) = send(
        &app,
        test::TestRequest::get().uri(&private_uri).insert_header(bearer(&alice.access_token)),
    )
    .await;
    assert_eq!(status, 200);

    let (status, _) = send(
        &app,
        test::TestRequest::get().uri(&private_uri).insert_header(bearer(&bob.access_token)),
    )
    .await;
    assert_eq!(status, 404);

    let (status, _) = send(&app, test::TestRequest::get().uri(&private_uri)).await;
    assert_eq!(status, 404);

    // Bob can neither change nor delete it
    let (status, _) = send(
        &app,
        test::TestRequest::put()
            .uri(&private_uri)
            .insert_header(bearer(&bob.access_token))
            .set_json(json!({ "title": "Hijacked" })),
    )
    .await;
    assert_eq!(status, 404);
    let (status, _) = send(
        &app,
        test::TestRequest::delete().uri(&private_uri).insert_header(bearer(&bob.access_token)),
    )
    .await;
    assert_eq!(status, 404);

    // Everyone sees the unscoped task
    for token in [None, Some(&alice.access_token), Some(&bob.access_token)] {
        let mut req = test::TestRequest::get().uri(&shared_uri);
        if let Some(token) = token {
            req = req.insert_header(bearer(token));
        }
        let (status, _) = send(&app, req).await;
        assert_eq!(status, 200);
    }

    let (_, body) = send(
        &app,
        test::TestRequest::get().uri("/api/v1/tasks").insert_header(bearer(&alice.access_token)),
    )
    .await;
    assert_eq!(titles(&body).len(), 2);

    let (_, body) = send(
        &app,
        test::TestRequest::get().uri("/api/v1/tasks").insert_header(bearer(&bob.access_token)),
    )
    .await;
    assert_eq!(titles(&body), vec!["Shared"]);
}

#[actix_rt::test]
async fn test_task_update_and_delete() {
    let state = test_state(&[]);
    let app = init_app(&state).await;

    let (_, created) = create_task(
        &app,
        None,
        json!({ "title": "Write report", "description": "Quarterly", "priority": "low" }),
    )
    .await;
    let uri = format!("/api/v1/tasks/{}", created["id"]);

    let (status, updated) = send(
        &app,
        test::TestRequest::put().uri(&uri).set_json(json!({ "completed": true })),
    )
    .await;
    assert_eq!(status, 200, "Update failed. Body: {}", updated);
    assert_eq!(updated["completed"], true);
    assert_eq!(updated["title"], "Write report");
    assert_eq!(updated["description"], "Quarterly");
    assert_eq!(updated["priority"], "low");
    assert_eq!(updated["created_at"], created["created_at"]);

    let (status, updated) = send(
        &app,
        test::TestRequest::put()
            .uri(&uri)
            .set_json(json!({ "description": null, "priority": "high", "title": "Final  report" })),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(updated["description"], Value::Null);
    assert_eq!(updated["priority"], "high");
    assert_eq!(updated["title"], "Final report");

    let (status, _) = send(
        &app,
        test::TestRequest::put().uri(&uri).set_json(json!({ "title": "<b>bold</b>" })),
    )
    .await;
    assert_eq!(status, 422);

    let (status, body) = send(&app, test::TestRequest::delete().uri(&uri)).await;
    assert_eq!(status, 204);
    assert_eq!(body, Value::Null);

    let (status, _) = send(&app, test::TestRequest::get().uri(&uri)).await;
    assert_eq!(status, 404);
    let (status, _) = send(&app, test::TestRequest::delete().uri(&uri)).await;
    assert_eq!(status, 404);
}

#[actix_rt::test]
async fn test_invalid_token_is_rejected_on_task_routes() {
    let state = test_state(&[]);
    let app = init_app(&state).await;
    let user = register_and_login_user(&app, "tok@example.com", "Tok").await.unwrap();

    for token in ["garbage", user.refresh_token.as_str()] {
        let (status, body) = send(
            &app,
            test::TestRequest::get().uri("/api/v1/tasks").insert_header(bearer(token)),
        )
        .await;
        assert_eq!(status, 401);
        assert_eq!(body["detail"], "Could not validate credentials");
    }
}

#[actix_rt::test]
async fn test_auth_required_rejects_anonymous_callers() {
    let state = test_state(&[("AUTH_REQUIRED", "true")]);
    let app = init_app(&state).await;

    let (status, body) = send(&app, test::TestRequest::get().uri("/api/v1/tasks")).await;
    assert_eq!(status, 401);
    assert_eq!(body["detail"], "Authorization header missing");

    let (status, _) = create_task(&app, None, json!({ "title": "Anonymous" })).await;
    assert_eq!(status, 401);

    let user = register_and_login_user(&app, "req@example.com", "Req").await.unwrap();
    let (status, body) = create_task(&app, Some(&user.access_token), json!({ "title": "Mine" })).await;
    assert_eq!(status, 201);
    assert_eq!(body["user_id"], user.id);
}

#[actix_rt::test]
async fn test_task_api_over_http() {
    let state = test_state(&[]);

    // Find an available port
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let server_state = state.clone();
    let server_handle = rt::spawn(async move {
        HttpServer::new(move || {
            App::new()
                .wrap(app::cors(&server_state.config))
                .wrap(Logger::default())
                .configure(|cfg| app::configure(cfg, &server_state))
        })
        .bind(("127.0.0.1", port))
        .unwrap_or_else(|_| panic!("Failed to bind to port {}", port))
        .run()
        .await
    });

    // Give the server a moment to start
    tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

    let client = reqwest::Client::new();
    let base = format!("http://127.0.0.1:{}", port);

    let resp = client
        .post(format!("{}/api/v1/tasks", base))
        .json(&json!({ "title": "Over the wire" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
    let task: Task = resp.json().await.unwrap();
    assert_eq!(task.title, "Over the wire");

    let resp = client
        .post(format!("{}/api/v1/tasks", base))
        .bearer_auth("not-a-jwt")
        .json(&json!({ "title": "Should fail" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(
        resp.status(),
        reqwest::StatusCode::UNAUTHORIZED,
        "Body: {:?}",
        resp.text().await.unwrap_or_default()
    );

    let resp = client
        .get(format!("{}/health", base))
        .send()
        .await
        .expect("Failed to send request");
    assert!(resp.status().is_success());

    server_handle.abort();
}
