use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use parlor_api::{AppStateInner, MembershipPolicy, router};
use parlor_db::Database;

const SECRET: &str = "http-test-secret";

fn app() -> Router {
    router(Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        jwt_secret: SECRET.into(),
        token_ttl_days: 1,
        membership_policy: MembershipPolicy::Open,
    }))
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn register(app: &Router, username: &str) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({
            "username": username,
            "full_name": format!("{username} tester"),
            "email": format!("{username}@example.com"),
            "password": "hunter22",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_public() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "status": "ok" }));
}

#[tokio::test]
async fn protected_routes_require_token() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/rooms", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));

    let (status, _) = call(&app, Method::GET, "/rooms", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_endpoint_gets_json_404() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body,
        json!({ "success": false, "message": "API endpoint not found" })
    );
}

#[tokio::test]
async fn malformed_input_gets_json_400() {
    let app = app();
    let token = register(&app, "alice").await;

    let (status, body) = call(&app, Method::GET, "/rooms/abc/messages", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));

    let (status, body) = call(
        &app,
        Method::POST,
        "/friends",
        Some(&token),
        Some(json!("not an object")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn room_and_message_flow() {
    let app = app();
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/rooms",
        Some(&alice),
        Some(json!({ "name": "General", "description": "chat" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let room_id = body["room_id"].as_i64().unwrap();

    let uri = format!("/rooms/{room_id}/messages");
    let (status, body) = call(
        &app,
        Method::POST,
        &uri,
        Some(&bob),
        Some(json!({ "message": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["formatted_message"]["text"], json!("hi"));
    assert_eq!(body["formatted_message"]["author"], json!("bob tester"));
    assert_eq!(body["formatted_message"]["messageType"], json!("text"));

    let (status, body) = call(&app, Method::GET, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["text"], json!("hi"));
    assert_eq!(messages[0]["isEdited"], json!(false));

    let (status, body) = call(&app, Method::GET, &format!("{uri}/recent"), Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["messages"], json!([]));

    let (status, body) = call(&app, Method::GET, "/rooms", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rooms"][0]["lastMessage"], json!("hi"));
    assert_eq!(body["rooms"][0]["messageCount"], json!(1));
    assert_eq!(body["rooms"][0]["role"], Value::Null);
}

#[tokio::test]
async fn private_room_is_forbidden_to_outsiders() {
    let app = app();
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;

    let (_, body) = call(
        &app,
        Method::POST,
        "/rooms",
        Some(&alice),
        Some(json!({ "name": "Secret", "isPrivate": true })),
    )
    .await;
    let room_id = body["room_id"].as_i64().unwrap();

    let uri = format!("/rooms/{room_id}/messages");
    let (status, body) = call(&app, Method::GET, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({ "success": false, "message": "Access denied" }));

    let (status, _) = call(&app, Method::POST, &format!("/rooms/{room_id}/join"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn editing_someone_elses_message_is_404() {
    let app = app();
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;

    let (_, body) = call(
        &app,
        Method::POST,
        "/rooms",
        Some(&alice),
        Some(json!({ "name": "General" })),
    )
    .await;
    let room_id = body["room_id"].as_i64().unwrap();
    let (_, body) = call(
        &app,
        Method::POST,
        &format!("/rooms/{room_id}/messages"),
        Some(&alice),
        Some(json!({ "message": "mine" })),
    )
    .await;
    let message_id = body["formatted_message"]["id"].as_i64().unwrap();

    let uri = format!("/messages/{message_id}");
    let (status, body) = call(
        &app,
        Method::PUT,
        &uri,
        Some(&bob),
        Some(json!({ "message": "yours now" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], json!("Failed to edit message"));

    let (status, _) = call(&app, Method::DELETE, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn login_and_friend_flow() {
    let app = app();
    register(&app, "alice").await;
    register(&app, "bob").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "username": "alice@example.com", "password": "hunter22" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["username"], json!("alice"));
    let alice = body["token"].as_str().unwrap().to_string();

    let (status, body) = call(&app, Method::GET, "/users/search?query=bo", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let bob_id = body["users"][0]["id"].as_i64().unwrap();

    let (status, _) = call(
        &app,
        Method::POST,
        "/friends",
        Some(&alice),
        Some(json!({ "user_id": bob_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(
        &app,
        Method::POST,
        "/friends",
        Some(&alice),
        Some(json!({ "user_id": bob_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], json!("Already friends or request pending"));

    let (_, body) = call(&app, Method::GET, "/friends", Some(&alice), None).await;
    assert_eq!(body["friends"][0]["username"], json!("bob"));

    let (_, body) = call(&app, Method::GET, "/users/search?query=bo", Some(&alice), None).await;
    assert_eq!(body["users"], json!([]));

    let (status, body) = call(&app, Method::GET, "/users/me", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], json!("alice@example.com"));
}
