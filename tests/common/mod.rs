// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Extension, Router,
};
use donation_backend::config::Config;
use donation_backend::db::Db;
use donation_backend::routes::create_router;
use donation_backend::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// Smallest payload the media store accepts as a PNG.
#[allow(dead_code)]
pub const PNG_BASE64: &str = "iVBORw0KGgoAAAANSUhEUg==";

/// Create a test app over a fresh, migrated in-memory database and a
/// private media directory. Returns the router and the shared state.
#[allow(dead_code)]
pub async fn create_test_app() -> (Router, Arc<AppState>) {
    let db = Db::open_in_memory().expect("in-memory database");
    db.migrate().await.expect("migrations apply");
    create_app_with_db(db)
}

/// Like `create_test_app`, over an already prepared database.
#[allow(dead_code)]
pub fn create_app_with_db(db: Db) -> (Router, Arc<AppState>) {
    let media = tempfile::tempdir().expect("media directory");
    let config = Config {
        media_root: media.path().to_path_buf(),
        ..Config::default()
    };
    let state = Arc::new(AppState::new(config, db));
    // The router owns the directory, so it is removed when the app is dropped.
    let app = create_router(state.clone()).layer(Extension(Arc::new(media)));
    (app, state)
}

/// Send a request, returning status and parsed JSON body (null when empty).
#[allow(dead_code)]
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    send_to_host(app, "testserver", method, uri, token, body).await
}

/// `send` with an explicit Host header.
#[allow(dead_code)]
pub async fn send_to_host(
    app: &Router,
    host: &str,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, host);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
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
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, value)
}

#[allow(dead_code)]
pub async fn get(app: &Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    send(app, "GET", uri, token, None).await
}

#[allow(dead_code)]
pub async fn post(app: &Router, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
    send(app, "POST", uri, token, Some(body)).await
}

#[allow(dead_code)]
pub async fn patch(app: &Router, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
    send(app, "PATCH", uri, token, Some(body)).await
}

#[allow(dead_code)]
pub async fn delete(app: &Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    send(app, "DELETE", uri, token, None).await
}

/// A registered account and its access token.
#[allow(dead_code)]
pub struct TestUser {
    pub id: i64,
    pub email: String,
    pub access: String,
    pub refresh: String,
}

/// Register a user with `role` through the API.
#[allow(dead_code)]
pub async fn register(app: &Router, email: &str, role: &str) -> TestUser {
    let (status, body) = post(
        app,
        "/api/auth/register/",
        None,
        json!({
            "email": email,
            "password": "relief-pass",
            "password2": "relief-pass",
            "first_name": "Test",
            "last_name": role,
            "role": role,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
    TestUser {
        id: body["user"]["id"].as_i64().unwrap(),
        email: email.to_string(),
        access: body["tokens"]["access"].as_str().unwrap().to_string(),
        refresh: body["tokens"]["refresh"].as_str().unwrap().to_string(),
    }
}

#[allow(dead_code)]
pub async fn donator(app: &Router, email: &str) -> TestUser {
    register(app, email, "donator").await
}

#[allow(dead_code)]
pub async fn affected(app: &Router, email: &str) -> TestUser {
    register(app, email, "affected").await
}

/// Share an anonymous location, returning the created record.
#[allow(dead_code)]
pub async fn share_location(app: &Router, phone: &str, session_id: &str) -> Value {
    let (status, body) = post(
        app,
        "/api/anonymous-locations/",
        None,
        json!({
            "first_name": "Ana",
            "last_name": "Reyes",
            "phone": phone,
            "photo": PNG_BASE64,
            "latitude": 14.5995,
            "longitude": 120.9842,
            "session_id": session_id,
            "supply_needs": {"water": 5, "food": "3", "people_count": 4, "other": "blankets"},
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "share failed: {}", body);
    body
}
