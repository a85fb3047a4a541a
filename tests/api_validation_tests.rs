// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Input validation and sanitizing tests.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

mod common;

#[tokio::test]
async fn test_register_collects_all_field_errors() {
    let (app, _) = common::create_test_app().await;

    let (status, body) = common::post(
        &app,
        "/api/auth/register/",
        None,
        json!({
            "email": "not-an-email",
            "password": "abc",
            "password2": "xyz",
            "phone_number": "12",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let details = &body["details"];
    assert!(details["email"].is_array());
    assert!(details["password"].is_array());
    assert!(details["phone_number"].is_array());
}

#[tokio::test]
async fn test_register_rejects_admin_role() {
    let (app, _) = common::create_test_app().await;

    let (status, body) = common::post(
        &app,
        "/api/auth/register/",
        None,
        json!({
            "email": "sneaky@relief.example",
            "password": "relief-pass",
            "password2": "relief-pass",
            "role": "admin",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]["role"].is_array());
}

#[tokio::test]
async fn test_register_requires_password_confirmation() {
    let (app, _) = common::create_test_app().await;

    let (status, body) = common::post(
        &app,
        "/api/auth/register/",
        None,
        json!({"email": "half@relief.example", "password": "relief-pass"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["password2"][0], "This field is required.");
}

#[tokio::test]
async fn test_location_coordinates_out_of_range() {
    let (app, _) = common::create_test_app().await;
    let user = common::donator(&app, "geo@relief.example").await;

    let (status, body) = common::post(
        &app,
        "/api/locations/",
        Some(&user.access),
        json!({"latitude": 95.0, "longitude": "-200"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["details"]["latitude"][0],
        "Latitude must be between -90 and 90"
    );
    assert_eq!(
        body["details"]["longitude"][0],
        "Longitude must be between -180 and 180"
    );
}

#[tokio::test]
async fn test_malformed_json_rejected() {
    let (app, _) = common::create_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login/")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_html_is_stripped_from_json_bodies() {
    let (app, _) = common::create_test_app().await;
    let user = common::donator(&app, "html@relief.example").await;

    let (status, body) = common::post(
        &app,
        "/api/donations/",
        Some(&user.access),
        json!({
            "title": "<script>alert(1)</script>Rice sacks",
            "description": "<p>Ten <b>sacks</b></p>",
            "category": "food",
            "quantity": 10,
            "unit": "sacks",
            "pickup_location": "Barangay Hall",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["title"], "alert(1)Rice sacks");
    assert_eq!(body["description"], "<p>Ten sacks</p>");
}

#[tokio::test]
async fn test_security_headers_present() {
    let (app, _) = common::create_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert!(headers.get("x-frame-options").is_some());
}
