// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pagination tests for list endpoints.

use axum::http::StatusCode;
use serde_json::json;

mod common;

#[tokio::test]
async fn test_invalid_page_numbers_return_404() {
    let (app, _) = common::create_test_app().await;
    let user = common::donator(&app, "pages@relief.example").await;

    for uri in [
        "/api/locations/?page=0",
        "/api/locations/?page=-1",
        "/api/locations/?page=abc",
        "/api/locations/?page=2",
    ] {
        let (status, body) = common::get(&app, uri, Some(&user.access)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["error"], "Invalid page.");
    }
}

#[tokio::test]
async fn test_empty_collection_has_one_page() {
    let (app, _) = common::create_test_app().await;

    let (status, body) = common::get(&app, "/api/donation-history/", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
    assert_eq!(body["next"], serde_json::Value::Null);
    assert_eq!(body["previous"], serde_json::Value::Null);
    assert_eq!(body["results"], json!([]));
}

#[tokio::test]
async fn test_next_and_previous_links() {
    let (app, _) = common::create_test_app().await;
    let user = common::donator(&app, "walker@relief.example").await;
    let (status, _) = common::post(
        &app,
        &format!("/api/users/{}/toggle_location_sharing/", user.id),
        Some(&user.access),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    for i in 0..25 {
        let (status, _) = common::post(
            &app,
            "/api/locations/",
            Some(&user.access),
            json!({"latitude": 14.0 + i as f64 / 100.0, "longitude": 121.0}),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = common::get(
        &app,
        &format!("/api/locations/?user={}", user.id),
        Some(&user.access),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 25);
    assert_eq!(body["results"].as_array().unwrap().len(), 20);
    assert_eq!(
        body["next"],
        format!("http://testserver/api/locations/?page=2&user={}", user.id)
    );
    assert_eq!(body["previous"], serde_json::Value::Null);

    let (status, body) = common::get(
        &app,
        &format!("/api/locations/?page=2&user={}", user.id),
        Some(&user.access),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"].as_array().unwrap().len(), 5);
    assert_eq!(body["next"], serde_json::Value::Null);
    assert_eq!(
        body["previous"],
        format!("http://testserver/api/locations/?user={}", user.id)
    );

    let (status, body) =
        common::get(&app, "/api/locations/?page=last", Some(&user.access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"].as_array().unwrap().len(), 5);
}
