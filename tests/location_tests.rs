// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Registered-user location and profile tests.

use axum::{http::StatusCode, Router};
use serde_json::json;

mod common;

async fn share(app: &Router, user: &common::TestUser) {
    let (status, body) = common::post(
        app,
        &format!("/api/users/{}/toggle_location_sharing/", user.id),
        Some(&user.access),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_location_shared"], true);
}

#[tokio::test]
async fn test_new_location_demotes_previous() {
    let (app, _) = common::create_test_app().await;
    let user = common::affected(&app, "mover@relief.example").await;
    share(&app, &user).await;

    for (lat, lon) in [(14.1, 121.1), (14.2, 121.2)] {
        let (status, _) = common::post(
            &app,
            "/api/locations/",
            Some(&user.access),
            json!({"latitude": lat, "longitude": lon, "accuracy": 12.5}),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, body) = common::get(&app, "/api/locations/", Some(&user.access)).await;
    assert_eq!(body["count"], 2);

    let (_, body) = common::get(&app, "/api/locations/?current_only=true", Some(&user.access)).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["latitude"], 14.2);
    assert_eq!(body["results"][0]["is_current"], true);
    assert_eq!(body["results"][0]["user_name"], "Test affected");
}

#[tokio::test]
async fn test_coordinates_rounded_to_six_places() {
    let (app, _) = common::create_test_app().await;
    let user = common::donator(&app, "precise@relief.example").await;

    let (status, body) = common::post(
        &app,
        "/api/locations/",
        Some(&user.access),
        json!({"latitude": 14.599512345, "longitude": 120.984222999}),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["latitude"], 14.599512);
    assert_eq!(body["longitude"], 120.984223);
}

#[tokio::test]
async fn test_unshared_locations_hidden() {
    let (app, _) = common::create_test_app().await;
    let hidden = common::affected(&app, "hidden@relief.example").await;
    let viewer = common::donator(&app, "viewer@relief.example").await;

    let (status, body) = common::post(
        &app,
        "/api/locations/",
        Some(&hidden.access),
        json!({"latitude": 10.0, "longitude": 122.0}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/api/locations/{}/", body["id"]);

    let (status, _) = common::get(&app, &uri, Some(&viewer.access)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    share(&app, &hidden).await;
    let (status, _) = common::get(&app, &uri, Some(&viewer.access)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_affected_users_map() {
    let (app, _) = common::create_test_app().await;
    let affected = common::affected(&app, "on-map@relief.example").await;
    let donator = common::donator(&app, "not-on-map@relief.example").await;
    share(&app, &affected).await;
    share(&app, &donator).await;

    for user in [&affected, &donator] {
        common::post(
            &app,
            "/api/locations/",
            Some(&user.access),
            json!({"latitude": 11.0, "longitude": 124.0}),
        )
        .await;
    }

    let (status, body) =
        common::get(&app, "/api/locations/affected_users/", Some(&donator.access)).await;
    assert_eq!(status, StatusCode::OK);
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["user"], affected.id);
}

#[tokio::test]
async fn test_location_requires_coordinates() {
    let (app, _) = common::create_test_app().await;
    let user = common::donator(&app, "nowhere@relief.example").await;

    let (status, body) =
        common::post(&app, "/api/locations/", Some(&user.access), json!({"accuracy": 5})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]["latitude"].is_array());
    assert!(body["details"]["longitude"].is_array());
}

#[tokio::test]
async fn test_profile_update_rules() {
    let (app, _) = common::create_test_app().await;
    let user = common::donator(&app, "profile@relief.example").await;
    let other = common::donator(&app, "intruder@relief.example").await;
    let uri = format!("/api/users/{}/", user.id);

    let (status, body) = common::patch(
        &app,
        &uri,
        Some(&user.access),
        json!({"first_name": "Liza", "phone_number": "+639171234567"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["first_name"], "Liza");
    assert_eq!(body["phone_number"], "+639171234567");

    let (status, body) =
        common::patch(&app, &uri, Some(&user.access), json!({"phone_number": ""})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phone_number"], "");

    let (status, body) =
        common::patch(&app, &uri, Some(&user.access), json!({"role": "admin"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]["role"].is_array());

    let (status, _) =
        common::patch(&app, &uri, Some(&other.access), json!({"first_name": "Hacked"})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = common::post(
        &app,
        &format!("/api/users/{}/toggle_location_sharing/", user.id),
        Some(&other.access),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_profile_picture_upload() {
    let (app, _) = common::create_test_app().await;
    let user = common::donator(&app, "picture@relief.example").await;

    let (status, body) = common::patch(
        &app,
        &format!("/api/users/{}/", user.id),
        Some(&user.access),
        json!({"profile_picture": common::PNG_BASE64}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let url = body["profile_picture"].as_str().unwrap();
    assert!(url.starts_with("/media/profiles/"), "{}", url);
    assert!(url.ends_with(".png"));

    let (status, body) = common::patch(
        &app,
        &format!("/api/users/{}/", user.id),
        Some(&user.access),
        json!({"profile_picture": "bm90IGFuIGltYWdl"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]["profile_picture"].is_array());
}

#[tokio::test]
async fn test_user_list_role_filter() {
    let (app, _) = common::create_test_app().await;
    let donator = common::donator(&app, "d@relief.example").await;
    common::affected(&app, "a1@relief.example").await;
    common::affected(&app, "a2@relief.example").await;

    let (status, body) =
        common::get(&app, "/api/users/?role=affected", Some(&donator.access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);

    let (status, body) = common::get(&app, "/api/users/me/", Some(&donator.access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], donator.id);
}
