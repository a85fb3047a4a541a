// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Donation lifecycle tests.
//!
//! These tests verify that:
//! 1. Only donators create donations and only their owners change them
//! 2. Status changes append tracking entries
//! 3. Cached donation lists are invalidated by writes and account changes
//! 4. Recipients must be affected users

use axum::{http::StatusCode, Router};
use serde_json::{json, Value};

mod common;

fn rice(recipient: Option<i64>) -> Value {
    let mut body = json!({
        "title": "Rice sacks",
        "description": "Ten 25kg sacks of rice",
        "category": "food",
        "quantity": 10,
        "unit": "sacks",
        "pickup_location": "Barangay Hall",
        "pickup_latitude": "14.5995",
        "pickup_longitude": 120.9842,
    });
    if let Some(id) = recipient {
        body["recipient"] = json!(id);
    }
    body
}

async fn create(app: &Router, token: &str, body: Value) -> Value {
    let (status, body) = common::post(app, "/api/donations/", Some(token), body).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body
}

#[tokio::test]
async fn test_donator_creates_donation() {
    let (app, _) = common::create_test_app().await;
    let donator = common::donator(&app, "giver@relief.example").await;

    let donation = create(&app, &donator.access, rice(None)).await;

    assert_eq!(donation["donator"], donator.id);
    assert_eq!(donation["status"], "pending");
    assert_eq!(donation["category"], "food");
    assert_eq!(donation["pickup_latitude"], 14.5995);
    assert_eq!(donation["recipient"], Value::Null);
}

#[tokio::test]
async fn test_affected_cannot_create_donation() {
    let (app, _) = common::create_test_app().await;
    let affected = common::affected(&app, "needs@relief.example").await;

    let (status, _) =
        common::post(&app, "/api/donations/", Some(&affected.access), rice(None)).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_validates_fields() {
    let (app, _) = common::create_test_app().await;
    let donator = common::donator(&app, "sloppy@relief.example").await;

    let (status, body) = common::post(
        &app,
        "/api/donations/",
        Some(&donator.access),
        json!({
            "title": "Water",
            "category": "gold",
            "quantity": 0,
            "pickup_latitude": 100,
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let details = &body["details"];
    assert!(details["category"].is_array());
    assert_eq!(details["quantity"][0], "Quantity must be greater than 0");
    assert!(details["description"].is_array());
    assert!(details["pickup_latitude"].is_array());
}

#[tokio::test]
async fn test_recipient_must_be_affected() {
    let (app, _) = common::create_test_app().await;
    let donator = common::donator(&app, "a@relief.example").await;
    let other = common::donator(&app, "b@relief.example").await;
    let affected = common::affected(&app, "c@relief.example").await;

    let (status, body) = common::post(
        &app,
        "/api/donations/",
        Some(&donator.access),
        rice(Some(other.id)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]["recipient"].is_array());

    let donation = create(&app, &donator.access, rice(Some(affected.id))).await;
    assert_eq!(donation["recipient"], affected.id);
    assert_eq!(donation["recipient_name"], "Test affected");
}

#[tokio::test]
async fn test_only_owner_updates_and_deletes() {
    let (app, _) = common::create_test_app().await;
    let owner = common::donator(&app, "owner@relief.example").await;
    let stranger = common::donator(&app, "stranger@relief.example").await;
    let donation = create(&app, &owner.access, rice(None)).await;
    let uri = format!("/api/donations/{}/", donation["id"]);

    let (status, _) =
        common::patch(&app, &uri, Some(&stranger.access), json!({"quantity": 5})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) =
        common::patch(&app, &uri, Some(&owner.access), json!({"quantity": 0})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]["quantity"].is_array());

    let (status, body) =
        common::patch(&app, &uri, Some(&owner.access), json!({"quantity": 5})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["quantity"], 5);
    assert_eq!(body["title"], "Rice sacks");

    let (status, _) = common::delete(&app, &uri, Some(&stranger.access)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = common::delete(&app, &uri, Some(&owner.access)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = common::get(&app, &uri, Some(&owner.access)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_status_change_records_tracking() {
    let (app, _) = common::create_test_app().await;
    let donator = common::donator(&app, "mover@relief.example").await;
    let recipient = common::affected(&app, "receiver@relief.example").await;
    let stranger = common::affected(&app, "nosy@relief.example").await;
    let donation = create(&app, &donator.access, rice(Some(recipient.id))).await;
    let id = donation["id"].as_i64().unwrap();
    let uri = format!("/api/donations/{}/update_status/", id);

    let (status, body) = common::post(
        &app,
        &uri,
        Some(&donator.access),
        json!({"status": "in_transit", "notes": "Truck left"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "in_transit");

    let (status, body) = common::post(
        &app,
        &uri,
        Some(&recipient.access),
        json!({"status": "delivered"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["delivered_at"].is_string());

    let (status, _) =
        common::post(&app, &uri, Some(&stranger.access), json!({"status": "cancelled"})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) =
        common::post(&app, &uri, Some(&donator.access), json!({"status": "lost"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = common::post(&app, &uri, Some(&donator.access), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = common::get(
        &app,
        &format!("/api/tracking/?donation={}", id),
        Some(&donator.access),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    let statuses: Vec<&str> = body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["status"].as_str().unwrap())
        .collect();
    assert!(statuses.contains(&"in_transit"));
    assert!(statuses.contains(&"delivered"));

    let entry_id = body["results"][0]["id"].as_i64().unwrap();
    let (status, entry) = common::get(
        &app,
        &format!("/api/tracking/{}/", entry_id),
        Some(&donator.access),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["donation"], id);
}

#[tokio::test]
async fn test_status_change_is_broadcast() {
    let (app, state) = common::create_test_app().await;
    let donator = common::donator(&app, "loud@relief.example").await;
    let donation = create(&app, &donator.access, rice(None)).await;
    let mut events = state
        .realtime
        .subscribe(donation_backend::services::Group::Donations);

    let (status, _) = common::post(
        &app,
        &format!("/api/donations/{}/update_status/", donation["id"]),
        Some(&donator.access),
        json!({"status": "approved"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let event = serde_json::to_value(events.recv().await.unwrap()).unwrap();
    assert_eq!(event["type"], "donation_update");
    assert_eq!(event["data"]["donation_id"], donation["id"]);
    assert_eq!(event["data"]["status"], "approved");
    assert_eq!(event["data"]["updated_by"], donator.id);
}

#[tokio::test]
async fn test_list_cache_invalidated_by_writes() {
    let (app, _) = common::create_test_app().await;
    let donator = common::donator(&app, "cache@relief.example").await;

    let (_, body) = common::get(&app, "/api/donations/", Some(&donator.access)).await;
    assert_eq!(body["count"], 0);

    let donation = create(&app, &donator.access, rice(None)).await;
    let (_, body) = common::get(&app, "/api/donations/", Some(&donator.access)).await;
    assert_eq!(body["count"], 1);

    common::delete(
        &app,
        &format!("/api/donations/{}/", donation["id"]),
        Some(&donator.access),
    )
    .await;
    let (_, body) = common::get(&app, "/api/donations/", Some(&donator.access)).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_list_cache_follows_account_changes() {
    let (app, _) = common::create_test_app().await;
    let donator = common::donator(&app, "leaving@relief.example").await;
    let viewer = common::donator(&app, "watcher@relief.example").await;
    create(&app, &donator.access, rice(None)).await;

    let (_, body) = common::get(&app, "/api/donations/", Some(&viewer.access)).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["donator_name"], "Test donator");

    let user_uri = format!("/api/users/{}/", donator.id);
    let (status, _) = common::patch(
        &app,
        &user_uri,
        Some(&donator.access),
        json!({"first_name": "Renamed"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = common::get(&app, "/api/donations/", Some(&viewer.access)).await;
    assert_eq!(body["results"][0]["donator_name"], "Renamed donator");

    let (status, _) = common::delete(&app, &user_uri, Some(&donator.access)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = common::get(&app, "/api/donations/", Some(&viewer.access)).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_list_cache_keeps_hosts_apart() {
    let (app, _) = common::create_test_app().await;
    let donator = common::donator(&app, "prolific@relief.example").await;
    for _ in 0..21 {
        create(&app, &donator.access, rice(None)).await;
    }

    let (_, body) = common::get(&app, "/api/donations/", Some(&donator.access)).await;
    assert_eq!(body["next"], "http://testserver/api/donations/?page=2");

    let (status, body) = common::send_to_host(
        &app,
        "mirror.relief.example",
        "GET",
        "/api/donations/",
        Some(&donator.access),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["next"], "http://mirror.relief.example/api/donations/?page=2");
}

#[tokio::test]
async fn test_list_filters() {
    let (app, _) = common::create_test_app().await;
    let first = common::donator(&app, "first@relief.example").await;
    let second = common::donator(&app, "second@relief.example").await;
    let affected = common::affected(&app, "target@relief.example").await;

    create(&app, &first.access, rice(Some(affected.id))).await;
    let mut water = rice(None);
    water["category"] = json!("water");
    create(&app, &second.access, water).await;

    let (_, body) = common::get(&app, "/api/donations/?category=water", Some(&first.access)).await;
    assert_eq!(body["count"], 1);

    let (_, body) =
        common::get(&app, "/api/donations/?my_donations=true", Some(&first.access)).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["donator"], first.id);

    let (_, body) =
        common::get(&app, "/api/donations/?my_donations=true", Some(&affected.access)).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["recipient"], affected.id);
}

#[tokio::test]
async fn test_assign_recipient() {
    let (app, _) = common::create_test_app().await;
    let donator = common::donator(&app, "assigner@relief.example").await;
    let other = common::donator(&app, "other@relief.example").await;
    let affected = common::affected(&app, "assignee@relief.example").await;
    let donation = create(&app, &donator.access, rice(None)).await;
    let uri = format!("/api/donations/{}/assign_recipient/", donation["id"]);

    let (status, _) = common::post(
        &app,
        &uri,
        Some(&other.access),
        json!({"recipient_id": affected.id}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = common::post(
        &app,
        &uri,
        Some(&donator.access),
        json!({"recipient_id": other.id}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = common::post(
        &app,
        &uri,
        Some(&donator.access),
        json!({"recipient_id": affected.id}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recipient"], affected.id);
    assert_eq!(body["status"], "approved");
}
