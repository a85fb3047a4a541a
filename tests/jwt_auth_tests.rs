// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT validation tests against the full router.
//!
//! Tokens are signed by hand here so expiry, signing key and token type
//! can each be wrong in isolation.

use axum::http::StatusCode;
use donation_backend::middleware::auth::{Claims, TokenType};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

mod common;

fn sign(claims: &Claims, key: &[u8]) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(key),
    )
    .unwrap()
}

fn claims(user_id: i64, token_type: TokenType, offset_secs: i64) -> Claims {
    let now = chrono::Utc::now().timestamp();
    Claims {
        sub: user_id.to_string(),
        exp: now + offset_secs,
        iat: now,
        token_type,
    }
}

#[tokio::test]
async fn test_hand_signed_access_token_accepted() {
    let (app, state) = common::create_test_app().await;
    let user = common::donator(&app, "jwt@relief.example").await;

    let token = sign(
        &claims(user.id, TokenType::Access, 3600),
        &state.config.jwt_signing_key,
    );
    let (status, body) = common::get(&app, "/api/auth/me/", Some(&token)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], user.id);
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let (app, state) = common::create_test_app().await;
    let user = common::donator(&app, "expired@relief.example").await;

    let token = sign(
        &claims(user.id, TokenType::Access, -3600),
        &state.config.jwt_signing_key,
    );
    let (status, body) = common::get(&app, "/api/auth/me/", Some(&token)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Given token not valid for any token type");
}

#[tokio::test]
async fn test_wrong_signing_key_rejected() {
    let (app, _) = common::create_test_app().await;
    let user = common::donator(&app, "forged@relief.example").await;

    let token = sign(
        &claims(user.id, TokenType::Access, 3600),
        b"some-other-signing-key-entirely",
    );
    let (status, _) = common::get(&app, "/api/auth/me/", Some(&token)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_token_cannot_authenticate_requests() {
    let (app, _) = common::create_test_app().await;
    let user = common::donator(&app, "refresh-as-access@relief.example").await;

    let (status, _) = common::get(&app, "/api/auth/me/", Some(&user.refresh)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_token_rejected_even_on_public_routes() {
    let (app, _) = common::create_test_app().await;

    let (status, _) = common::get(&app, "/api/anonymous-locations/active/", Some("garbage")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_for_deleted_user_rejected() {
    let (app, state) = common::create_test_app().await;
    let user = common::donator(&app, "gone@relief.example").await;

    let (status, _) = common::delete(&app, &format!("/api/users/{}/", user.id), Some(&user.access)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(state.db.get_user(user.id).await.unwrap().is_none());

    let (status, _) = common::get(&app, "/api/auth/me/", Some(&user.access)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_with_non_numeric_subject_rejected() {
    let (app, state) = common::create_test_app().await;

    let mut bad = claims(1, TokenType::Access, 3600);
    bad.sub = "not-a-user".to_string();
    let token = sign(&bad, &state.config.jwt_signing_key);
    let (status, _) = common::get(&app, "/api/auth/me/", Some(&token)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
