// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account registration, login and token refresh.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;
use validator::{Validate, ValidationError};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use super::{non_blank, parse_choice};
use crate::db::NewUser;
use crate::error::{AppError, FieldErrors, Result};
use crate::extract::{flex, JsonBody};
use crate::middleware::auth::{create_token_pair, decode_token, AuthUser, TokenPair, TokenType};
use crate::models::user::{normalize_email, PHONE_NUMBER, PHONE_NUMBER_MESSAGE};
use crate::models::{Role, User};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/register/", post(register))
        .route("/api/auth/login/", post(login))
        .route("/api/auth/register-affected/", post(register_affected))
        .route("/api/auth/login-affected/", post(login_affected))
        .route("/api/auth/token/refresh/", post(refresh_token))
}

/// Routes that need an authenticated caller.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/auth/me/", get(me))
}

/// User plus a fresh token pair.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuthResponse {
    pub user: User,
    pub tokens: TokenPair,
}

impl AuthResponse {
    fn issue(state: &AppState, user: User) -> Result<Self> {
        let tokens = create_token_pair(user.id, &state.config.jwt_signing_key)?;
        Ok(Self { user, tokens })
    }
}

pub(crate) fn validate_phone(value: &str) -> std::result::Result<(), ValidationError> {
    if PHONE_NUMBER.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::new("phone_number").with_message(Cow::Borrowed(PHONE_NUMBER_MESSAGE)))
    }
}

// ─── Email/password accounts ─────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(email(message = "Enter a valid email address."))]
    email: Option<String>,
    #[serde(default)]
    #[validate(length(min = 6, message = "Ensure this field has at least 6 characters."))]
    password: Option<String>,
    #[serde(default)]
    password2: Option<String>,
    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    first_name: Option<String>,
    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    last_name: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default, deserialize_with = "flex::opt_string")]
    #[validate(custom(function = "validate_phone"))]
    phone_number: Option<String>,
    #[serde(default)]
    address: Option<String>,
}

/// Register a donator or affected user.
async fn register(
    State(state): State<Arc<AppState>>,
    JsonBody(mut body): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    body.email = non_blank(body.email).map(|e| normalize_email(&e));
    body.phone_number = non_blank(body.phone_number);
    if body.password.as_deref() == Some("") {
        body.password = None;
    }

    let mut errors = body
        .validate()
        .err()
        .map(FieldErrors::from)
        .unwrap_or_default();
    errors.require("email", body.email.as_deref());
    errors.require("password", body.password.as_deref());
    errors.require("password2", body.password2.as_deref());
    if body.password.is_some() && body.password2.is_some() && body.password != body.password2 {
        errors.add("password", "Password fields didn't match.");
    }

    let role = match parse_choice::<Role>(&mut errors, "role", non_blank(body.role).as_deref()) {
        Some(Role::Admin) => {
            errors.add("role", "\"admin\" is not a valid choice.");
            None
        }
        role => role,
    };
    errors.into_result()?;

    // Validation above guarantees both are present.
    let (Some(email), Some(password)) = (body.email, body.password) else {
        return Err(AppError::field("email", "This field is required."));
    };

    if state.db.get_user_by_email(email.clone()).await?.is_some() {
        return Err(AppError::field("email", "user with this email already exists."));
    }

    let password_hash = state.passwords.hash_blocking(password).await?;
    let user = state
        .db
        .create_user(NewUser {
            email,
            password_hash: Some(password_hash),
            first_name: body.first_name.unwrap_or_default().trim().to_string(),
            last_name: body.last_name.unwrap_or_default().trim().to_string(),
            role: role.unwrap_or(Role::Donator),
            phone_number: body.phone_number.unwrap_or_default(),
            address: body.address.unwrap_or_default(),
            is_staff: false,
            is_superuser: false,
        })
        .await?;

    tracing::info!(user_id = user.id, role = %user.role, "User registered");

    Ok((StatusCode::CREATED, Json(AuthResponse::issue(&state, user)?)))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// Exchange email and password for tokens.
async fn login(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let (Some(email), Some(password)) = (
        non_blank(body.email),
        body.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::BadRequest(
            "Please provide both email and password".to_string(),
        ));
    };

    let invalid = || AppError::AuthenticationFailed("Invalid credentials".to_string());

    let user = state
        .db
        .get_user_by_email(normalize_email(&email))
        .await?
        .ok_or_else(invalid)?;
    let Some(hash) = user.password_hash.clone() else {
        return Err(invalid());
    };
    if !state.passwords.verify_blocking(password, hash).await || !user.is_active {
        tracing::info!(user_id = user.id, "Rejected login");
        return Err(invalid());
    }

    state.db.record_login(user.id).await?;
    tracing::info!(user_id = user.id, "User logged in");

    Ok(Json(AuthResponse::issue(&state, user)?))
}

// ─── Phone-only affected accounts ────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterAffectedRequest {
    #[serde(default, deserialize_with = "flex::opt_string")]
    phone_number: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    address: Option<String>,
}

/// Register an affected user identified only by phone number.
async fn register_affected(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<RegisterAffectedRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let (Some(phone), Some(first_name), Some(last_name)) = (
        non_blank(body.phone_number),
        non_blank(body.first_name),
        non_blank(body.last_name),
    ) else {
        return Err(AppError::BadRequest(
            "Phone number, first name, and last name are required".to_string(),
        ));
    };

    if let Err(e) = validate_phone(&phone) {
        let mut errors = FieldErrors::new();
        errors.add("phone_number", e.to_string());
        return Err(AppError::Validation(errors));
    }
    if state.db.phone_number_taken(phone.clone()).await? {
        return Err(AppError::BadRequest(
            "User with this phone number already exists".to_string(),
        ));
    }

    let user = state
        .db
        .create_user(NewUser {
            email: format!("{}@affected.local", phone),
            password_hash: None,
            first_name,
            last_name,
            role: Role::Affected,
            phone_number: phone,
            address: body.address.unwrap_or_default(),
            is_staff: false,
            is_superuser: false,
        })
        .await?;

    tracing::info!(user_id = user.id, "Affected user registered by phone");

    Ok((StatusCode::CREATED, Json(AuthResponse::issue(&state, user)?)))
}

#[derive(Debug, Deserialize)]
pub struct LoginAffectedRequest {
    #[serde(default, deserialize_with = "flex::opt_string")]
    phone_number: Option<String>,
}

/// Log an affected user in by phone number.
async fn login_affected(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<LoginAffectedRequest>,
) -> Result<Json<AuthResponse>> {
    let phone = non_blank(body.phone_number)
        .ok_or_else(|| AppError::BadRequest("Please provide phone number".to_string()))?;

    let user = state
        .db
        .find_affected_by_phone(phone)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| {
            AppError::NotFound("No affected user found with this phone number".to_string())
        })?;

    state.db.record_login(user.id).await?;
    Ok(Json(AuthResponse::issue(&state, user)?))
}

// ─── Tokens ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    refresh: Option<String>,
}

/// Trade a refresh token for a new pair.
async fn refresh_token(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<RefreshRequest>,
) -> Result<Json<TokenPair>> {
    let Some(refresh) = non_blank(body.refresh) else {
        return Err(AppError::field("refresh", "This field is required."));
    };

    let user_id = decode_token(&refresh, &state.config.jwt_signing_key, TokenType::Refresh)?;
    let user = state
        .db
        .get_user(user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or(AppError::InvalidToken)?;

    Ok(Json(create_token_pair(user.id, &state.config.jwt_signing_key)?))
}

/// Current user.
async fn me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<User>> {
    let user = state
        .db
        .get_user(user.id)
        .await?
        .ok_or_else(AppError::not_found)?;
    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("+639171234567").is_ok());
        assert!(validate_phone("09171234567").is_ok());
        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("phone").is_err());
    }

    #[test]
    fn test_register_validation_messages() {
        let body = RegisterRequest {
            email: Some("not-an-email".to_string()),
            password: Some("abc".to_string()),
            password2: Some("abc".to_string()),
            first_name: None,
            last_name: None,
            role: None,
            phone_number: Some("12".to_string()),
            address: None,
        };
        let errors = FieldErrors::from(body.validate().unwrap_err());
        assert!(errors.contains("email"));
        assert!(errors.contains("password"));
        assert!(errors.contains("phone_number"));
    }
}
