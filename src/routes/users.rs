// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User profile endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use super::auth::validate_phone;
use super::{non_blank, parse_choice, store_image};
use crate::db::UserUpdate;
use crate::error::{AppError, FieldErrors, Result};
use crate::extract::{flex, JsonBody};
use crate::middleware::AuthUser;
use crate::models::{Role, User, UserProfile};
use crate::pagination::{PageRequest, Paginated};
use crate::services::media::kinds;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/users/", get(list_users))
        .route("/api/users/me/", get(me))
        .route(
            "/api/users/{id}/",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route(
            "/api/users/{id}/toggle_location_sharing/",
            post(toggle_location_sharing),
        )
}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    role: Option<String>,
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserListQuery>,
    page: PageRequest,
) -> Result<Json<Paginated<UserProfile>>> {
    let role = non_blank(query.role);
    Ok(Json(state.db.list_users(role, page).await?))
}

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

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<UserProfile>> {
    let user = state.db.get_user(id).await?.ok_or_else(AppError::not_found)?;
    Ok(Json(user.profile()))
}

/// Only the account owner or staff may change an account.
fn check_owner(caller: &AuthUser, id: i64) -> Result<()> {
    if caller.id == id || caller.is_staff {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You do not have permission to perform this action.".to_string(),
        ))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    first_name: Option<String>,
    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    last_name: Option<String>,
    #[serde(default, deserialize_with = "flex::opt_string")]
    #[validate(custom(function = "validate_phone"))]
    phone_number: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default, deserialize_with = "flex::opt_bool")]
    is_location_shared: Option<bool>,
    /// Base64 image payload
    #[serde(default)]
    profile_picture: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<i64>,
    JsonBody(mut body): JsonBody<UpdateUserRequest>,
) -> Result<Json<User>> {
    let existing = state.db.get_user(id).await?.ok_or_else(AppError::not_found)?;
    check_owner(&caller, existing.id)?;

    // An empty phone number clears it.
    body.phone_number = body.phone_number.map(|p| p.trim().to_string());
    let clear_phone = body.phone_number.as_deref() == Some("");
    if clear_phone {
        body.phone_number = None;
    }

    let mut errors = body
        .validate()
        .err()
        .map(FieldErrors::from)
        .unwrap_or_default();
    let role = parse_choice::<Role>(&mut errors, "role", non_blank(body.role.take()).as_deref());
    if role.is_some() && !caller.is_staff {
        errors.add("role", "Only staff can change a user's role.");
    }
    errors.into_result()?;

    let profile_picture = match non_blank(body.profile_picture) {
        Some(payload) => {
            Some(store_image(&state, kinds::PROFILES, "profile_picture", &payload).await?)
        }
        None => None,
    };

    let update = UserUpdate {
        first_name: body.first_name.map(|s| s.trim().to_string()),
        last_name: body.last_name.map(|s| s.trim().to_string()),
        phone_number: body.phone_number.or_else(|| clear_phone.then(String::new)),
        address: body.address,
        is_location_shared: body.is_location_shared,
        profile_picture: profile_picture.clone(),
        role,
    };

    let user = state
        .db
        .update_user(id, update)
        .await?
        .ok_or_else(AppError::not_found)?;

    if let (Some(_), Some(old)) = (profile_picture, existing.profile_picture) {
        state.media.remove(&old).await;
    }
    // Cached donation lists embed donator and recipient names.
    state.donation_cache.invalidate();

    tracing::info!(user_id = id, updated_by = caller.id, "User updated");
    Ok(Json(user))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    let existing = state.db.get_user(id).await?.ok_or_else(AppError::not_found)?;
    check_owner(&caller, existing.id)?;

    state.db.delete_user(id).await?;
    // Their donations went with the account.
    state.donation_cache.invalidate();
    if let Some(picture) = existing.profile_picture {
        state.media.remove(&picture).await;
    }

    tracing::info!(user_id = id, deleted_by = caller.id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct LocationSharing {
    pub is_location_shared: bool,
}

async fn toggle_location_sharing(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<LocationSharing>> {
    let user = state.db.get_user(id).await?.ok_or_else(AppError::not_found)?;
    if user.id != caller.id {
        return Err(AppError::Forbidden(
            "You can only toggle your own location sharing".to_string(),
        ));
    }

    let update = UserUpdate {
        is_location_shared: Some(!user.is_location_shared),
        ..Default::default()
    };
    let user = state
        .db
        .update_user(id, update)
        .await?
        .ok_or_else(AppError::not_found)?;

    tracing::debug!(user_id = id, shared = user.is_location_shared, "Location sharing toggled");
    Ok(Json(LocationSharing {
        is_location_shared: user.is_location_shared,
    }))
}
