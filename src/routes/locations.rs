// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Registered-user location sharing.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use super::{check_coordinates, flag};
use crate::error::{AppError, FieldErrors, Result};
use crate::extract::{flex, JsonBody};
use crate::middleware::AuthUser;
use crate::models::Location;
use crate::pagination::{PageRequest, Paginated};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/locations/", get(list_locations).post(create_location))
        .route("/api/locations/affected_users/", get(affected_users))
        .route("/api/locations/{id}/", get(get_location))
}

#[derive(Debug, Deserialize)]
pub struct LocationQuery {
    user: Option<String>,
    current_only: Option<String>,
}

async fn list_locations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LocationQuery>,
    page: PageRequest,
) -> Result<Json<Paginated<Location>>> {
    let user_id = match query.user.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<i64>().map_err(|_| {
            AppError::field("user", "Select a valid choice. That choice is not one of the available choices.")
        })?),
    };
    let current_only = flag(query.current_only.as_deref());

    Ok(Json(
        state.db.list_locations(user_id, current_only, page).await?,
    ))
}

async fn get_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Location>> {
    let location = state
        .db
        .get_shared_location(id)
        .await?
        .ok_or_else(AppError::not_found)?;
    Ok(Json(location))
}

#[derive(Debug, Deserialize)]
pub struct CreateLocationRequest {
    #[serde(default, deserialize_with = "flex::opt_f64")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "flex::opt_f64")]
    longitude: Option<f64>,
    #[serde(default, deserialize_with = "flex::opt_f64")]
    accuracy: Option<f64>,
}

/// Record the caller's current position.
async fn create_location(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    JsonBody(body): JsonBody<CreateLocationRequest>,
) -> Result<(StatusCode, Json<Location>)> {
    let mut errors = FieldErrors::new();
    if body.latitude.is_none() {
        errors.add("latitude", "This field is required.");
    }
    if body.longitude.is_none() {
        errors.add("longitude", "This field is required.");
    }
    check_coordinates(
        &mut errors,
        ("latitude", body.latitude),
        ("longitude", body.longitude),
    );
    errors.into_result()?;

    let (Some(latitude), Some(longitude)) = (body.latitude, body.longitude) else {
        return Err(AppError::field("latitude", "This field is required."));
    };

    let location = state
        .db
        .record_location(user.id, latitude, longitude, body.accuracy)
        .await?;

    tracing::debug!(user_id = user.id, location_id = location.id, "Location recorded");
    Ok((StatusCode::CREATED, Json(location)))
}

/// Current locations of affected users who share them.
async fn affected_users(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Location>>> {
    Ok(Json(state.db.affected_user_locations().await?))
}
