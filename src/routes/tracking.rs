// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live position streaming by donators on their way to a location.

use axum::{extract::State, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use super::anonymous::tracking_event;
use super::check_coordinates;
use crate::error::{AppError, FieldErrors, Result};
use crate::extract::{flex, JsonBody};
use crate::middleware::AuthUser;
use crate::services::{EventKind, Group};
use crate::time_utils::{format_utc_rfc3339, round_coordinate};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/location-updates/", post(location_update))
        .route("/api/stop-tracking/", post(stop_tracking))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdateRequest {
    #[serde(default, deserialize_with = "flex::opt_i64")]
    location_id: Option<i64>,
    #[serde(default, deserialize_with = "flex::opt_f64")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "flex::opt_f64")]
    longitude: Option<f64>,
    #[serde(default, deserialize_with = "flex::opt_f64")]
    accuracy: Option<f64>,
}

#[derive(Serialize)]
pub struct TrackingResponse {
    pub status: &'static str,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Store one position of the caller and fan it out to the map.
async fn location_update(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    JsonBody(body): JsonBody<LocationUpdateRequest>,
) -> Result<Json<TrackingResponse>> {
    // Clients send 0 for a position they do not have yet.
    let (Some(location_id), Some(latitude), Some(longitude)) = (
        body.location_id.filter(|id| *id != 0),
        body.latitude.filter(|v| *v != 0.0),
        body.longitude.filter(|v| *v != 0.0),
    ) else {
        return Err(AppError::BadRequest(
            "locationId, latitude, and longitude are required".to_string(),
        ));
    };
    let mut errors = FieldErrors::new();
    check_coordinates(&mut errors, ("latitude", Some(latitude)), ("longitude", Some(longitude)));
    errors.into_result()?;
    let accuracy = body.accuracy.unwrap_or(0.0);

    let entry = state
        .db
        .find_on_the_way(location_id, user.id, true)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("No active tracking found for this location".to_string())
        })?;

    let recorded_at = state
        .db
        .record_tracking_update(entry.id, latitude, longitude, accuracy)
        .await?;
    let timestamp = format_utc_rfc3339(recorded_at);

    state.realtime.publish(
        Group::Locations,
        EventKind::DonatorTrackingUpdate,
        tracking_event(
            &user,
            location_id,
            json!({
                "latitude": round_coordinate(latitude, 8),
                "longitude": round_coordinate(longitude, 8),
                "accuracy": accuracy,
                "message": format!("{} is on the way for supplies", user.display_name()),
                "timestamp": timestamp,
            }),
        ),
    );

    tracing::debug!(location_id, donator_id = user.id, "Tracking update stored");
    Ok(Json(TrackingResponse {
        status: "success",
        message: "Location update received",
        timestamp: Some(timestamp),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopTrackingRequest {
    #[serde(default, deserialize_with = "flex::opt_i64")]
    location_id: Option<i64>,
}

async fn stop_tracking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    JsonBody(body): JsonBody<StopTrackingRequest>,
) -> Result<Json<TrackingResponse>> {
    let location_id = body
        .location_id
        .ok_or_else(|| AppError::BadRequest("locationId is required".to_string()))?;

    let entry = state
        .db
        .find_on_the_way(location_id, user.id, false)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("No tracking record found for this location".to_string())
        })?;
    state.db.stop_tracking(entry.id).await?;

    state.realtime.publish(
        Group::Locations,
        EventKind::DonatorTrackingUpdate,
        tracking_event(
            &user,
            location_id,
            json!({
                "message": format!("{} has stopped location sharing", user.display_name()),
                "status": "tracking_stopped",
                "timestamp": format_utc_rfc3339(crate::time_utils::now()),
            }),
        ),
    );

    tracing::info!(location_id, donator_id = user.id, "Tracking stopped");
    Ok(Json(TrackingResponse {
        status: "success",
        message: "Location tracking stopped",
        timestamp: None,
    }))
}
