// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Anonymous location sharing, "on the way" marking and QR hand-over.
//!
//! Affected people without an account share a location keyed by a browser
//! session id. Donators (authenticated) mark themselves on the way and
//! confirm delivery by scanning the location's QR code, which starts a
//! cooldown for the affected person's phone number.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use validator::{Validate, ValidationError};

use super::{
    check_coordinates, no_cache_headers, non_blank, store_image, NO_STORE, NO_STORE_EXPIRED,
};
use crate::db::{AnonymousLocationUpdate, NewAnonymousLocation};
use crate::error::{AppError, FieldErrors, Result};
use crate::extract::{flex, JsonBody};
use crate::middleware::AuthUser;
use crate::models::anonymous::{restriction, PH_MOBILE, PH_MOBILE_MESSAGE};
use crate::models::{full_name, generate_qr_code, AnonymousLocation, SupplyNeeds};
use crate::pagination::{PageRequest, Paginated};
use crate::services::media::kinds;
use crate::services::{EventKind, Group};
use crate::time_utils::{self, format_utc_rfc3339};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/anonymous-locations/",
            get(list_locations).post(share_location),
        )
        .route("/api/anonymous-locations/active/", get(active_locations))
        .route("/api/anonymous-locations/scan_qr_code/", post(scan_qr_code))
        .route("/api/anonymous-locations/{id}/", get(get_location))
        .route(
            "/api/anonymous-locations/{id}/deactivate/",
            post(deactivate),
        )
        .route(
            "/api/anonymous-locations/{id}/mark_on_the_way/",
            post(mark_on_the_way),
        )
}

/// The caller, or 401 with the message the map client shows.
fn require_donator(user: Option<Extension<AuthUser>>) -> Result<AuthUser> {
    user.map(|Extension(u)| u)
        .ok_or_else(|| AppError::AuthenticationFailed("Authentication required".to_string()))
}

async fn visible_location(state: &AppState, id: i64) -> Result<AnonymousLocation> {
    state
        .db
        .get_visible_anonymous_location(id)
        .await?
        .ok_or_else(AppError::not_found)
}

// ─── Listing ─────────────────────────────────────────────────

async fn list_locations(
    State(state): State<Arc<AppState>>,
    page: PageRequest,
) -> Result<Json<Paginated<AnonymousLocation>>> {
    Ok(Json(state.db.list_anonymous_locations(page).await?))
}

async fn get_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<AnonymousLocation>> {
    Ok(Json(visible_location(&state, id).await?))
}

/// Every visible location, never cached by the client.
async fn active_locations(
    State(state): State<Arc<AppState>>,
) -> Result<(HeaderMap, Json<Vec<AnonymousLocation>>)> {
    let locations = state.db.active_anonymous_locations().await?;
    Ok((no_cache_headers(NO_STORE_EXPIRED), Json(locations)))
}

// ─── Sharing ─────────────────────────────────────────────────

fn validate_ph_mobile(value: &str) -> std::result::Result<(), ValidationError> {
    if PH_MOBILE.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::new("phone").with_message(PH_MOBILE_MESSAGE.into()))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ShareLocationRequest {
    #[serde(default)]
    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters."))]
    first_name: Option<String>,
    #[serde(default)]
    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters."))]
    last_name: Option<String>,
    #[serde(default, deserialize_with = "flex::opt_string")]
    #[validate(custom(function = "validate_ph_mobile"))]
    phone: Option<String>,
    #[serde(default)]
    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    facebook: Option<String>,
    #[serde(default)]
    #[validate(email(message = "Enter a valid email address."))]
    email: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    /// Base64 image payload
    #[serde(default)]
    photo: Option<String>,
    #[serde(default)]
    supply_needs: Option<Value>,
    #[serde(default, deserialize_with = "flex::opt_f64")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "flex::opt_f64")]
    longitude: Option<f64>,
    #[serde(default, deserialize_with = "flex::opt_f64")]
    accuracy: Option<f64>,
    #[serde(default, deserialize_with = "flex::opt_string")]
    session_id: Option<String>,
}

impl ShareLocationRequest {
    /// Blank optional text counts as absent.
    fn normalize(&mut self) {
        self.phone = non_blank(self.phone.take());
        self.email = non_blank(self.email.take());
        self.photo = non_blank(self.photo.take());
        self.session_id = non_blank(self.session_id.take());
    }

    /// Field checks shared by create and update. Returns parsed supply needs.
    fn check(&mut self, errors: &mut FieldErrors) -> Option<Value> {
        if let Err(e) = self.validate() {
            errors.merge(FieldErrors::from(e));
        }
        check_coordinates(
            errors,
            ("latitude", self.latitude),
            ("longitude", self.longitude),
        );
        match self.supply_needs.take().map(SupplyNeeds::parse) {
            Some(Ok(needs)) => Some(needs),
            Some(Err(message)) => {
                errors.add("supply_needs", message);
                None
            }
            None => None,
        }
    }
}

/// Create a shared location, or update the caller's active one.
async fn share_location(
    State(state): State<Arc<AppState>>,
    JsonBody(mut body): JsonBody<ShareLocationRequest>,
) -> Result<Response> {
    body.normalize();

    if let Some(phone) = body.phone.clone() {
        if let Some(next_allowed_at) = state.db.cooldown_until(phone).await? {
            let restriction = restriction(next_allowed_at, time_utils::now());
            tracing::info!(
                remaining_seconds = restriction.time_remaining_seconds,
                "Rejected location share during cooldown"
            );
            return Err(AppError::Cooldown(restriction));
        }
    }

    let existing = match body.session_id.clone() {
        Some(session_id) => state.db.find_active_session(session_id).await?,
        None => None,
    };

    match existing {
        Some(existing) => update_shared(&state, existing, body).await,
        None => create_shared(&state, body).await,
    }
}

async fn update_shared(
    state: &AppState,
    existing: AnonymousLocation,
    mut body: ShareLocationRequest,
) -> Result<Response> {
    let mut errors = FieldErrors::new();
    for (field, value) in [("first_name", &body.first_name), ("last_name", &body.last_name)] {
        if value.is_some() {
            errors.require(field, value.as_deref());
        }
    }
    let supply_needs = body.check(&mut errors);
    errors.into_result()?;

    let photo = match body.photo.as_deref() {
        Some(payload) => {
            Some(store_image(state, kinds::ANONYMOUS_LOCATIONS, "photo", payload).await?)
        }
        None => None,
    };

    let location = state
        .db
        .update_anonymous_location(
            existing.id,
            AnonymousLocationUpdate {
                first_name: body.first_name,
                last_name: body.last_name,
                phone: body.phone,
                facebook: body.facebook,
                email: body.email,
                notes: body.notes,
                photo: photo.clone(),
                supply_needs,
                latitude: body.latitude,
                longitude: body.longitude,
                accuracy: body.accuracy,
            },
        )
        .await?
        .ok_or_else(AppError::not_found)?;

    if let (Some(_), Some(old)) = (photo, existing.photo) {
        state.media.remove(&old).await;
    }

    tracing::debug!(location_id = location.id, "Anonymous location updated");
    Ok(Json(location).into_response())
}

async fn create_shared(state: &AppState, mut body: ShareLocationRequest) -> Result<Response> {
    let mut errors = FieldErrors::new();
    if non_blank(body.first_name.clone()).is_none() {
        errors.add("first_name", "First name is required");
    }
    if non_blank(body.last_name.clone()).is_none() {
        errors.add("last_name", "Last name is required");
    }
    if body.photo.is_none() {
        errors.add("photo", "Photo is required to verify your location");
    }
    errors.require("phone", body.phone.as_deref());
    for (field, missing) in [
        ("latitude", body.latitude.is_none()),
        ("longitude", body.longitude.is_none()),
    ] {
        if missing {
            errors.add(field, "This field is required.");
        }
    }
    let supply_needs = body.check(&mut errors);
    errors.into_result()?;

    let (Some(latitude), Some(longitude), Some(payload)) =
        (body.latitude, body.longitude, body.photo.as_deref())
    else {
        return Err(AppError::field("photo", "Photo is required to verify your location"));
    };
    let photo = store_image(state, kinds::ANONYMOUS_LOCATIONS, "photo", payload).await?;

    let location = state
        .db
        .create_anonymous_location(NewAnonymousLocation {
            first_name: body.first_name.unwrap_or_default().trim().to_string(),
            last_name: body.last_name.unwrap_or_default().trim().to_string(),
            phone: body.phone.unwrap_or_default(),
            facebook: body.facebook.unwrap_or_default(),
            email: body.email.unwrap_or_default(),
            notes: body.notes.unwrap_or_default(),
            photo: Some(photo),
            supply_needs: supply_needs.unwrap_or_else(|| json!({})),
            latitude,
            longitude,
            accuracy: body.accuracy,
            session_id: body.session_id.unwrap_or_default(),
            qr_code: generate_qr_code()?,
        })
        .await?;

    tracing::info!(
        location_id = location.id,
        qr_code = location.qr_code.as_deref().unwrap_or_default(),
        "Anonymous location shared"
    );
    Ok((StatusCode::CREATED, Json(location)).into_response())
}

#[derive(Serialize)]
struct StatusMessage {
    status: &'static str,
}

/// Stop sharing: the record is deleted outright.
async fn deactivate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<(HeaderMap, Json<StatusMessage>)> {
    let location = visible_location(&state, id).await?;
    state.db.delete_anonymous_location(location.id).await?;
    if let Some(photo) = location.photo {
        state.media.remove(&photo).await;
    }

    tracing::info!(location_id = id, "Anonymous location deleted by owner");
    Ok((
        no_cache_headers(NO_STORE),
        Json(StatusMessage {
            status: "location sharing stopped and data deleted",
        }),
    ))
}

// ─── Donator actions ─────────────────────────────────────────

#[derive(Serialize)]
pub struct OnTheWayResponse {
    pub status: &'static str,
    pub location: AnonymousLocation,
    pub message: &'static str,
}

/// Donator declares they are heading to a location.
async fn mark_on_the_way(
    State(state): State<Arc<AppState>>,
    user: Option<Extension<AuthUser>>,
    Path(id): Path<i64>,
) -> Result<Json<OnTheWayResponse>> {
    let user = require_donator(user)?;
    let location = visible_location(&state, id).await?;
    if location.donation_received {
        return Err(AppError::BadRequest(
            "This location has already received a donation".to_string(),
        ));
    }

    let (entry, location) = state.db.mark_on_the_way(location.id, user.id).await?;

    state.realtime.publish(
        Group::Locations,
        EventKind::DonatorTrackingUpdate,
        tracking_event(
            &user,
            location.id,
            json!({
                "message": format!("{} is on the way for supplies", user.display_name()),
                "status": "tracking_started",
                "timestamp": format_utc_rfc3339(entry.marked_at),
            }),
        ),
    );

    tracing::info!(location_id = location.id, donator_id = user.id, "Donator on the way");
    Ok(Json(OnTheWayResponse {
        status: "marked as on the way",
        location,
        message: "Please contact the affected user first to verify the location",
    }))
}

/// Common fields of a `donator_tracking_update` payload, merged with `extra`.
pub(crate) fn tracking_event(user: &AuthUser, location_id: i64, extra: Value) -> Value {
    let mut data = json!({
        "locationId": location_id,
        "donatorId": user.id,
        "donatorUsername": user.username(),
        "donatorFirstName": user.first_name,
        "donatorLastName": user.last_name,
    });
    if let (Some(data), Value::Object(extra)) = (data.as_object_mut(), extra) {
        data.extend(extra);
    }
    data
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    #[serde(default, deserialize_with = "flex::opt_string")]
    qr_code: Option<String>,
}

#[derive(Serialize)]
pub struct ScanResponse {
    pub status: &'static str,
    pub location: AnonymousLocation,
    pub message: &'static str,
    pub next_request_allowed_at: Option<DateTime<Utc>>,
}

/// Confirm a hand-over by scanning the affected person's QR code.
async fn scan_qr_code(
    State(state): State<Arc<AppState>>,
    user: Option<Extension<AuthUser>>,
    JsonBody(body): JsonBody<ScanRequest>,
) -> Result<Json<ScanResponse>> {
    let user = require_donator(user)?;
    let qr_code = non_blank(body.qr_code)
        .ok_or_else(|| AppError::BadRequest("QR code is required".to_string()))?;

    let (location, history) = state.db.scan_qr_code(qr_code.clone(), user.id).await?;

    state.realtime.publish(
        Group::Locations,
        EventKind::QrScanNotification,
        json!({
            "session_id": location.session_id,
            "donation_history_id": history.id,
            "donator_name": full_name(&user.first_name, &user.last_name).unwrap_or_default(),
            "donator_email": user.email,
            "supply_needs_fulfilled": location.supply_needs,
            "qr_code": qr_code,
            "donated_at": format_utc_rfc3339(history.donated_at),
        }),
    );

    Ok(Json(ScanResponse {
        status: "donation recorded successfully",
        next_request_allowed_at: location.next_request_allowed_at,
        location,
        message: "Thank you for your donation!",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn donator() -> AuthUser {
        AuthUser {
            id: 7,
            email: "maria@relief.example".to_string(),
            first_name: "Maria".to_string(),
            last_name: "Santos".to_string(),
            role: Role::Donator,
            is_staff: false,
        }
    }

    #[test]
    fn test_tracking_event_merges_fields() {
        let data = tracking_event(&donator(), 3, json!({"status": "tracking_stopped"}));
        assert_eq!(data["locationId"], 3);
        assert_eq!(data["donatorId"], 7);
        assert_eq!(data["donatorUsername"], "maria");
        assert_eq!(data["donatorFirstName"], "Maria");
        assert_eq!(data["status"], "tracking_stopped");
    }

    #[test]
    fn test_ph_mobile_validation() {
        assert!(validate_ph_mobile("09171234567").is_ok());
        assert!(validate_ph_mobile("+639171234567").is_ok());
        assert!(validate_ph_mobile("0917123456").is_err());
        assert!(validate_ph_mobile("+15551234567").is_err());
    }

    #[test]
    fn test_require_donator() {
        assert!(matches!(
            require_donator(None),
            Err(AppError::AuthenticationFailed(_))
        ));
        assert_eq!(require_donator(Some(Extension(donator()))).unwrap().id, 7);
    }
}
