// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Donation CRUD, status changes and tracking history.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use validator::Validate;

use super::{check_coordinates, flag, non_blank, parse_choice, store_image};
use crate::db::{DonationFilter, DonationUpdate, NewDonation};
use crate::error::{AppError, FieldErrors, Result};
use crate::extract::{flex, JsonBody};
use crate::middleware::AuthUser;
use crate::models::{Category, Donation, DonationStatus, DonationTracking, Role};
use crate::pagination::{PageRequest, Paginated};
use crate::services::media::kinds;
use crate::services::{EventKind, Group, ResponseCache};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/donations/", get(list_donations).post(create_donation))
        .route(
            "/api/donations/{id}/",
            get(get_donation)
                .patch(update_donation)
                .delete(delete_donation),
        )
        .route("/api/donations/{id}/update_status/", post(update_status))
        .route(
            "/api/donations/{id}/assign_recipient/",
            post(assign_recipient),
        )
        .route("/api/tracking/", get(list_tracking))
        .route("/api/tracking/{id}/", get(get_tracking))
}

// ─── Queries ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DonationQuery {
    status: Option<String>,
    category: Option<String>,
    my_donations: Option<String>,
}

/// Paginated donations, served from the response cache when fresh.
async fn list_donations(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<DonationQuery>,
    page: PageRequest,
) -> Result<Json<Value>> {
    // Cached bodies carry absolute links, so the host is part of the key.
    let key = ResponseCache::key(user.id, &page.canonical_url());
    if let Some(body) = state.donation_cache.get(&key) {
        tracing::debug!(user_id = user.id, "Donation list cache hit");
        return Ok(Json(body));
    }

    let mut filter = DonationFilter {
        status: non_blank(query.status),
        category: non_blank(query.category),
        ..Default::default()
    };
    if flag(query.my_donations.as_deref()) {
        match user.role {
            Role::Donator => filter.donator_id = Some(user.id),
            Role::Affected => filter.recipient_id = Some(user.id),
            Role::Admin => {}
        }
    }

    let page = state.db.list_donations(filter, page).await?;
    let body = serde_json::to_value(&page).map_err(anyhow::Error::from)?;
    state.donation_cache.insert(key, body.clone());
    Ok(Json(body))
}

async fn get_donation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Donation>> {
    Ok(Json(load(&state, id).await?))
}

async fn load(state: &AppState, id: i64) -> Result<Donation> {
    state
        .db
        .get_donation(id)
        .await?
        .ok_or_else(AppError::not_found)
}

/// Donator of the donation, or staff.
fn check_donator(user: &AuthUser, donation: &Donation) -> Result<()> {
    if donation.donator == user.id || user.is_staff {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You do not have permission to perform this action.".to_string(),
        ))
    }
}

/// Recipients must be existing affected users.
async fn check_recipient(state: &AppState, errors: &mut FieldErrors, recipient: Option<i64>) -> Result<()> {
    if let Some(id) = recipient {
        let ok = state
            .db
            .get_user(id)
            .await?
            .is_some_and(|u| u.role == Role::Affected);
        if !ok {
            errors.add("recipient", "Recipient not found or not an affected user");
        }
    }
    Ok(())
}

// ─── Writes ──────────────────────────────────────────────────

/// Donation fields shared by create and partial update.
#[derive(Debug, Deserialize, Validate)]
pub struct DonationRequest {
    #[serde(default, deserialize_with = "flex::opt_i64")]
    recipient: Option<i64>,
    #[serde(default)]
    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default, deserialize_with = "flex::opt_i64")]
    quantity: Option<i64>,
    #[serde(default)]
    #[validate(length(max = 50, message = "Ensure this field has no more than 50 characters."))]
    unit: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    pickup_location: Option<String>,
    #[serde(default, deserialize_with = "flex::opt_f64")]
    pickup_latitude: Option<f64>,
    #[serde(default, deserialize_with = "flex::opt_f64")]
    pickup_longitude: Option<f64>,
    #[serde(default)]
    delivery_location: Option<String>,
    #[serde(default, deserialize_with = "flex::opt_f64")]
    delivery_latitude: Option<f64>,
    #[serde(default, deserialize_with = "flex::opt_f64")]
    delivery_longitude: Option<f64>,
    /// Base64 image payload
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

/// Typed, checked view of a [`DonationRequest`].
struct CheckedDonation {
    category: Option<Category>,
    status: Option<DonationStatus>,
}

impl DonationRequest {
    /// Validate whatever fields are present, collecting all errors.
    async fn check(&self, state: &AppState, errors: &mut FieldErrors) -> Result<CheckedDonation> {
        if let Err(e) = self.validate() {
            errors.merge(FieldErrors::from(e));
        }
        if self.quantity.is_some_and(|q| q <= 0) {
            errors.add("quantity", "Quantity must be greater than 0");
        }
        let category = parse_choice::<Category>(errors, "category", self.category.as_deref());
        let status = parse_choice::<DonationStatus>(errors, "status", self.status.as_deref());
        check_coordinates(
            errors,
            ("pickup_latitude", self.pickup_latitude),
            ("pickup_longitude", self.pickup_longitude),
        );
        check_coordinates(
            errors,
            ("delivery_latitude", self.delivery_latitude),
            ("delivery_longitude", self.delivery_longitude),
        );
        check_recipient(state, errors, self.recipient).await?;
        Ok(CheckedDonation { category, status })
    }

    async fn store_image(&self, state: &AppState) -> Result<Option<String>> {
        match self.image.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(payload) => Ok(Some(
                store_image(state, kinds::DONATIONS, "image", payload).await?,
            )),
            None => Ok(None),
        }
    }
}

async fn create_donation(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    JsonBody(body): JsonBody<DonationRequest>,
) -> Result<(StatusCode, Json<Donation>)> {
    if user.role != Role::Donator {
        return Err(AppError::Forbidden(
            "Only donators can create donations".to_string(),
        ));
    }

    let mut errors = FieldErrors::new();
    errors.require("title", body.title.as_deref());
    errors.require("description", body.description.as_deref());
    errors.require("category", body.category.as_deref());
    errors.require("unit", body.unit.as_deref());
    errors.require("pickup_location", body.pickup_location.as_deref());
    if body.quantity.is_none() {
        errors.add("quantity", "This field is required.");
    }
    let checked = body.check(&state, &mut errors).await?;
    errors.into_result()?;

    let (Some(category), Some(quantity)) = (checked.category, body.quantity) else {
        return Err(AppError::field("category", "This field is required."));
    };
    let image = body.store_image(&state).await?;

    let donation = state
        .db
        .create_donation(NewDonation {
            donator_id: user.id,
            recipient_id: body.recipient,
            title: body.title.unwrap_or_default(),
            description: body.description.unwrap_or_default(),
            category,
            quantity,
            unit: body.unit.unwrap_or_default(),
            status: checked.status.unwrap_or(DonationStatus::Pending),
            pickup_location: body.pickup_location.unwrap_or_default(),
            pickup_latitude: body.pickup_latitude,
            pickup_longitude: body.pickup_longitude,
            delivery_location: body.delivery_location.unwrap_or_default(),
            delivery_latitude: body.delivery_latitude,
            delivery_longitude: body.delivery_longitude,
            image,
            notes: body.notes.unwrap_or_default(),
        })
        .await?;

    state.donation_cache.invalidate();
    tracing::info!(donation_id = donation.id, donator_id = user.id, "Donation created");
    Ok((StatusCode::CREATED, Json(donation)))
}

async fn update_donation(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<DonationRequest>,
) -> Result<Json<Donation>> {
    let existing = load(&state, id).await?;
    check_donator(&user, &existing)?;

    let mut errors = FieldErrors::new();
    for (field, value) in [
        ("title", &body.title),
        ("description", &body.description),
        ("unit", &body.unit),
        ("pickup_location", &body.pickup_location),
    ] {
        if value.is_some() {
            errors.require(field, value.as_deref());
        }
    }
    let checked = body.check(&state, &mut errors).await?;
    errors.into_result()?;

    let image = body.store_image(&state).await?;

    let donation = state
        .db
        .update_donation(
            id,
            DonationUpdate {
                recipient_id: body.recipient,
                title: body.title,
                description: body.description,
                category: checked.category,
                quantity: body.quantity,
                unit: body.unit,
                status: checked.status,
                pickup_location: body.pickup_location,
                pickup_latitude: body.pickup_latitude,
                pickup_longitude: body.pickup_longitude,
                delivery_location: body.delivery_location,
                delivery_latitude: body.delivery_latitude,
                delivery_longitude: body.delivery_longitude,
                image: image.clone(),
                notes: body.notes,
            },
        )
        .await?
        .ok_or_else(AppError::not_found)?;

    if let (Some(_), Some(old)) = (image, existing.image) {
        state.media.remove(&old).await;
    }

    state.donation_cache.invalidate();
    tracing::info!(donation_id = id, user_id = user.id, "Donation updated");
    Ok(Json(donation))
}

async fn delete_donation(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    let existing = load(&state, id).await?;
    check_donator(&user, &existing)?;

    state.db.delete_donation(id).await?;
    if let Some(image) = existing.image {
        state.media.remove(&image).await;
    }

    state.donation_cache.invalidate();
    tracing::info!(donation_id = id, user_id = user.id, "Donation deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

/// Move a donation along its lifecycle and notify donation subscribers.
async fn update_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<StatusRequest>,
) -> Result<Json<Donation>> {
    let existing = load(&state, id).await?;

    let Some(raw) = non_blank(body.status) else {
        return Err(AppError::BadRequest("Status is required".to_string()));
    };
    let status: DonationStatus = raw.parse().map_err(|e: String| AppError::field("status", e))?;

    if existing.donator != user.id && existing.recipient != Some(user.id) {
        return Err(AppError::Forbidden(
            "You do not have permission to update this donation".to_string(),
        ));
    }

    let donation = state
        .db
        .update_donation_status(id, status, body.notes.unwrap_or_default(), user.id)
        .await?;

    state.donation_cache.invalidate();
    state.realtime.publish(
        Group::Donations,
        EventKind::DonationUpdate,
        json!({
            "donation_id": donation.id,
            "status": donation.status,
            "updated_by": user.id,
            "timestamp": donation.updated_at,
        }),
    );

    tracing::info!(donation_id = id, status = %status, user_id = user.id, "Donation status changed");
    Ok(Json(donation))
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    #[serde(default, deserialize_with = "flex::opt_i64")]
    recipient_id: Option<i64>,
}

async fn assign_recipient(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<AssignRequest>,
) -> Result<Json<Donation>> {
    let existing = load(&state, id).await?;
    if existing.donator != user.id && !user.is_staff {
        return Err(AppError::Forbidden(
            "Only the donator can assign recipients".to_string(),
        ));
    }

    let Some(recipient_id) = body.recipient_id else {
        return Err(AppError::field("recipient_id", "This field is required."));
    };
    let recipient = state
        .db
        .get_user(recipient_id)
        .await?
        .filter(|u| u.role == Role::Affected)
        .ok_or_else(|| {
            AppError::NotFound("Recipient not found or not an affected user".to_string())
        })?;

    let donation = state.db.assign_recipient(id, recipient.id).await?;
    state.donation_cache.invalidate();

    tracing::info!(donation_id = id, recipient_id, "Recipient assigned");
    Ok(Json(donation))
}

// ─── Tracking ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TrackingQuery {
    donation: Option<String>,
}

async fn list_tracking(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TrackingQuery>,
    page: PageRequest,
) -> Result<Json<Paginated<DonationTracking>>> {
    let donation_id = match non_blank(query.donation) {
        None => None,
        Some(raw) => Some(raw.parse::<i64>().map_err(|_| {
            AppError::field("donation", "Select a valid choice. That choice is not one of the available choices.")
        })?),
    };
    Ok(Json(state.db.list_tracking(donation_id, page).await?))
}

async fn get_tracking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<DonationTracking>> {
    let entry = state
        .db
        .get_tracking(id)
        .await?
        .ok_or_else(AppError::not_found)?;
    Ok(Json(entry))
}
