// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Emergency requests raised by affected users.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use super::{check_coordinates, flag, non_blank, parse_choice};
use crate::db::{EmergencyFilter, EmergencyUpdate, NewEmergencyRequest};
use crate::error::{AppError, FieldErrors, Result};
use crate::extract::{flex, JsonBody};
use crate::middleware::AuthUser;
use crate::models::{Category, EmergencyRequest, Priority, RequestStatus, Role};
use crate::pagination::{PageRequest, Paginated};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/emergency-requests/",
            get(list_requests).post(create_request),
        )
        .route(
            "/api/emergency-requests/{id}/",
            get(get_request).patch(update_request).delete(delete_request),
        )
        .route(
            "/api/emergency-requests/{id}/update_status/",
            post(update_status),
        )
}

#[derive(Debug, Deserialize)]
pub struct EmergencyQuery {
    status: Option<String>,
    priority: Option<String>,
    category: Option<String>,
    my_requests: Option<String>,
}

async fn list_requests(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<EmergencyQuery>,
    page: PageRequest,
) -> Result<Json<Paginated<EmergencyRequest>>> {
    let filter = EmergencyFilter {
        status: non_blank(query.status),
        priority: non_blank(query.priority),
        category: non_blank(query.category),
        requester_id: flag(query.my_requests.as_deref()).then_some(user.id),
    };
    Ok(Json(state.db.list_emergency_requests(filter, page).await?))
}

async fn load(state: &AppState, id: i64) -> Result<EmergencyRequest> {
    state
        .db
        .get_emergency_request(id)
        .await?
        .ok_or_else(AppError::not_found)
}

async fn get_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<EmergencyRequest>> {
    Ok(Json(load(&state, id).await?))
}

fn check_requester(user: &AuthUser, request: &EmergencyRequest) -> Result<()> {
    if request.requester == user.id || user.is_staff {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You do not have permission to perform this action.".to_string(),
        ))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct EmergencyRequestBody {
    #[serde(default)]
    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default, deserialize_with = "flex::opt_i64")]
    quantity_needed: Option<i64>,
    #[serde(default)]
    #[validate(length(max = 50, message = "Ensure this field has no more than 50 characters."))]
    unit: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default, deserialize_with = "flex::opt_f64")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "flex::opt_f64")]
    longitude: Option<f64>,
    #[serde(default, deserialize_with = "flex::opt_i64")]
    people_affected: Option<i64>,
}

struct Choices {
    category: Option<Category>,
    priority: Option<Priority>,
    status: Option<RequestStatus>,
}

impl EmergencyRequestBody {
    fn check(&self, errors: &mut FieldErrors) -> Choices {
        if let Err(e) = self.validate() {
            errors.merge(FieldErrors::from(e));
        }
        if self.quantity_needed.is_some_and(|q| q <= 0) {
            errors.add("quantity_needed", "Quantity must be greater than 0");
        }
        if self.people_affected.is_some_and(|p| p <= 0) {
            errors.add("people_affected", "People affected must be greater than 0");
        }
        check_coordinates(
            errors,
            ("latitude", self.latitude),
            ("longitude", self.longitude),
        );
        Choices {
            category: parse_choice(errors, "category", self.category.as_deref()),
            priority: parse_choice(errors, "priority", self.priority.as_deref()),
            status: parse_choice(errors, "status", self.status.as_deref()),
        }
    }
}

async fn create_request(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    JsonBody(body): JsonBody<EmergencyRequestBody>,
) -> Result<(StatusCode, Json<EmergencyRequest>)> {
    if user.role != Role::Affected {
        return Err(AppError::Forbidden(
            "Only affected users can create emergency requests".to_string(),
        ));
    }

    let mut errors = FieldErrors::new();
    for (field, value) in [
        ("title", &body.title),
        ("description", &body.description),
        ("category", &body.category),
        ("unit", &body.unit),
        ("location", &body.location),
    ] {
        errors.require(field, value.as_deref());
    }
    for (field, missing) in [
        ("quantity_needed", body.quantity_needed.is_none()),
        ("latitude", body.latitude.is_none()),
        ("longitude", body.longitude.is_none()),
    ] {
        if missing {
            errors.add(field, "This field is required.");
        }
    }
    let choices = body.check(&mut errors);
    errors.into_result()?;

    let (Some(category), Some(quantity_needed), Some(latitude), Some(longitude)) = (
        choices.category,
        body.quantity_needed,
        body.latitude,
        body.longitude,
    ) else {
        return Err(AppError::field("category", "This field is required."));
    };

    let request = state
        .db
        .create_emergency_request(NewEmergencyRequest {
            requester_id: user.id,
            title: body.title.unwrap_or_default(),
            description: body.description.unwrap_or_default(),
            category,
            priority: choices.priority.unwrap_or(Priority::Medium),
            status: choices.status.unwrap_or(RequestStatus::Open),
            quantity_needed,
            unit: body.unit.unwrap_or_default(),
            location: body.location.unwrap_or_default(),
            latitude,
            longitude,
            people_affected: body.people_affected.unwrap_or(1),
        })
        .await?;

    tracing::info!(
        request_id = request.id,
        requester_id = user.id,
        priority = %request.priority,
        "Emergency request created"
    );
    Ok((StatusCode::CREATED, Json(request)))
}

async fn update_request(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<EmergencyRequestBody>,
) -> Result<Json<EmergencyRequest>> {
    let existing = load(&state, id).await?;
    check_requester(&user, &existing)?;

    let mut errors = FieldErrors::new();
    for (field, value) in [
        ("title", &body.title),
        ("description", &body.description),
        ("unit", &body.unit),
        ("location", &body.location),
    ] {
        if value.is_some() {
            errors.require(field, value.as_deref());
        }
    }
    let choices = body.check(&mut errors);
    errors.into_result()?;

    let request = state
        .db
        .update_emergency_request(
            id,
            EmergencyUpdate {
                title: body.title,
                description: body.description,
                category: choices.category,
                priority: choices.priority,
                status: choices.status,
                quantity_needed: body.quantity_needed,
                unit: body.unit,
                location: body.location,
                latitude: body.latitude,
                longitude: body.longitude,
                people_affected: body.people_affected,
            },
        )
        .await?
        .ok_or_else(AppError::not_found)?;

    tracing::info!(request_id = id, user_id = user.id, "Emergency request updated");
    Ok(Json(request))
}

async fn delete_request(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    let existing = load(&state, id).await?;
    check_requester(&user, &existing)?;

    state.db.delete_emergency_request(id).await?;
    tracing::info!(request_id = id, user_id = user.id, "Emergency request deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    #[serde(default)]
    status: Option<String>,
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<StatusRequest>,
) -> Result<Json<EmergencyRequest>> {
    load(&state, id).await?;

    let Some(raw) = non_blank(body.status) else {
        return Err(AppError::BadRequest("Status is required".to_string()));
    };
    let status: RequestStatus = raw.parse().map_err(|e: String| AppError::field("status", e))?;

    let request = state
        .db
        .update_emergency_request(
            id,
            EmergencyUpdate {
                status: Some(status),
                ..Default::default()
            },
        )
        .await?
        .ok_or_else(AppError::not_found)?;

    tracing::info!(request_id = id, status = %status, user_id = user.id, "Emergency status changed");
    Ok(Json(request))
}
