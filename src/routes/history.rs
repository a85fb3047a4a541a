// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! QR donation history, acknowledgments, ranking and ratings.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::non_blank;
use crate::db::NewRating;
use crate::error::{AppError, Result};
use crate::extract::{flex, JsonBody};
use crate::middleware::AuthUser;
use crate::models::{
    Acknowledgment, ContributorRanking, DonationHistory, DonationRating, Role, SuppliesConfirmed,
};
use crate::pagination::{PageRequest, Paginated};
use crate::AppState;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/donation-history/", get(list_history))
        .route("/api/donation-history/my_donations/", get(my_donations))
        .route(
            "/api/donation-history/donator_acknowledgments/",
            get(donator_acknowledgments),
        )
        .route(
            "/api/donation-history/contributors_ranking/",
            get(contributors_ranking),
        )
        .route("/api/donation-history/{id}/", get(get_history))
        .route(
            "/api/donation-ratings/",
            get(list_ratings).post(create_rating),
        )
        .route("/api/donation-ratings/{id}/", get(get_rating))
}

fn authenticated(user: Option<Extension<AuthUser>>) -> Result<AuthUser> {
    user.map(|Extension(u)| u).ok_or(AppError::Unauthorized)
}

// ─── History ─────────────────────────────────────────────────

async fn list_history(
    State(state): State<Arc<AppState>>,
    page: PageRequest,
) -> Result<Json<Paginated<DonationHistory>>> {
    Ok(Json(state.db.list_donation_history(page).await?))
}

async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<DonationHistory>> {
    let history = state
        .db
        .get_donation_history(id)
        .await?
        .ok_or_else(AppError::not_found)?;
    Ok(Json(history))
}

/// QR-confirmed donations made by the calling donator.
async fn my_donations(
    State(state): State<Arc<AppState>>,
    user: Option<Extension<AuthUser>>,
) -> Result<Json<Vec<DonationHistory>>> {
    let user = authenticated(user)?;
    if user.role != Role::Donator {
        return Err(AppError::Forbidden(
            "Only donators can view their donation history".to_string(),
        ));
    }
    Ok(Json(state.db.donations_by_donator(user.id).await?))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AcknowledgmentsResponse {
    pub total_donations: usize,
    pub acknowledgments: Vec<Acknowledgment>,
}

async fn donator_acknowledgments(
    State(state): State<Arc<AppState>>,
    user: Option<Extension<AuthUser>>,
) -> Result<Json<AcknowledgmentsResponse>> {
    let user = authenticated(user)?;
    let acknowledgments = state.db.acknowledgments(user.id).await?;
    Ok(Json(AcknowledgmentsResponse {
        total_donations: acknowledgments.len(),
        acknowledgments,
    }))
}

async fn contributors_ranking(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ContributorRanking>>> {
    Ok(Json(state.db.contributors_ranking().await?))
}

// ─── Ratings ─────────────────────────────────────────────────

async fn list_ratings(
    State(state): State<Arc<AppState>>,
    page: PageRequest,
) -> Result<Json<Paginated<DonationRating>>> {
    Ok(Json(state.db.list_ratings(page).await?))
}

async fn get_rating(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<DonationRating>> {
    let rating = state
        .db
        .get_rating(id)
        .await?
        .ok_or_else(AppError::not_found)?;
    Ok(Json(rating))
}

#[derive(Debug, Deserialize)]
pub struct CreateRatingRequest {
    #[serde(default, deserialize_with = "flex::opt_i64")]
    donation_history_id: Option<i64>,
    #[serde(default, deserialize_with = "flex::opt_string")]
    session_id: Option<String>,
    #[serde(default, deserialize_with = "flex::opt_i64")]
    rating: Option<i64>,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    supplies_confirmed: Option<SuppliesConfirmed>,
}

/// An affected person rates a donation and confirms what arrived.
async fn create_rating(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<CreateRatingRequest>,
) -> Result<(StatusCode, Json<DonationRating>)> {
    let (Some(donation_history_id), Some(session_id)) =
        (body.donation_history_id, non_blank(body.session_id))
    else {
        return Err(AppError::BadRequest(
            "donation_history_id and session_id are required".to_string(),
        ));
    };
    if body.rating.is_some_and(|r| !(1..=5).contains(&r)) {
        return Err(AppError::field(
            "rating",
            "Rating must be between 1 and 5 stars.",
        ));
    }

    let rating = state
        .db
        .create_rating(NewRating {
            donation_history_id,
            rating: body.rating,
            comment: body.comment.unwrap_or_default(),
            supplies_confirmed: body.supplies_confirmed,
            session_id,
        })
        .await?;

    tracing::info!(
        rating_id = rating.id,
        donation_history_id,
        stars = ?rating.rating,
        "Donation rated"
    );
    Ok((StatusCode::CREATED, Json(rating)))
}
