// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP route handlers.

pub mod anonymous;
pub mod auth;
pub mod donations;
pub mod emergency;
pub mod history;
pub mod locations;
pub mod tracking;
pub mod users;
pub mod ws;

use crate::error::{AppError, FieldErrors, Result};
use crate::middleware::{authenticate, require_auth, sanitize};
use crate::services::MediaError;
use crate::AppState;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderMap, HeaderValue, Method};
use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct HealthResponse {
    pub status: String,
    pub build_id: String,
}

/// Health check response
async fn health_check() -> Json<HealthResponse> {
    let build_id = option_env!("BUILD_ID").unwrap_or("unknown").to_string();
    Json(HealthResponse {
        status: "ok".to_string(),
        build_id,
    })
}

/// Build the complete router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS: configured origins plus localhost for development
    let allowed = state.config.cors_allowed_origins.clone();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _request_parts: &axum::http::request::Parts| {
                let origin_str = origin.to_str().unwrap_or("");
                allowed.iter().any(|o| o == origin_str)
                    || origin_str.starts_with("http://localhost")
                    || origin_str.starts_with("http://127.0.0.1")
            },
        ))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    // Public routes (identity optional)
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .merge(auth::routes())
        .merge(anonymous::routes())
        .merge(history::routes())
        .merge(ws::routes());

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .merge(auth::protected_routes())
        .merge(users::routes())
        .merge(locations::routes())
        .merge(donations::routes())
        .merge(emergency::routes())
        .merge(tracking::routes())
        .route_layer(middleware::from_fn(require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service("/media", ServeDir::new(state.config.media_root.clone()))
        .layer(middleware::from_fn(sanitize::sanitize_json_body))
        .layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .layer(DefaultBodyLimit::max(sanitize::MAX_BODY_BYTES))
        .layer(middleware::from_fn(
            crate::middleware::security::add_security_headers,
        ))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

// ─── Shared handler helpers ──────────────────────────────────

/// Cache-Control for responses that must never be reused.
pub(crate) const NO_STORE: &str = "no-cache, no-store, must-revalidate";

/// `NO_STORE` that also expires anything a proxy kept anyway.
pub(crate) const NO_STORE_EXPIRED: &str = "no-cache, no-store, must-revalidate, max-age=0";

/// Headers that keep clients and proxies from caching a response.
pub(crate) fn no_cache_headers(cache_control: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    headers
}

/// Store an uploaded image, reporting bad payloads against `field`.
pub(crate) async fn store_image(
    state: &AppState,
    kind: &str,
    field: &str,
    payload: &str,
) -> Result<String> {
    state
        .media
        .save_image(kind, payload)
        .await
        .map_err(|e| match e {
            MediaError::NotAnImage | MediaError::InvalidEncoding | MediaError::TooLarge => {
                AppError::field(field, e.to_string())
            }
            MediaError::Io(_) | MediaError::Random => AppError::Internal(e.into()),
        })
}

/// Parse an optional choice field, recording an error when it is not valid.
pub(crate) fn parse_choice<T>(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&str>,
) -> Option<T>
where
    T: FromStr<Err = String>,
{
    match value.map(str::parse::<T>) {
        Some(Ok(choice)) => Some(choice),
        Some(Err(message)) => {
            errors.add(field, message);
            None
        }
        None => None,
    }
}

/// Range checks for an optional latitude/longitude pair.
pub(crate) fn check_coordinates(
    errors: &mut FieldErrors,
    (lat_field, latitude): (&str, Option<f64>),
    (lon_field, longitude): (&str, Option<f64>),
) {
    if latitude.is_some_and(|v| !(-90.0..=90.0).contains(&v)) {
        errors.add(lat_field, "Latitude must be between -90 and 90");
    }
    if longitude.is_some_and(|v| !(-180.0..=180.0).contains(&v)) {
        errors.add(lon_field, "Longitude must be between -180 and 180");
    }
}

/// Trim text input, treating blank as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `true` for the usual spellings of a true query flag.
pub(crate) fn flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("true" | "1" | "yes")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    #[test]
    fn test_parse_choice() {
        let mut errors = FieldErrors::new();
        assert_eq!(
            parse_choice::<Category>(&mut errors, "category", Some("water")),
            Some(Category::Water)
        );
        assert_eq!(parse_choice::<Category>(&mut errors, "category", None), None);
        assert!(errors.is_empty());

        assert_eq!(
            parse_choice::<Category>(&mut errors, "category", Some("gold")),
            None
        );
        assert!(errors.contains("category"));
    }

    #[test]
    fn test_check_coordinates() {
        let mut errors = FieldErrors::new();
        check_coordinates(&mut errors, ("latitude", Some(14.6)), ("longitude", Some(121.0)));
        assert!(errors.is_empty());

        check_coordinates(&mut errors, ("latitude", Some(91.0)), ("longitude", Some(-181.0)));
        assert!(errors.contains("latitude"));
        assert!(errors.contains("longitude"));
    }

    #[test]
    fn test_flag() {
        assert!(flag(Some("true")));
        assert!(flag(Some("True")));
        assert!(!flag(Some("false")));
        assert!(!flag(None));
    }
}
