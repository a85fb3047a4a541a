// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-field validation messages, keyed by field name.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message against a field.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Record "This field is required." when `value` is missing or blank.
    pub fn require(&mut self, field: &str, value: Option<&str>) {
        if value.map(str::trim).unwrap_or("").is_empty() {
            self.add(field, "This field is required.");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    /// `Ok(())` when no errors were recorded, otherwise a validation error.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        for (field, list) in errors.field_errors() {
            for error in list {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value ({}).", error.code));
                fields.add(field.as_ref(), message);
            }
        }
        fields
    }
}

/// Details returned with a 429 when a phone number is still cooling down.
#[derive(Debug, Clone, Serialize)]
pub struct Restriction {
    pub restricted: bool,
    pub next_allowed_at: DateTime<Utc>,
    pub time_remaining_seconds: i64,
    pub message: String,
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication credentials were not provided.")]
    Unauthorized,

    #[error("Given token not valid for any token type")]
    InvalidToken,

    #[error("{0}")]
    AuthenticationFailed(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(FieldErrors),

    #[error("You recently received a donation. Please wait before requesting help again.")]
    Cooldown(Restriction),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a single-field validation failure.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        AppError::Validation(errors)
    }

    /// The generic 404 used for missing resources.
    pub fn not_found() -> Self {
        AppError::NotFound("Not found.".to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    restriction: Option<Restriction>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, error, details, restriction) = match self {
            AppError::Unauthorized | AppError::InvalidToken | AppError::AuthenticationFailed(_) => {
                (StatusCode::UNAUTHORIZED, message, None, None)
            }
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, message, None, None),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, message, None, None),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, message, None, None),
            AppError::Validation(fields) => (StatusCode::BAD_REQUEST, message, Some(fields), None),
            AppError::Cooldown(restriction) => (
                StatusCode::TOO_MANY_REQUESTS,
                message,
                None,
                Some(restriction),
            ),
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                    None,
                    None,
                )
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error,
            details,
            restriction,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_flags_blank_values() {
        let mut errors = FieldErrors::new();
        errors.require("title", Some("   "));
        errors.require("unit", None);
        errors.require("description", Some("Rice"));

        assert!(errors.contains("title"));
        assert!(errors.contains("unit"));
        assert!(!errors.contains("description"));
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::field("quantity", "Quantity must be greater than 0")
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Forbidden("nope".into()).into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Database("locked".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
