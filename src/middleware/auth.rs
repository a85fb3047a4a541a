// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT authentication middleware.
//!
//! [`authenticate`] runs on every request: a valid access token attaches an
//! [`AuthUser`], a missing one leaves the request anonymous and a bad one is
//! rejected outright. [`require_auth`] guards the protected routes.

use crate::error::AppError;
use crate::models::{full_name, Role, User};
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Cookie that may carry the access token for browser clients.
pub const ACCESS_COOKIE: &str = "relief_access";

const ACCESS_LIFETIME_SECS: i64 = 24 * 60 * 60;
const REFRESH_LIFETIME_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    fn lifetime_secs(self) -> i64 {
        match self {
            TokenType::Access => ACCESS_LIFETIME_SECS,
            TokenType::Refresh => REFRESH_LIFETIME_SECS,
        }
    }
}

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub token_type: TokenType,
}

/// Access/refresh pair returned by the login endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TokenPair {
    pub refresh: String,
    pub access: String,
}

/// Authenticated user extracted from JWT.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_staff: bool,
}

impl AuthUser {
    /// Local part of the email address.
    pub fn username(&self) -> &str {
        self.email.split('@').next().unwrap_or_default()
    }

    /// Full name, falling back to the username.
    pub fn display_name(&self) -> String {
        full_name(&self.first_name, &self.last_name).unwrap_or_else(|| self.username().to_string())
    }
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
            is_staff: user.is_staff,
        }
    }
}

/// Sign a single token of the given type.
pub fn create_token(
    user_id: i64,
    token_type: TokenType,
    signing_key: &[u8],
) -> anyhow::Result<String> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + token_type.lifetime_secs(),
        token_type,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

/// Sign a fresh access/refresh pair for `user_id`.
pub fn create_token_pair(user_id: i64, signing_key: &[u8]) -> anyhow::Result<TokenPair> {
    Ok(TokenPair {
        refresh: create_token(user_id, TokenType::Refresh, signing_key)?,
        access: create_token(user_id, TokenType::Access, signing_key)?,
    })
}

/// Verify a token and return the user id it was issued for.
pub fn decode_token(
    token: &str,
    signing_key: &[u8],
    expected: TokenType,
) -> Result<i64, AppError> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);

    let claims = decode::<Claims>(token, &key, &validation)
        .map_err(|e| {
            tracing::debug!(error = %e, "Rejected JWT");
            AppError::InvalidToken
        })?
        .claims;

    if claims.token_type != expected {
        return Err(AppError::InvalidToken);
    }
    claims.sub.parse().map_err(|_| AppError::InvalidToken)
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
}

/// Attach the caller's identity when the request carries an access token.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Header first, then cookie
    let token = bearer_token(&request)
        .or_else(|| jar.get(ACCESS_COOKIE).map(|c| c.value().to_string()));

    if let Some(token) = token {
        let user_id = decode_token(&token, &state.config.jwt_signing_key, TokenType::Access)?;
        let user = state
            .db
            .get_user(user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AppError::InvalidToken)?;
        request.extensions_mut().insert(AuthUser::from(&user));
    }

    Ok(next.run(request).await)
}

/// Middleware that rejects anonymous requests.
pub async fn require_auth(request: Request, next: Next) -> Result<Response, AppError> {
    if request.extensions().get::<AuthUser>().is_none() {
        return Err(AppError::Unauthorized);
    }
    Ok(next.run(request).await)
}
