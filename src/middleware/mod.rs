// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (authentication, input sanitizing, security headers).

pub mod auth;
pub mod sanitize;
pub mod security;

pub use auth::{authenticate, require_auth, AuthUser};
