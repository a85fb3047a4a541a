// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Relief donation backend.
//!
//! This crate provides the JSON API that connects donators of relief goods
//! with affected people: donations, shared locations, emergency requests,
//! QR-confirmed hand-overs and real-time map updates.

pub mod admin;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Db;
use services::{MediaStore, PasswordHasher, RealtimeHub, ResponseCache};
use std::time::Duration;

/// How long a cached donation list stays fresh.
pub const DONATION_CACHE_TTL: Duration = Duration::from_secs(120);

/// Upper bound on cached donation list responses.
pub const DONATION_CACHE_ENTRIES: usize = 1000;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Db,
    pub passwords: PasswordHasher,
    pub media: MediaStore,
    pub realtime: RealtimeHub,
    pub donation_cache: ResponseCache,
}

impl AppState {
    /// Wire up the services around an opened database.
    pub fn new(config: Config, db: Db) -> Self {
        Self {
            passwords: PasswordHasher::new(config.password_hash_iterations),
            media: MediaStore::new(config.media_root.clone()),
            realtime: RealtimeHub::new(),
            donation_cache: ResponseCache::new(DONATION_CACHE_TTL, DONATION_CACHE_ENTRIES),
            config,
            db,
        }
    }
}
