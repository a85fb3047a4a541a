// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is honored for local development.

use std::env;
use std::path::PathBuf;

/// Default PBKDF2 iteration count for newly hashed passwords.
pub const DEFAULT_PASSWORD_ITERATIONS: u32 = 600_000;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// SQLite database file
    pub database_path: PathBuf,
    /// Directory for uploaded photos
    pub media_root: PathBuf,
    /// Origins allowed by CORS in addition to localhost
    pub cors_allowed_origins: Vec<String>,
    /// JWT signing key for access and refresh tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// PBKDF2 iterations used when hashing new passwords
    pub password_hash_iterations: u32,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            port: 8000,
            database_path: PathBuf::from(":memory:"),
            media_root: PathBuf::from("media"),
            cors_allowed_origins: vec!["http://localhost:4200".to_string()],
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            password_hash_iterations: 1_000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let jwt_signing_key = env::var("JWT_SECRET_KEY")
            .or_else(|_| env::var("SECRET_KEY"))
            .map(|v| v.trim().to_string())
            .map_err(|_| ConfigError::Missing("JWT_SECRET_KEY"))?;
        if jwt_signing_key.is_empty() {
            return Err(ConfigError::Missing("JWT_SECRET_KEY"));
        }

        let password_hash_iterations = match env::var("PASSWORD_HASH_ITERATIONS") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid("PASSWORD_HASH_ITERATIONS", raw))?,
            Err(_) => DEFAULT_PASSWORD_ITERATIONS,
        };

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .unwrap_or(8000),
            database_path: env::var("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("db.sqlite3")),
            media_root: env::var("MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("media")),
            cors_allowed_origins: parse_csv(
                &env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:4200".to_string()),
            ),
            jwt_signing_key: jwt_signing_key.into_bytes(),
            password_hash_iterations,
        })
    }
}

/// Split a comma-separated list, dropping blanks.
fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
