// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Versioned schema migrations.
//!
//! Each migration runs in its own transaction and is recorded in
//! `schema_migrations`, so running the set twice is a no-op.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;

/// A named schema change.
pub struct Migration {
    pub name: &'static str,
    pub sql: &'static str,
}

/// All migrations, in application order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "0001_initial",
        sql: r#"
CREATE TABLE users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT,
    first_name TEXT NOT NULL DEFAULT '',
    last_name TEXT NOT NULL DEFAULT '',
    role TEXT NOT NULL DEFAULT 'donator',
    phone_number TEXT NOT NULL DEFAULT '',
    profile_picture TEXT,
    address TEXT NOT NULL DEFAULT '',
    is_location_shared INTEGER NOT NULL DEFAULT 0,
    is_staff INTEGER NOT NULL DEFAULT 0,
    is_superuser INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    last_login TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX idx_users_role ON users(role);
CREATE INDEX idx_users_phone_number ON users(phone_number);
CREATE INDEX idx_users_location_shared ON users(is_location_shared);

CREATE TABLE locations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    timestamp TEXT NOT NULL,
    is_current INTEGER NOT NULL DEFAULT 1,
    accuracy REAL
);
CREATE INDEX idx_locations_user_current ON locations(user_id, is_current);
CREATE INDEX idx_locations_timestamp ON locations(timestamp);

CREATE TABLE donations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    donator_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    recipient_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    category TEXT NOT NULL,
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    unit TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    pickup_location TEXT NOT NULL,
    pickup_latitude REAL,
    pickup_longitude REAL,
    delivery_location TEXT NOT NULL DEFAULT '',
    delivery_latitude REAL,
    delivery_longitude REAL,
    image TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    delivered_at TEXT,
    notes TEXT NOT NULL DEFAULT ''
);
CREATE INDEX idx_donations_status ON donations(status, created_at);
CREATE INDEX idx_donations_donator ON donations(donator_id, created_at);
CREATE INDEX idx_donations_recipient ON donations(recipient_id, created_at);

CREATE TABLE donation_tracking (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    donation_id INTEGER NOT NULL REFERENCES donations(id) ON DELETE CASCADE,
    status TEXT NOT NULL,
    notes TEXT NOT NULL DEFAULT '',
    latitude REAL,
    longitude REAL,
    updated_by_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
    timestamp TEXT NOT NULL
);
CREATE INDEX idx_donation_tracking_donation ON donation_tracking(donation_id);

CREATE TABLE emergency_requests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    requester_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    category TEXT NOT NULL,
    priority TEXT NOT NULL DEFAULT 'medium',
    status TEXT NOT NULL DEFAULT 'open',
    quantity_needed INTEGER NOT NULL CHECK (quantity_needed > 0),
    unit TEXT NOT NULL,
    location TEXT NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    people_affected INTEGER NOT NULL DEFAULT 1 CHECK (people_affected > 0),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    fulfilled_at TEXT
);
CREATE INDEX idx_emergency_requests_status ON emergency_requests(status);
"#,
    },
    Migration {
        name: "0002_anonymous_locations",
        sql: r#"
CREATE TABLE anonymous_locations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    phone TEXT NOT NULL DEFAULT '',
    facebook TEXT NOT NULL DEFAULT '',
    email TEXT NOT NULL DEFAULT '',
    notes TEXT NOT NULL DEFAULT '',
    photo TEXT,
    supply_needs TEXT NOT NULL DEFAULT '{}',
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    accuracy REAL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    last_seen TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    session_id TEXT NOT NULL DEFAULT '',
    qr_code TEXT UNIQUE,
    donation_received INTEGER NOT NULL DEFAULT 0,
    donated_by_user_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
    donation_timestamp TEXT,
    next_request_allowed_at TEXT
);
CREATE INDEX idx_anonymous_locations_phone ON anonymous_locations(phone);
CREATE INDEX idx_anonymous_locations_session ON anonymous_locations(session_id);
CREATE INDEX idx_anonymous_locations_active ON anonymous_locations(is_active, last_seen);

CREATE TABLE donators_on_the_way (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    location_id INTEGER NOT NULL REFERENCES anonymous_locations(id) ON DELETE CASCADE,
    donator_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    marked_at TEXT NOT NULL,
    arrived INTEGER NOT NULL DEFAULT 0,
    is_tracking INTEGER NOT NULL DEFAULT 0,
    last_location_update TEXT,
    UNIQUE (location_id, donator_id)
);

CREATE TABLE location_updates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    donator_on_the_way_id INTEGER NOT NULL REFERENCES donators_on_the_way(id) ON DELETE CASCADE,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    accuracy REAL NOT NULL,
    timestamp TEXT NOT NULL
);
CREATE INDEX idx_location_updates_entry ON location_updates(donator_on_the_way_id, timestamp);
"#,
    },
    Migration {
        name: "0003_donation_history",
        sql: r#"
CREATE TABLE donation_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    donator_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    affected_first_name TEXT NOT NULL,
    affected_last_name TEXT NOT NULL,
    affected_phone TEXT NOT NULL DEFAULT '',
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    supply_needs_fulfilled TEXT NOT NULL DEFAULT '{}',
    qr_code TEXT NOT NULL,
    donated_at TEXT NOT NULL,
    notes TEXT NOT NULL DEFAULT ''
);
CREATE INDEX idx_donation_history_donator ON donation_history(donator_id, donated_at);

CREATE TABLE donation_ratings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    donation_history_id INTEGER NOT NULL UNIQUE
        REFERENCES donation_history(id) ON DELETE CASCADE,
    rating INTEGER CHECK (rating IS NULL OR rating BETWEEN 1 AND 5),
    comment TEXT NOT NULL DEFAULT '',
    supplies_confirmed TEXT NOT NULL DEFAULT '{}',
    rated_at TEXT NOT NULL,
    session_id TEXT NOT NULL DEFAULT ''
);
"#,
    },
];

/// Migration errors
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Migration {name} failed: {source}")]
    Failed {
        name: &'static str,
        source: rusqlite::Error,
    },

    #[error("Migration bookkeeping failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl From<MigrationError> for AppError {
    fn from(err: MigrationError) -> Self {
        AppError::Database(err.to_string())
    }
}

/// Applied/pending state of one migration.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    pub name: &'static str,
    pub applied_at: Option<DateTime<Utc>>,
}

fn ensure_table(conn: &Connection) -> Result<(), MigrationError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
    )?;
    Ok(())
}

/// Applied/pending state of every known migration.
pub fn status(conn: &Connection) -> Result<Vec<MigrationStatus>, MigrationError> {
    ensure_table(conn)?;

    let mut stmt = conn.prepare("SELECT applied_at FROM schema_migrations WHERE name = ?1")?;
    let mut out = Vec::with_capacity(MIGRATIONS.len());
    for migration in MIGRATIONS {
        let applied_at = stmt
            .query_row(params![migration.name], |row| row.get(0))
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        out.push(MigrationStatus {
            name: migration.name,
            applied_at,
        });
    }
    Ok(out)
}

/// Names of migrations not yet applied.
pub fn pending(conn: &Connection) -> Result<Vec<&'static str>, MigrationError> {
    Ok(status(conn)?
        .into_iter()
        .filter(|s| s.applied_at.is_none())
        .map(|s| s.name)
        .collect())
}

/// Apply pending migrations in order.
pub fn run(conn: &mut Connection) -> Result<Vec<&'static str>, MigrationError> {
    let pending = pending(conn)?;
    let mut applied = Vec::with_capacity(pending.len());

    for migration in MIGRATIONS.iter().filter(|m| pending.contains(&m.name)) {
        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)
            .map_err(|source| MigrationError::Failed {
                name: migration.name,
                source,
            })?;
        tx.execute(
            "INSERT INTO schema_migrations (name, applied_at) VALUES (?1, ?2)",
            params![migration.name, crate::time_utils::now()],
        )?;
        tx.commit()?;

        tracing::info!(migration = migration.name, "Applied migration");
        applied.push(migration.name);
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();

        let first = run(&mut conn).unwrap();
        assert_eq!(first.len(), MIGRATIONS.len());

        let second = run(&mut conn).unwrap();
        assert!(second.is_empty());
        assert!(pending(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_status_reports_pending() {
        let conn = Connection::open_in_memory().unwrap();
        let status = status(&conn).unwrap();
        assert_eq!(status.len(), MIGRATIONS.len());
        assert!(status.iter().all(|s| s.applied_at.is_none()));
    }

    #[test]
    fn test_failed_migration_rolls_back() {
        let mut conn = Connection::open_in_memory().unwrap();
        // A pre-existing table makes the first migration fail part way through.
        conn.execute_batch("CREATE TABLE donations (id INTEGER)").unwrap();

        let err = run(&mut conn).unwrap_err();
        assert!(matches!(err, MigrationError::Failed { name: "0001_initial", .. }));

        let users: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'users'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(users, 0);
    }
}
