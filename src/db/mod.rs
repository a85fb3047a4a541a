// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (SQLite).
//!
//! One connection lives behind a mutex; every operation runs on the
//! blocking thread pool through [`Db::call`].

mod anonymous;
mod donations;
mod emergency;
mod history;
mod locations;
pub mod migrations;
mod users;

pub use anonymous::{AnonymousLocationUpdate, NewAnonymousLocation};
pub use donations::{DonationFilter, DonationUpdate, NewDonation};
pub use emergency::{EmergencyFilter, EmergencyUpdate, NewEmergencyRequest};
pub use history::NewRating;
pub use migrations::{MigrationError, MigrationStatus};
pub use users::{NewUser, UserUpdate};

use crate::error::AppError;
use crate::pagination::{PageRequest, Paginated};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Table names as constants.
pub mod tables {
    pub const USERS: &str = "users";
    pub const LOCATIONS: &str = "locations";
    pub const DONATIONS: &str = "donations";
    pub const DONATION_TRACKING: &str = "donation_tracking";
    pub const EMERGENCY_REQUESTS: &str = "emergency_requests";
    pub const ANONYMOUS_LOCATIONS: &str = "anonymous_locations";
    pub const DONATORS_ON_THE_WAY: &str = "donators_on_the_way";
    pub const LOCATION_UPDATES: &str = "location_updates";
    pub const DONATION_HISTORY: &str = "donation_history";
    pub const DONATION_RATINGS: &str = "donation_ratings";
}

/// Timestamp as bound by rusqlite's chrono support, for dynamic parameter lists.
pub(crate) fn ts(value: DateTime<Utc>) -> Value {
    Value::Text(value.format("%F %T%.f%:z").to_string())
}

/// JSON document stored as text.
pub(crate) fn json(value: &serde_json::Value) -> Value {
    Value::Text(value.to_string())
}

/// Map a UNIQUE constraint violation to a field error, passing other errors through.
pub(crate) fn unique_violation(err: rusqlite::Error, field: &str, message: &str) -> AppError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            AppError::field(field, message)
        }
        _ => err.into(),
    }
}

/// Limit/offset window for a paginated list query.
#[derive(Debug, Clone, Copy)]
pub struct Window {
    pub limit: i64,
    pub offset: i64,
}

/// SQL `WHERE` clauses with their positional parameters.
#[derive(Debug, Default)]
pub(crate) struct Conditions {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl Conditions {
    pub(crate) fn push(&mut self, clause: &str, value: impl Into<Value>) {
        self.clauses.push(clause.to_string());
        self.params.push(value.into());
    }

    pub(crate) fn push_raw(&mut self, clause: &str) {
        self.clauses.push(clause.to_string());
    }

    pub(crate) fn sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub(crate) fn params(&self) -> &[Value] {
        &self.params
    }
}

/// Column assignments for a partial `UPDATE`.
#[derive(Debug, Default)]
pub(crate) struct Assignments {
    columns: Vec<String>,
    params: Vec<Value>,
}

impl Assignments {
    pub(crate) fn set(&mut self, column: &str, value: impl Into<Value>) {
        self.columns.push(format!("{} = ?", column));
        self.params.push(value.into());
    }

    pub(crate) fn set_opt<V: Into<Value>>(&mut self, column: &str, value: Option<V>) {
        if let Some(value) = value {
            self.set(column, value);
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Run `UPDATE table SET ... WHERE id = ?`, returning the number of rows changed.
    pub(crate) fn apply(mut self, conn: &Connection, table: &str, id: i64) -> rusqlite::Result<usize> {
        if self.columns.is_empty() {
            return Ok(0);
        }
        let sql = format!("UPDATE {} SET {} WHERE id = ?", table, self.columns.join(", "));
        self.params.push(Value::Integer(id));
        conn.execute(&sql, params_from_iter(self.params.iter()))
    }
}

/// Count and fetch one page of `SELECT <columns> <from> [WHERE ...] ORDER BY <order>`.
pub(crate) fn fetch_page<T, F>(
    conn: &Connection,
    columns: &str,
    from: &str,
    conditions: &Conditions,
    order: &str,
    page: &PageRequest,
    map: F,
) -> Result<Paginated<T>, AppError>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) {}{}", from, conditions.sql()),
        params_from_iter(conditions.params().iter()),
        |row| row.get(0),
    )?;
    let window = page.window(count)?;

    let sql = format!(
        "SELECT {} {}{} ORDER BY {} LIMIT ? OFFSET ?",
        columns,
        from,
        conditions.sql(),
        order
    );
    let mut params = conditions.params().to_vec();
    params.push(Value::Integer(window.limit));
    params.push(Value::Integer(window.offset));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(params.iter()), map)?
        .collect::<rusqlite::Result<Vec<T>>>()?;
    page.paginate(count, rows)
}

/// Fetch every row of `SELECT <columns> <from> [WHERE ...] ORDER BY <order>`.
pub(crate) fn fetch_all<T, F>(
    conn: &Connection,
    columns: &str,
    from: &str,
    conditions: &Conditions,
    order: &str,
    map: F,
) -> Result<Vec<T>, AppError>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let sql = format!(
        "SELECT {} {}{} ORDER BY {}",
        columns,
        from,
        conditions.sql(),
        order
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(conditions.params().iter()), map)?
        .collect::<rusqlite::Result<Vec<T>>>()?;
    Ok(rows)
}

/// SQLite database handle.
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    /// Open (or create) the database file at `path`.
    ///
    /// The special path `:memory:` opens a private in-memory database.
    pub fn open(path: &Path) -> Result<Self, AppError> {
        if path == Path::new(":memory:") {
            return Self::open_in_memory();
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::configure(&conn)?;

        tracing::info!(path = %path.display(), "Opened SQLite database");
        Ok(Self::wrap(conn))
    }

    /// Open an in-memory database (used by tests).
    pub fn open_in_memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        Ok(Self::wrap(conn))
    }

    fn configure(conn: &Connection) -> Result<(), AppError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(())
    }

    fn wrap(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run `f` with exclusive access to the connection on the blocking pool.
    pub async fn call<F, T>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Connection) -> Result<T, AppError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| AppError::Database("connection lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("database task failed: {}", e)))?
    }

    /// Apply all pending migrations, returning the names applied.
    pub async fn migrate(&self) -> Result<Vec<&'static str>, AppError> {
        self.call(|conn| Ok(migrations::run(conn)?)).await
    }

    /// Applied/pending state of every known migration.
    pub async fn migration_status(&self) -> Result<Vec<MigrationStatus>, AppError> {
        self.call(|conn| Ok(migrations::status(conn)?)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conditions_sql() {
        let mut conditions = Conditions::default();
        assert_eq!(conditions.sql(), "");

        conditions.push("d.status = ?", "pending".to_string());
        conditions.push_raw("u.is_active = 1");
        assert_eq!(conditions.sql(), " WHERE d.status = ? AND u.is_active = 1");
        assert_eq!(conditions.params().len(), 1);
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let db = Db::open_in_memory().unwrap();
        let enabled: i64 = db
            .call(|conn| Ok(conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(enabled, 1);
    }
}
