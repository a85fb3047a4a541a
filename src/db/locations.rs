// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Registered-user location track.

use super::{fetch_all, fetch_page, tables, Conditions, Db};
use crate::error::AppError;
use crate::models::{full_name, Location, Role};
use crate::pagination::{PageRequest, Paginated};
use crate::time_utils::{self, round_coordinate};
use rusqlite::{params, OptionalExtension, Row};

const LOCATION_COLUMNS: &str = "l.id, l.user_id, u.email, u.first_name, u.last_name, \
     l.latitude, l.longitude, l.timestamp, l.is_current, l.accuracy";

fn location_from_row(row: &Row<'_>) -> rusqlite::Result<Location> {
    let first: String = row.get(3)?;
    let last: String = row.get(4)?;
    Ok(Location {
        id: row.get(0)?,
        user: row.get(1)?,
        user_email: row.get(2)?,
        user_name: full_name(&first, &last).unwrap_or_default(),
        latitude: row.get(5)?,
        longitude: row.get(6)?,
        timestamp: row.get(7)?,
        is_current: row.get(8)?,
        accuracy: row.get(9)?,
    })
}

fn from_clause() -> String {
    format!(
        "FROM {} l JOIN {} u ON u.id = l.user_id",
        tables::LOCATIONS,
        tables::USERS
    )
}

/// Only users who share their location are ever visible.
fn shared_only() -> Conditions {
    let mut conditions = Conditions::default();
    conditions.push_raw("u.is_location_shared = 1");
    conditions
}

impl Db {
    /// Shared locations, optionally for one user and/or current ones only.
    pub async fn list_locations(
        &self,
        user_id: Option<i64>,
        current_only: bool,
        page: PageRequest,
    ) -> Result<Paginated<Location>, AppError> {
        self.call(move |conn| {
            let mut conditions = shared_only();
            if let Some(user_id) = user_id {
                conditions.push("l.user_id = ?", user_id);
            }
            if current_only {
                conditions.push_raw("l.is_current = 1");
            }
            fetch_page(
                conn,
                LOCATION_COLUMNS,
                &from_clause(),
                &conditions,
                "l.timestamp DESC, l.id DESC",
                &page,
                location_from_row,
            )
        })
        .await
    }

    pub async fn get_shared_location(&self, id: i64) -> Result<Option<Location>, AppError> {
        self.call(move |conn| {
            let mut conditions = shared_only();
            conditions.push("l.id = ?", id);
            Ok(fetch_all(
                conn,
                LOCATION_COLUMNS,
                &from_clause(),
                &conditions,
                "l.id",
                location_from_row,
            )?
            .into_iter()
            .next())
        })
        .await
    }

    /// Record a new current position, demoting the user's previous ones.
    pub async fn record_location(
        &self,
        user_id: i64,
        latitude: f64,
        longitude: f64,
        accuracy: Option<f64>,
    ) -> Result<Location, AppError> {
        self.call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                &format!(
                    "UPDATE {} SET is_current = 0 WHERE user_id = ?1 AND is_current = 1",
                    tables::LOCATIONS
                ),
                params![user_id],
            )?;
            tx.execute(
                &format!(
                    "INSERT INTO {} (user_id, latitude, longitude, timestamp, is_current, accuracy) \
                     VALUES (?1, ?2, ?3, ?4, 1, ?5)",
                    tables::LOCATIONS
                ),
                params![
                    user_id,
                    round_coordinate(latitude, 6),
                    round_coordinate(longitude, 6),
                    time_utils::now(),
                    accuracy
                ],
            )?;
            let id = tx.last_insert_rowid();
            let location = tx
                .query_row(
                    &format!("SELECT {} {} WHERE l.id = ?1", LOCATION_COLUMNS, from_clause()),
                    params![id],
                    location_from_row,
                )
                .optional()?
                .ok_or_else(AppError::not_found)?;
            tx.commit()?;
            Ok(location)
        })
        .await
    }

    /// Current locations of affected users who share their location.
    pub async fn affected_user_locations(&self) -> Result<Vec<Location>, AppError> {
        self.call(|conn| {
            let mut conditions = shared_only();
            conditions.push("u.role = ?", Role::Affected.as_str().to_string());
            conditions.push_raw("l.is_current = 1");
            fetch_all(
                conn,
                LOCATION_COLUMNS,
                &from_clause(),
                &conditions,
                "l.timestamp DESC, l.id DESC",
                location_from_row,
            )
        })
        .await
    }
}
