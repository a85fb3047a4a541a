// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Anonymous locations, donators on the way and QR confirmation.

use super::history::load_history;
use super::{fetch_all, fetch_page, json, tables, ts, Assignments, Conditions, Db};
use crate::error::AppError;
use crate::models::anonymous::{next_request_allowed_at, VISIBILITY_HOURS};
use crate::models::{
    full_name, AnonymousLocation, DonationHistory, DonatorOnTheWay, OnTheWaySummary,
};
use crate::pagination::{PageRequest, Paginated};
use crate::time_utils::{self, round_coordinate};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;

const LOCATION_COLUMNS: &str = "a.id, a.first_name, a.last_name, a.phone, a.facebook, a.email, \
     a.notes, a.photo, a.supply_needs, a.latitude, a.longitude, a.accuracy, a.session_id, \
     a.created_at, a.updated_at, a.last_seen, a.is_active, a.qr_code, a.donation_received, \
     a.donated_by_user_id, d.first_name, d.last_name, a.donation_timestamp, \
     a.next_request_allowed_at";

const LOCATION_ORDER: &str = "a.last_seen DESC, a.id DESC";

const ON_THE_WAY_COLUMNS: &str =
    "id, location_id, donator_id, marked_at, arrived, is_tracking, last_location_update";

fn location_from_row(row: &Row<'_>) -> rusqlite::Result<AnonymousLocation> {
    let donated_by_user: Option<i64> = row.get(19)?;
    let donor_first: Option<String> = row.get(20)?;
    let donor_last: Option<String> = row.get(21)?;
    Ok(AnonymousLocation {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        phone: row.get(3)?,
        facebook: row.get(4)?,
        email: row.get(5)?,
        notes: row.get(6)?,
        photo: row.get(7)?,
        supply_needs: row.get(8)?,
        latitude: row.get(9)?,
        longitude: row.get(10)?,
        accuracy: row.get(11)?,
        session_id: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
        last_seen: row.get(15)?,
        is_active: row.get(16)?,
        qr_code: row.get(17)?,
        donation_received: row.get(18)?,
        donated_by_user,
        donated_by_user_name: donated_by_user.map(|_| {
            full_name(
                donor_first.as_deref().unwrap_or_default(),
                donor_last.as_deref().unwrap_or_default(),
            )
            .unwrap_or_default()
        }),
        donation_timestamp: row.get(22)?,
        next_request_allowed_at: row.get(23)?,
        donators_on_the_way: Vec::new(),
    })
}

fn on_the_way_from_row(row: &Row<'_>) -> rusqlite::Result<DonatorOnTheWay> {
    Ok(DonatorOnTheWay {
        id: row.get(0)?,
        location_id: row.get(1)?,
        donator_id: row.get(2)?,
        marked_at: row.get(3)?,
        arrived: row.get(4)?,
        is_tracking: row.get(5)?,
        last_location_update: row.get(6)?,
    })
}

fn location_from() -> String {
    format!(
        "FROM {} a LEFT JOIN {} d ON d.id = a.donated_by_user_id",
        tables::ANONYMOUS_LOCATIONS,
        tables::USERS
    )
}

/// Active and seen recently enough to be listed.
fn visible(now: DateTime<Utc>) -> Conditions {
    let mut conditions = Conditions::default();
    conditions.push_raw("a.is_active = 1");
    conditions.push("a.last_seen >= ?", ts(now - Duration::hours(VISIBILITY_HOURS)));
    conditions
}

/// Fill in the donators still heading to `location`.
fn attach_on_the_way(conn: &Connection, location: &mut AnonymousLocation) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT u.id, u.first_name, u.last_name, u.email, o.marked_at \
         FROM {} o JOIN {} u ON u.id = o.donator_id \
         WHERE o.location_id = ?1 AND o.arrived = 0 ORDER BY o.marked_at, o.id",
        tables::DONATORS_ON_THE_WAY,
        tables::USERS
    ))?;
    location.donators_on_the_way = stmt
        .query_map(params![location.id], |row| {
            let first: String = row.get(1)?;
            let last: String = row.get(2)?;
            Ok(OnTheWaySummary {
                id: row.get(0)?,
                name: full_name(&first, &last).unwrap_or_default(),
                email: row.get(3)?,
                marked_at: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(())
}

fn load_location(conn: &Connection, id: i64) -> Result<Option<AnonymousLocation>, AppError> {
    let location = conn
        .query_row(
            &format!("SELECT {} {} WHERE a.id = ?1", LOCATION_COLUMNS, location_from()),
            params![id],
            location_from_row,
        )
        .optional()?;
    match location {
        Some(mut location) => {
            attach_on_the_way(conn, &mut location)?;
            Ok(Some(location))
        }
        None => Ok(None),
    }
}

fn load_on_the_way(
    conn: &Connection,
    location_id: i64,
    donator_id: i64,
) -> rusqlite::Result<Option<DonatorOnTheWay>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM {} WHERE location_id = ?1 AND donator_id = ?2",
            ON_THE_WAY_COLUMNS,
            tables::DONATORS_ON_THE_WAY
        ),
        params![location_id, donator_id],
        on_the_way_from_row,
    )
    .optional()
}

/// Fields for a newly shared anonymous location.
#[derive(Debug, Clone)]
pub struct NewAnonymousLocation {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub facebook: String,
    pub email: String,
    pub notes: String,
    pub photo: Option<String>,
    pub supply_needs: Value,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub session_id: String,
    pub qr_code: String,
}

/// Partial update of a shared location; `None` leaves a column unchanged.
#[derive(Debug, Clone, Default)]
pub struct AnonymousLocationUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub facebook: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub photo: Option<String>,
    pub supply_needs: Option<Value>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
}

impl Db {
    /// End of the cooldown for `phone`, if one is still running.
    pub async fn cooldown_until(&self, phone: String) -> Result<Option<DateTime<Utc>>, AppError> {
        self.call(move |conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT next_request_allowed_at FROM {} \
                         WHERE phone = ?1 AND donation_received = 1 \
                         AND next_request_allowed_at > ?2 \
                         ORDER BY next_request_allowed_at DESC LIMIT 1",
                        tables::ANONYMOUS_LOCATIONS
                    ),
                    params![phone, time_utils::now()],
                    |row| row.get(0),
                )
                .optional()?)
        })
        .await
    }

    /// Active location registered under `session_id`.
    pub async fn find_active_session(
        &self,
        session_id: String,
    ) -> Result<Option<AnonymousLocation>, AppError> {
        self.call(move |conn| {
            let id: Option<i64> = conn
                .query_row(
                    &format!(
                        "SELECT id FROM {} WHERE session_id = ?1 AND is_active = 1 \
                         ORDER BY id LIMIT 1",
                        tables::ANONYMOUS_LOCATIONS
                    ),
                    params![session_id],
                    |row| row.get(0),
                )
                .optional()?;
            match id {
                Some(id) => load_location(conn, id),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn create_anonymous_location(
        &self,
        new: NewAnonymousLocation,
    ) -> Result<AnonymousLocation, AppError> {
        self.call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {} (first_name, last_name, phone, facebook, email, notes, photo, \
                     supply_needs, latitude, longitude, accuracy, session_id, qr_code, \
                     created_at, updated_at, last_seen) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14, ?14)",
                    tables::ANONYMOUS_LOCATIONS
                ),
                params![
                    new.first_name,
                    new.last_name,
                    new.phone,
                    new.facebook,
                    new.email,
                    new.notes,
                    new.photo,
                    new.supply_needs,
                    round_coordinate(new.latitude, 6),
                    round_coordinate(new.longitude, 6),
                    new.accuracy,
                    new.session_id,
                    new.qr_code,
                    time_utils::now()
                ],
            )?;
            let id = conn.last_insert_rowid();
            load_location(conn, id)?.ok_or_else(AppError::not_found)
        })
        .await
    }

    /// Apply a partial update and refresh `last_seen`.
    pub async fn update_anonymous_location(
        &self,
        id: i64,
        update: AnonymousLocationUpdate,
    ) -> Result<Option<AnonymousLocation>, AppError> {
        self.call(move |conn| {
            let now = time_utils::now();
            let mut set = Assignments::default();
            set.set_opt("first_name", update.first_name);
            set.set_opt("last_name", update.last_name);
            set.set_opt("phone", update.phone);
            set.set_opt("facebook", update.facebook);
            set.set_opt("email", update.email);
            set.set_opt("notes", update.notes);
            set.set_opt("photo", update.photo);
            set.set_opt("supply_needs", update.supply_needs.as_ref().map(json));
            set.set_opt("latitude", update.latitude.map(|v| round_coordinate(v, 6)));
            set.set_opt("longitude", update.longitude.map(|v| round_coordinate(v, 6)));
            set.set_opt("accuracy", update.accuracy);
            set.set("updated_at", ts(now));
            set.set("last_seen", ts(now));
            set.apply(conn, tables::ANONYMOUS_LOCATIONS, id)?;
            load_location(conn, id)
        })
        .await
    }

    /// Visible locations, most recently seen first.
    pub async fn list_anonymous_locations(
        &self,
        page: PageRequest,
    ) -> Result<Paginated<AnonymousLocation>, AppError> {
        self.call(move |conn| {
            let mut result = fetch_page(
                conn,
                LOCATION_COLUMNS,
                &location_from(),
                &visible(time_utils::now()),
                LOCATION_ORDER,
                &page,
                location_from_row,
            )?;
            for location in &mut result.results {
                attach_on_the_way(conn, location)?;
            }
            Ok(result)
        })
        .await
    }

    /// Every visible location, unpaginated.
    pub async fn active_anonymous_locations(&self) -> Result<Vec<AnonymousLocation>, AppError> {
        self.call(|conn| {
            let mut locations = fetch_all(
                conn,
                LOCATION_COLUMNS,
                &location_from(),
                &visible(time_utils::now()),
                LOCATION_ORDER,
                location_from_row,
            )?;
            for location in &mut locations {
                attach_on_the_way(conn, location)?;
            }
            Ok(locations)
        })
        .await
    }

    pub async fn get_visible_anonymous_location(
        &self,
        id: i64,
    ) -> Result<Option<AnonymousLocation>, AppError> {
        self.call(move |conn| {
            let mut conditions = visible(time_utils::now());
            conditions.push("a.id = ?", id);
            let found = fetch_all(
                conn,
                LOCATION_COLUMNS,
                &location_from(),
                &conditions,
                LOCATION_ORDER,
                location_from_row,
            )?
            .into_iter()
            .next();
            match found {
                Some(mut location) => {
                    attach_on_the_way(conn, &mut location)?;
                    Ok(Some(location))
                }
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn delete_anonymous_location(&self, id: i64) -> Result<bool, AppError> {
        self.call(move |conn| {
            let n = conn.execute(
                &format!("DELETE FROM {} WHERE id = ?1", tables::ANONYMOUS_LOCATIONS),
                params![id],
            )?;
            Ok(n > 0)
        })
        .await
    }

    /// Mark `donator_id` as heading to `location_id`, restarting tracking if
    /// they were already recorded.
    pub async fn mark_on_the_way(
        &self,
        location_id: i64,
        donator_id: i64,
    ) -> Result<(DonatorOnTheWay, AnonymousLocation), AppError> {
        self.call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                &format!(
                    "INSERT INTO {} (location_id, donator_id, marked_at, arrived, is_tracking) \
                     VALUES (?1, ?2, ?3, 0, 1) \
                     ON CONFLICT (location_id, donator_id) DO UPDATE SET \
                     arrived = 0, is_tracking = 1, marked_at = excluded.marked_at",
                    tables::DONATORS_ON_THE_WAY
                ),
                params![location_id, donator_id, time_utils::now()],
            )?;
            let entry =
                load_on_the_way(&tx, location_id, donator_id)?.ok_or_else(AppError::not_found)?;
            let location = load_location(&tx, location_id)?.ok_or_else(AppError::not_found)?;
            tx.commit()?;
            Ok((entry, location))
        })
        .await
    }

    /// Confirm a hand-over by QR code.
    ///
    /// Marks the location as served by `donator_id`, starts the cooldown,
    /// deactivates it, marks the donator as arrived and records the
    /// donation history, all in one transaction.
    pub async fn scan_qr_code(
        &self,
        qr_code: String,
        donator_id: i64,
    ) -> Result<(AnonymousLocation, DonationHistory), AppError> {
        self.call(move |conn| {
            let tx = conn.transaction()?;

            let id: i64 = tx
                .query_row(
                    &format!(
                        "SELECT id FROM {} WHERE qr_code = ?1 AND is_active = 1",
                        tables::ANONYMOUS_LOCATIONS
                    ),
                    params![qr_code],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| AppError::NotFound("Invalid or expired QR code".to_string()))?;
            let location = load_location(&tx, id)?.ok_or_else(AppError::not_found)?;
            if location.donation_received {
                return Err(AppError::BadRequest(
                    "This location has already received a donation".to_string(),
                ));
            }

            let now = time_utils::now();
            tx.execute(
                &format!(
                    "UPDATE {} SET donation_received = 1, donated_by_user_id = ?1, \
                     donation_timestamp = ?2, next_request_allowed_at = ?3, is_active = 0, \
                     updated_at = ?2 WHERE id = ?4",
                    tables::ANONYMOUS_LOCATIONS
                ),
                params![donator_id, now, next_request_allowed_at(now), id],
            )?;
            tx.execute(
                &format!(
                    "UPDATE {} SET arrived = 1 WHERE location_id = ?1 AND donator_id = ?2",
                    tables::DONATORS_ON_THE_WAY
                ),
                params![id, donator_id],
            )?;
            tx.execute(
                &format!(
                    "INSERT INTO {} (donator_id, affected_first_name, affected_last_name, \
                     affected_phone, latitude, longitude, supply_needs_fulfilled, qr_code, \
                     donated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    tables::DONATION_HISTORY
                ),
                params![
                    donator_id,
                    location.first_name,
                    location.last_name,
                    location.phone,
                    location.latitude,
                    location.longitude,
                    location.supply_needs,
                    qr_code,
                    now
                ],
            )?;
            let history_id = tx.last_insert_rowid();

            let location = load_location(&tx, id)?.ok_or_else(AppError::not_found)?;
            let history = load_history(&tx, history_id)?.ok_or_else(AppError::not_found)?;
            tx.commit()?;

            tracing::info!(
                location_id = id,
                donator_id,
                history_id,
                "QR donation recorded"
            );
            Ok((location, history))
        })
        .await
    }

    /// The donator's on-the-way record for a location, optionally only
    /// while tracking is on.
    pub async fn find_on_the_way(
        &self,
        location_id: i64,
        donator_id: i64,
        tracking_only: bool,
    ) -> Result<Option<DonatorOnTheWay>, AppError> {
        self.call(move |conn| {
            Ok(load_on_the_way(conn, location_id, donator_id)?
                .filter(|entry| !tracking_only || entry.is_tracking))
        })
        .await
    }

    /// Store a tracking position for an on-the-way entry.
    pub async fn record_tracking_update(
        &self,
        entry_id: i64,
        latitude: f64,
        longitude: f64,
        accuracy: f64,
    ) -> Result<DateTime<Utc>, AppError> {
        self.call(move |conn| {
            let now = time_utils::now();
            let tx = conn.transaction()?;
            tx.execute(
                &format!(
                    "INSERT INTO {} (donator_on_the_way_id, latitude, longitude, accuracy, timestamp) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    tables::LOCATION_UPDATES
                ),
                params![
                    entry_id,
                    round_coordinate(latitude, 8),
                    round_coordinate(longitude, 8),
                    accuracy,
                    now
                ],
            )?;
            tx.execute(
                &format!(
                    "UPDATE {} SET last_location_update = ?1 WHERE id = ?2",
                    tables::DONATORS_ON_THE_WAY
                ),
                params![now, entry_id],
            )?;
            tx.commit()?;
            Ok(now)
        })
        .await
    }

    pub async fn stop_tracking(&self, entry_id: i64) -> Result<(), AppError> {
        self.call(move |conn| {
            conn.execute(
                &format!(
                    "UPDATE {} SET is_tracking = 0 WHERE id = ?1",
                    tables::DONATORS_ON_THE_WAY
                ),
                params![entry_id],
            )?;
            Ok(())
        })
        .await
    }
}
