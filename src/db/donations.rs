// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Donations and donation tracking.

use super::{fetch_all, fetch_page, tables, ts, Assignments, Conditions, Db};
use crate::error::AppError;
use crate::models::{full_name, Category, Donation, DonationStatus, DonationTracking};
use crate::pagination::{PageRequest, Paginated};
use crate::time_utils;
use rusqlite::{params, Connection, OptionalExtension, Row};

const DONATION_COLUMNS: &str = "d.id, d.donator_id, u.first_name, u.last_name, u.email, \
     d.recipient_id, r.first_name, r.last_name, d.title, d.description, d.category, d.quantity, \
     d.unit, d.status, d.pickup_location, d.pickup_latitude, d.pickup_longitude, \
     d.delivery_location, d.delivery_latitude, d.delivery_longitude, d.image, d.created_at, \
     d.updated_at, d.delivered_at, d.notes";

fn donation_from_row(row: &Row<'_>) -> rusqlite::Result<Donation> {
    let donator_first: String = row.get(2)?;
    let donator_last: String = row.get(3)?;
    let recipient: Option<i64> = row.get(5)?;
    let recipient_first: Option<String> = row.get(6)?;
    let recipient_last: Option<String> = row.get(7)?;
    Ok(Donation {
        id: row.get(0)?,
        donator: row.get(1)?,
        donator_name: full_name(&donator_first, &donator_last).unwrap_or_default(),
        donator_email: row.get(4)?,
        recipient,
        recipient_name: recipient.map(|_| {
            full_name(
                recipient_first.as_deref().unwrap_or_default(),
                recipient_last.as_deref().unwrap_or_default(),
            )
            .unwrap_or_default()
        }),
        title: row.get(8)?,
        description: row.get(9)?,
        category: row.get(10)?,
        quantity: row.get(11)?,
        unit: row.get(12)?,
        status: row.get(13)?,
        pickup_location: row.get(14)?,
        pickup_latitude: row.get(15)?,
        pickup_longitude: row.get(16)?,
        delivery_location: row.get(17)?,
        delivery_latitude: row.get(18)?,
        delivery_longitude: row.get(19)?,
        image: row.get(20)?,
        created_at: row.get(21)?,
        updated_at: row.get(22)?,
        delivered_at: row.get(23)?,
        notes: row.get(24)?,
    })
}

fn donation_from() -> String {
    format!(
        "FROM {} d JOIN {} u ON u.id = d.donator_id LEFT JOIN {} r ON r.id = d.recipient_id",
        tables::DONATIONS,
        tables::USERS,
        tables::USERS
    )
}

fn load_donation(conn: &Connection, id: i64) -> rusqlite::Result<Option<Donation>> {
    conn.query_row(
        &format!("SELECT {} {} WHERE d.id = ?1", DONATION_COLUMNS, donation_from()),
        params![id],
        donation_from_row,
    )
    .optional()
}

const TRACKING_COLUMNS: &str = "t.id, t.donation_id, t.status, t.notes, t.latitude, \
     t.longitude, t.updated_by_id, u.first_name, u.last_name, t.timestamp";

fn tracking_from_row(row: &Row<'_>) -> rusqlite::Result<DonationTracking> {
    let updated_by: Option<i64> = row.get(6)?;
    let first: Option<String> = row.get(7)?;
    let last: Option<String> = row.get(8)?;
    Ok(DonationTracking {
        id: row.get(0)?,
        donation: row.get(1)?,
        status: row.get(2)?,
        notes: row.get(3)?,
        latitude: row.get(4)?,
        longitude: row.get(5)?,
        updated_by,
        updated_by_name: updated_by.map(|_| {
            full_name(
                first.as_deref().unwrap_or_default(),
                last.as_deref().unwrap_or_default(),
            )
            .unwrap_or_default()
        }),
        timestamp: row.get(9)?,
    })
}

fn tracking_from() -> String {
    format!(
        "FROM {} t LEFT JOIN {} u ON u.id = t.updated_by_id",
        tables::DONATION_TRACKING,
        tables::USERS
    )
}

/// Fields for a new donation.
#[derive(Debug, Clone)]
pub struct NewDonation {
    pub donator_id: i64,
    pub recipient_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub quantity: i64,
    pub unit: String,
    pub status: DonationStatus,
    pub pickup_location: String,
    pub pickup_latitude: Option<f64>,
    pub pickup_longitude: Option<f64>,
    pub delivery_location: String,
    pub delivery_latitude: Option<f64>,
    pub delivery_longitude: Option<f64>,
    pub image: Option<String>,
    pub notes: String,
}

/// Partial donation update; `None` leaves a column unchanged.
#[derive(Debug, Clone, Default)]
pub struct DonationUpdate {
    pub recipient_id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub quantity: Option<i64>,
    pub unit: Option<String>,
    pub status: Option<DonationStatus>,
    pub pickup_location: Option<String>,
    pub pickup_latitude: Option<f64>,
    pub pickup_longitude: Option<f64>,
    pub delivery_location: Option<String>,
    pub delivery_latitude: Option<f64>,
    pub delivery_longitude: Option<f64>,
    pub image: Option<String>,
    pub notes: Option<String>,
}

/// List filters for donations.
#[derive(Debug, Clone, Default)]
pub struct DonationFilter {
    pub status: Option<String>,
    pub category: Option<String>,
    pub donator_id: Option<i64>,
    pub recipient_id: Option<i64>,
}

fn round6(value: Option<f64>) -> Option<f64> {
    value.map(|v| time_utils::round_coordinate(v, 6))
}

impl Db {
    pub async fn list_donations(
        &self,
        filter: DonationFilter,
        page: PageRequest,
    ) -> Result<Paginated<Donation>, AppError> {
        self.call(move |conn| {
            let mut conditions = Conditions::default();
            if let Some(status) = filter.status {
                conditions.push("d.status = ?", status);
            }
            if let Some(category) = filter.category {
                conditions.push("d.category = ?", category);
            }
            if let Some(donator_id) = filter.donator_id {
                conditions.push("d.donator_id = ?", donator_id);
            }
            if let Some(recipient_id) = filter.recipient_id {
                conditions.push("d.recipient_id = ?", recipient_id);
            }
            fetch_page(
                conn,
                DONATION_COLUMNS,
                &donation_from(),
                &conditions,
                "d.created_at DESC, d.id DESC",
                &page,
                donation_from_row,
            )
        })
        .await
    }

    pub async fn get_donation(&self, id: i64) -> Result<Option<Donation>, AppError> {
        self.call(move |conn| Ok(load_donation(conn, id)?)).await
    }

    pub async fn create_donation(&self, new: NewDonation) -> Result<Donation, AppError> {
        self.call(move |conn| {
            let now = time_utils::now();
            conn.execute(
                &format!(
                    "INSERT INTO {} (donator_id, recipient_id, title, description, category, \
                     quantity, unit, status, pickup_location, pickup_latitude, pickup_longitude, \
                     delivery_location, delivery_latitude, delivery_longitude, image, notes, \
                     created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
                     ?16, ?17, ?17)",
                    tables::DONATIONS
                ),
                params![
                    new.donator_id,
                    new.recipient_id,
                    new.title,
                    new.description,
                    new.category,
                    new.quantity,
                    new.unit,
                    new.status,
                    new.pickup_location,
                    round6(new.pickup_latitude),
                    round6(new.pickup_longitude),
                    new.delivery_location,
                    round6(new.delivery_latitude),
                    round6(new.delivery_longitude),
                    new.image,
                    new.notes,
                    now
                ],
            )?;
            let id = conn.last_insert_rowid();
            load_donation(conn, id)?.ok_or_else(AppError::not_found)
        })
        .await
    }

    pub async fn update_donation(
        &self,
        id: i64,
        update: DonationUpdate,
    ) -> Result<Option<Donation>, AppError> {
        self.call(move |conn| {
            let mut set = Assignments::default();
            set.set_opt("recipient_id", update.recipient_id);
            set.set_opt("title", update.title);
            set.set_opt("description", update.description);
            set.set_opt("category", update.category.map(|c| c.as_str().to_string()));
            set.set_opt("quantity", update.quantity);
            set.set_opt("unit", update.unit);
            set.set_opt("status", update.status.map(|s| s.as_str().to_string()));
            set.set_opt("pickup_location", update.pickup_location);
            set.set_opt("pickup_latitude", round6(update.pickup_latitude));
            set.set_opt("pickup_longitude", round6(update.pickup_longitude));
            set.set_opt("delivery_location", update.delivery_location);
            set.set_opt("delivery_latitude", round6(update.delivery_latitude));
            set.set_opt("delivery_longitude", round6(update.delivery_longitude));
            set.set_opt("image", update.image);
            set.set_opt("notes", update.notes);
            set.set("updated_at", ts(time_utils::now()));
            set.apply(conn, tables::DONATIONS, id)?;
            Ok(load_donation(conn, id)?)
        })
        .await
    }

    pub async fn delete_donation(&self, id: i64) -> Result<bool, AppError> {
        self.call(move |conn| {
            let n = conn.execute(
                &format!("DELETE FROM {} WHERE id = ?1", tables::DONATIONS),
                params![id],
            )?;
            Ok(n > 0)
        })
        .await
    }

    /// Change status and append a tracking entry in one transaction.
    pub async fn update_donation_status(
        &self,
        id: i64,
        status: DonationStatus,
        notes: String,
        updated_by: i64,
    ) -> Result<Donation, AppError> {
        self.call(move |conn| {
            let now = time_utils::now();
            let tx = conn.transaction()?;
            let delivered_at = (status == DonationStatus::Delivered).then_some(now);
            tx.execute(
                &format!(
                    "UPDATE {} SET status = ?1, delivered_at = COALESCE(?2, delivered_at), \
                     updated_at = ?3 WHERE id = ?4",
                    tables::DONATIONS
                ),
                params![status, delivered_at, now, id],
            )?;
            tx.execute(
                &format!(
                    "INSERT INTO {} (donation_id, status, notes, updated_by_id, timestamp) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    tables::DONATION_TRACKING
                ),
                params![id, status, notes, updated_by, now],
            )?;
            let donation = load_donation(&tx, id)?.ok_or_else(AppError::not_found)?;
            tx.commit()?;
            Ok(donation)
        })
        .await
    }

    /// Give a donation to a recipient and approve it.
    pub async fn assign_recipient(&self, id: i64, recipient_id: i64) -> Result<Donation, AppError> {
        self.call(move |conn| {
            conn.execute(
                &format!(
                    "UPDATE {} SET recipient_id = ?1, status = ?2, updated_at = ?3 WHERE id = ?4",
                    tables::DONATIONS
                ),
                params![recipient_id, DonationStatus::Approved, time_utils::now(), id],
            )?;
            load_donation(conn, id)?.ok_or_else(AppError::not_found)
        })
        .await
    }

    pub async fn list_tracking(
        &self,
        donation_id: Option<i64>,
        page: PageRequest,
    ) -> Result<Paginated<DonationTracking>, AppError> {
        self.call(move |conn| {
            let mut conditions = Conditions::default();
            if let Some(donation_id) = donation_id {
                conditions.push("t.donation_id = ?", donation_id);
            }
            fetch_page(
                conn,
                TRACKING_COLUMNS,
                &tracking_from(),
                &conditions,
                "t.timestamp DESC, t.id DESC",
                &page,
                tracking_from_row,
            )
        })
        .await
    }

    pub async fn get_tracking(&self, id: i64) -> Result<Option<DonationTracking>, AppError> {
        self.call(move |conn| {
            let mut conditions = Conditions::default();
            conditions.push("t.id = ?", id);
            Ok(fetch_all(
                conn,
                TRACKING_COLUMNS,
                &tracking_from(),
                &conditions,
                "t.id",
                tracking_from_row,
            )?
            .into_iter()
            .next())
        })
        .await
    }
}
