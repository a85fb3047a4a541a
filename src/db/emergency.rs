// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Emergency requests.

use super::{fetch_page, tables, ts, Assignments, Conditions, Db};
use crate::error::AppError;
use crate::models::{full_name, Category, EmergencyRequest, Priority, RequestStatus};
use crate::pagination::{PageRequest, Paginated};
use crate::time_utils::{self, round_coordinate};
use rusqlite::{params, Connection, OptionalExtension, Row};

const REQUEST_COLUMNS: &str = "e.id, e.requester_id, u.first_name, u.last_name, u.email, \
     u.phone_number, e.title, e.description, e.category, e.priority, e.status, \
     e.quantity_needed, e.unit, e.location, e.latitude, e.longitude, e.people_affected, \
     e.created_at, e.updated_at, e.fulfilled_at";

/// Most urgent first, then newest.
const REQUEST_ORDER: &str = "CASE e.priority WHEN 'critical' THEN 0 WHEN 'high' THEN 1 \
     WHEN 'medium' THEN 2 ELSE 3 END, e.created_at DESC, e.id DESC";

fn request_from_row(row: &Row<'_>) -> rusqlite::Result<EmergencyRequest> {
    let first: String = row.get(2)?;
    let last: String = row.get(3)?;
    Ok(EmergencyRequest {
        id: row.get(0)?,
        requester: row.get(1)?,
        requester_name: full_name(&first, &last).unwrap_or_default(),
        requester_email: row.get(4)?,
        requester_phone: row.get(5)?,
        title: row.get(6)?,
        description: row.get(7)?,
        category: row.get(8)?,
        priority: row.get(9)?,
        status: row.get(10)?,
        quantity_needed: row.get(11)?,
        unit: row.get(12)?,
        location: row.get(13)?,
        latitude: row.get(14)?,
        longitude: row.get(15)?,
        people_affected: row.get(16)?,
        created_at: row.get(17)?,
        updated_at: row.get(18)?,
        fulfilled_at: row.get(19)?,
    })
}

fn request_from() -> String {
    format!(
        "FROM {} e JOIN {} u ON u.id = e.requester_id",
        tables::EMERGENCY_REQUESTS,
        tables::USERS
    )
}

fn load_request(conn: &Connection, id: i64) -> rusqlite::Result<Option<EmergencyRequest>> {
    conn.query_row(
        &format!("SELECT {} {} WHERE e.id = ?1", REQUEST_COLUMNS, request_from()),
        params![id],
        request_from_row,
    )
    .optional()
}

/// Fields for a new emergency request.
#[derive(Debug, Clone)]
pub struct NewEmergencyRequest {
    pub requester_id: i64,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub priority: Priority,
    pub status: RequestStatus,
    pub quantity_needed: i64,
    pub unit: String,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub people_affected: i64,
}

/// Partial update; `None` leaves a column unchanged.
#[derive(Debug, Clone, Default)]
pub struct EmergencyUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub status: Option<RequestStatus>,
    pub quantity_needed: Option<i64>,
    pub unit: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub people_affected: Option<i64>,
}

/// List filters for emergency requests.
#[derive(Debug, Clone, Default)]
pub struct EmergencyFilter {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
    pub requester_id: Option<i64>,
}

impl Db {
    pub async fn list_emergency_requests(
        &self,
        filter: EmergencyFilter,
        page: PageRequest,
    ) -> Result<Paginated<EmergencyRequest>, AppError> {
        self.call(move |conn| {
            let mut conditions = Conditions::default();
            if let Some(status) = filter.status {
                conditions.push("e.status = ?", status);
            }
            if let Some(priority) = filter.priority {
                conditions.push("e.priority = ?", priority);
            }
            if let Some(category) = filter.category {
                conditions.push("e.category = ?", category);
            }
            if let Some(requester_id) = filter.requester_id {
                conditions.push("e.requester_id = ?", requester_id);
            }
            fetch_page(
                conn,
                REQUEST_COLUMNS,
                &request_from(),
                &conditions,
                REQUEST_ORDER,
                &page,
                request_from_row,
            )
        })
        .await
    }

    pub async fn get_emergency_request(
        &self,
        id: i64,
    ) -> Result<Option<EmergencyRequest>, AppError> {
        self.call(move |conn| Ok(load_request(conn, id)?)).await
    }

    pub async fn create_emergency_request(
        &self,
        new: NewEmergencyRequest,
    ) -> Result<EmergencyRequest, AppError> {
        self.call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {} (requester_id, title, description, category, priority, \
                     status, quantity_needed, unit, location, latitude, longitude, \
                     people_affected, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
                    tables::EMERGENCY_REQUESTS
                ),
                params![
                    new.requester_id,
                    new.title,
                    new.description,
                    new.category,
                    new.priority,
                    new.status,
                    new.quantity_needed,
                    new.unit,
                    new.location,
                    round_coordinate(new.latitude, 6),
                    round_coordinate(new.longitude, 6),
                    new.people_affected,
                    time_utils::now()
                ],
            )?;
            let id = conn.last_insert_rowid();
            load_request(conn, id)?.ok_or_else(AppError::not_found)
        })
        .await
    }

    pub async fn update_emergency_request(
        &self,
        id: i64,
        update: EmergencyUpdate,
    ) -> Result<Option<EmergencyRequest>, AppError> {
        self.call(move |conn| {
            let now = time_utils::now();
            let mut set = Assignments::default();
            set.set_opt("title", update.title);
            set.set_opt("description", update.description);
            set.set_opt("category", update.category.map(|c| c.as_str().to_string()));
            set.set_opt("priority", update.priority.map(|p| p.as_str().to_string()));
            if let Some(status) = update.status {
                set.set("status", status.as_str().to_string());
                if status == RequestStatus::Fulfilled {
                    set.set("fulfilled_at", ts(now));
                }
            }
            set.set_opt("quantity_needed", update.quantity_needed);
            set.set_opt("unit", update.unit);
            set.set_opt("location", update.location);
            set.set_opt("latitude", update.latitude.map(|v| round_coordinate(v, 6)));
            set.set_opt("longitude", update.longitude.map(|v| round_coordinate(v, 6)));
            set.set_opt("people_affected", update.people_affected);
            set.set("updated_at", ts(now));
            set.apply(conn, tables::EMERGENCY_REQUESTS, id)?;
            Ok(load_request(conn, id)?)
        })
        .await
    }

    pub async fn delete_emergency_request(&self, id: i64) -> Result<bool, AppError> {
        self.call(move |conn| {
            let n = conn.execute(
                &format!("DELETE FROM {} WHERE id = ?1", tables::EMERGENCY_REQUESTS),
                params![id],
            )?;
            Ok(n > 0)
        })
        .await
    }
}
