// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User accounts.

use super::{fetch_page, tables, unique_violation, Assignments, Conditions, Db};
use crate::error::AppError;
use crate::models::{Role, User, UserProfile};
use crate::pagination::{PageRequest, Paginated};
use crate::time_utils;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(crate) const USER_COLUMNS: &str = "u.id, u.email, u.password_hash, u.first_name, u.last_name, \
     u.role, u.phone_number, u.profile_picture, u.address, u.is_location_shared, u.is_staff, \
     u.is_superuser, u.is_active, u.last_login, u.created_at, u.updated_at";

pub(crate) fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        role: row.get(5)?,
        phone_number: row.get(6)?,
        profile_picture: row.get(7)?,
        address: row.get(8)?,
        is_location_shared: row.get(9)?,
        is_staff: row.get(10)?,
        is_superuser: row.get(11)?,
        is_active: row.get(12)?,
        last_login: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

/// Fields for a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    /// `None` stores an unusable password
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub phone_number: String,
    pub address: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// Partial profile update; `None` leaves a column unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub is_location_shared: Option<bool>,
    pub profile_picture: Option<String>,
    pub role: Option<Role>,
}

pub(crate) fn load_user(conn: &Connection, id: i64) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM {} u WHERE u.id = ?1", USER_COLUMNS, tables::USERS),
        params![id],
        user_from_row,
    )
    .optional()
}

impl Db {
    pub async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        self.call(move |conn| Ok(load_user(conn, id)?)).await
    }

    pub async fn get_user_by_email(&self, email: String) -> Result<Option<User>, AppError> {
        self.call(move |conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT {} FROM {} u WHERE u.email = ?1",
                        USER_COLUMNS,
                        tables::USERS
                    ),
                    params![email],
                    user_from_row,
                )
                .optional()?)
        })
        .await
    }

    /// Affected user registered with this phone number.
    pub async fn find_affected_by_phone(&self, phone: String) -> Result<Option<User>, AppError> {
        self.call(move |conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT {} FROM {} u WHERE u.phone_number = ?1 AND u.role = ?2 \
                         ORDER BY u.id LIMIT 1",
                        USER_COLUMNS,
                        tables::USERS
                    ),
                    params![phone, Role::Affected],
                    user_from_row,
                )
                .optional()?)
        })
        .await
    }

    pub async fn phone_number_taken(&self, phone: String) -> Result<bool, AppError> {
        self.call(move |conn| {
            Ok(conn.query_row(
                &format!(
                    "SELECT EXISTS(SELECT 1 FROM {} WHERE phone_number = ?1)",
                    tables::USERS
                ),
                params![phone],
                |row| row.get(0),
            )?)
        })
        .await
    }

    /// Insert a user. A duplicate email is reported against the `email` field.
    pub async fn create_user(&self, new: NewUser) -> Result<User, AppError> {
        self.call(move |conn| {
            let now = time_utils::now();
            conn.execute(
                &format!(
                    "INSERT INTO {} (email, password_hash, first_name, last_name, role, \
                     phone_number, address, is_staff, is_superuser, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
                    tables::USERS
                ),
                params![
                    new.email,
                    new.password_hash,
                    new.first_name,
                    new.last_name,
                    new.role,
                    new.phone_number,
                    new.address,
                    new.is_staff,
                    new.is_superuser,
                    now
                ],
            )
            .map_err(|e| unique_violation(e, "email", "user with this email already exists."))?;

            let id = conn.last_insert_rowid();
            load_user(conn, id)?.ok_or_else(AppError::not_found)
        })
        .await
    }

    pub async fn record_login(&self, id: i64) -> Result<(), AppError> {
        self.call(move |conn| {
            conn.execute(
                &format!("UPDATE {} SET last_login = ?1 WHERE id = ?2", tables::USERS),
                params![time_utils::now(), id],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn list_users(
        &self,
        role: Option<String>,
        page: PageRequest,
    ) -> Result<Paginated<UserProfile>, AppError> {
        self.call(move |conn| {
            let mut conditions = Conditions::default();
            if let Some(role) = role {
                conditions.push("u.role = ?", role);
            }
            fetch_page(
                conn,
                USER_COLUMNS,
                &format!("FROM {} u", tables::USERS),
                &conditions,
                "u.created_at DESC, u.id DESC",
                &page,
                |row| user_from_row(row).map(|u| u.profile()),
            )
        })
        .await
    }

    /// Apply a partial update, returning the updated user.
    pub async fn update_user(&self, id: i64, update: UserUpdate) -> Result<Option<User>, AppError> {
        self.call(move |conn| {
            let mut set = Assignments::default();
            set.set_opt("first_name", update.first_name);
            set.set_opt("last_name", update.last_name);
            set.set_opt("phone_number", update.phone_number);
            set.set_opt("address", update.address);
            set.set_opt("is_location_shared", update.is_location_shared);
            set.set_opt("profile_picture", update.profile_picture);
            set.set_opt("role", update.role.map(|r| r.as_str().to_string()));
            if !set.is_empty() {
                set.set("updated_at", super::ts(time_utils::now()));
            }
            set.apply(conn, tables::USERS, id)?;
            Ok(load_user(conn, id)?)
        })
        .await
    }

    /// Delete a user and everything that cascades from it.
    pub async fn delete_user(&self, id: i64) -> Result<bool, AppError> {
        self.call(move |conn| {
            let n = conn.execute(
                &format!("DELETE FROM {} WHERE id = ?1", tables::USERS),
                params![id],
            )?;
            Ok(n > 0)
        })
        .await
    }
}
