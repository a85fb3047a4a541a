// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account administration behind the `create-superuser` command.

use crate::db::{Db, NewUser};
use crate::error::AppError;
use crate::models::{user::normalize_email, Role, User};
use crate::services::PasswordHasher;

/// Create a staff superuser with the admin role.
///
/// A taken email is reported as a validation error on `email`.
pub async fn create_superuser(
    db: &Db,
    passwords: &PasswordHasher,
    email: &str,
    password: &str,
    first_name: &str,
    last_name: &str,
) -> Result<User, AppError> {
    let email = normalize_email(email);
    if email.is_empty() || password.is_empty() {
        return Err(AppError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }

    let password_hash = passwords.hash_blocking(password.to_string()).await?;
    let user = db
        .create_user(NewUser {
            email,
            password_hash: Some(password_hash),
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            role: Role::Admin,
            phone_number: String::new(),
            address: String::new(),
            is_staff: true,
            is_superuser: true,
        })
        .await?;

    tracing::info!(user_id = user.id, "Superuser created");
    Ok(user)
}
