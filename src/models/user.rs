//! User model for storage and API.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

text_enum! {
    /// Account role.
    pub enum Role {
        Donator => "donator",
        Affected => "affected",
        Admin => "admin",
    }
}

/// User account stored in SQLite.
///
/// Serializes to the full user representation returned by auth endpoints.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct User {
    pub id: i64,
    pub email: String,
    /// PBKDF2 hash, `None` for accounts that cannot log in with a password
    #[serde(skip)]
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub phone_number: String,
    pub address: String,
    /// Media path of the profile picture
    #[serde(serialize_with = "crate::services::media::serialize_media_url")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub profile_picture: Option<String>,
    pub is_location_shared: bool,
    #[serde(skip)]
    pub is_staff: bool,
    #[serde(skip)]
    pub is_superuser: bool,
    #[serde(skip)]
    pub is_active: bool,
    #[serde(skip)]
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// "First Last", or empty when neither is set.
    pub fn full_name(&self) -> String {
        super::full_name(&self.first_name, &self.last_name).unwrap_or_default()
    }

    /// Full name, falling back to the local part of the email address.
    pub fn display_name(&self) -> String {
        super::full_name(&self.first_name, &self.last_name)
            .unwrap_or_else(|| self.username().to_string())
    }

    /// Local part of the email address.
    pub fn username(&self) -> &str {
        self.email.split('@').next().unwrap_or_default()
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            role: self.role,
            phone_number: self.phone_number.clone(),
            profile_picture: self.profile_picture.clone(),
            is_location_shared: self.is_location_shared,
        }
    }
}

/// Limited user view used by user listings.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub phone_number: String,
    #[serde(serialize_with = "crate::services::media::serialize_media_url")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub profile_picture: Option<String>,
    pub is_location_shared: bool,
}

/// Optional leading `+` and `1`, then 9 to 15 digits.
pub static PHONE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?1?\d{9,15}$").expect("static regex"));

pub const PHONE_NUMBER_MESSAGE: &str =
    "Phone number must be entered in the format: '+999999999'. Up to 15 digits allowed.";

/// Lower-case the domain part of an email address.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}
