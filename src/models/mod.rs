// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

/// Declare a string-valued choice enum that round-trips through JSON and SQLite.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
        #[cfg_attr(
            feature = "binding-generation",
            ts(export, export_to = "web/src/lib/generated/")
        )]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("\"{}\" is not a valid choice.", other)),
                }
            }
        }

        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.as_str()))
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: String| rusqlite::types::FromSqlError::Other(e.into()))
            }
        }
    };
}

pub mod anonymous;
pub mod donation;
pub mod emergency;
pub mod history;
pub mod location;
pub mod user;

pub use anonymous::{
    generate_qr_code, AnonymousLocation, DonatorOnTheWay, OnTheWaySummary, SupplyNeeds,
};
pub use donation::{Category, Donation, DonationStatus, DonationTracking};
pub use emergency::{EmergencyRequest, Priority, RequestStatus};
pub use history::{
    Acknowledgment, ContributorRanking, DonationHistory, DonationRating, SuppliesConfirmed,
};
pub use location::Location;
pub use user::{Role, User, UserProfile};

/// Trimmed "first last", or `None` when both are blank.
pub fn full_name(first: &str, last: &str) -> Option<String> {
    let name = format!("{} {}", first, last).trim().to_string();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}
