//! Registered-user location track.

use chrono::{DateTime, Utc};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// One reported position of a registered user, joined with its owner.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Location {
    pub id: i64,
    pub user: i64,
    pub user_email: String,
    pub user_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    pub is_current: bool,
    /// GPS accuracy in meters
    pub accuracy: Option<f64>,
}
