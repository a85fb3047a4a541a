//! Donations and their status tracking history.

use chrono::{DateTime, Utc};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

text_enum! {
    /// Kind of relief goods.
    pub enum Category {
        Food => "food",
        Water => "water",
        Clothing => "clothing",
        Medicine => "medicine",
        Shelter => "shelter",
        Hygiene => "hygiene",
        Other => "other",
    }
}

text_enum! {
    /// Donation lifecycle state.
    pub enum DonationStatus {
        Pending => "pending",
        Approved => "approved",
        InTransit => "in_transit",
        Delivered => "delivered",
        Cancelled => "cancelled",
    }
}

/// Donation joined with donator and recipient names.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Donation {
    pub id: i64,
    pub donator: i64,
    pub donator_name: String,
    pub donator_email: String,
    pub recipient: Option<i64>,
    pub recipient_name: Option<String>,
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
    #[serde(serialize_with = "crate::services::media::serialize_media_url")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub notes: String,
}

/// One status change recorded against a donation.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DonationTracking {
    pub id: i64,
    pub donation: i64,
    pub status: DonationStatus,
    pub notes: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub updated_by: Option<i64>,
    pub updated_by_name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_json() {
        assert_eq!(
            serde_json::to_value(DonationStatus::InTransit).unwrap(),
            "in_transit"
        );
        let parsed: Category = serde_json::from_value(serde_json::json!("medicine")).unwrap();
        assert_eq!(parsed, Category::Medicine);
    }

    #[test]
    fn test_invalid_choice_message() {
        let err = "teleported".parse::<DonationStatus>().unwrap_err();
        assert_eq!(err, "\"teleported\" is not a valid choice.");
    }
}
