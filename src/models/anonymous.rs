// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Anonymous affected-user locations, QR codes and supply needs.

use crate::error::Restriction;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use ring::rand::{SecureRandom, SystemRandom};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::LazyLock;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Hours a phone number must wait after a confirmed donation.
pub const COOLDOWN_HOURS: i64 = 3;

/// Locations not seen for this long drop out of public listings.
pub const VISIBILITY_HOURS: i64 = 24;

/// Philippine mobile number, local or international form.
pub static PH_MOBILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(09|\+639)\d{9}$").expect("static regex")
});

pub const PH_MOBILE_MESSAGE: &str =
    "Phone number must be a valid PH mobile number (e.g., 09171234567 or +639171234567)";

/// Anonymous location joined with donator details.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AnonymousLocation {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub facebook: String,
    pub email: String,
    pub notes: String,
    #[serde(serialize_with = "crate::services::media::serialize_media_url")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub photo: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "Record<string, unknown>"))]
    pub supply_needs: Value,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub is_active: bool,
    pub qr_code: Option<String>,
    pub donation_received: bool,
    pub donated_by_user: Option<i64>,
    pub donated_by_user_name: Option<String>,
    pub donation_timestamp: Option<DateTime<Utc>>,
    pub next_request_allowed_at: Option<DateTime<Utc>>,
    pub donators_on_the_way: Vec<OnTheWaySummary>,
}

/// A donator heading to a location who has not arrived yet.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct OnTheWaySummary {
    /// Donator user id
    pub id: i64,
    pub name: String,
    pub email: String,
    pub marked_at: DateTime<Utc>,
}

/// A donator's "on the way" record for one location.
#[derive(Debug, Clone)]
pub struct DonatorOnTheWay {
    pub id: i64,
    pub location_id: i64,
    pub donator_id: i64,
    pub marked_at: DateTime<Utc>,
    pub arrived: bool,
    pub is_tracking: bool,
    pub last_location_update: Option<DateTime<Utc>>,
}

/// Generate a fresh `LOC-` code with 12 upper-case hex digits.
pub fn generate_qr_code() -> anyhow::Result<String> {
    let mut bytes = [0u8; 6];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| anyhow::anyhow!("system random source failed"))?;
    Ok(format!("LOC-{}", hex::encode_upper(bytes)))
}

/// Cooldown details for a phone whose next request is allowed at `next_allowed_at`.
pub fn restriction(next_allowed_at: DateTime<Utc>, now: DateTime<Utc>) -> Restriction {
    let remaining = (next_allowed_at - now).num_seconds().max(0);
    let hours = remaining / 3600;
    let minutes = (remaining % 3600) / 60;
    Restriction {
        restricted: true,
        next_allowed_at,
        time_remaining_seconds: remaining,
        message: format!(
            "You can request help again in {} hour(s) and {} minute(s)",
            hours, minutes
        ),
    }
}

/// When a phone that just received a donation may ask again.
pub fn next_request_allowed_at(donated_at: DateTime<Utc>) -> DateTime<Utc> {
    donated_at + Duration::hours(COOLDOWN_HOURS)
}

/// Validated supply needs.
pub struct SupplyNeeds;

impl SupplyNeeds {
    /// Numeric keys; values must be non-negative integers.
    pub const COUNTS: [&'static str; 6] = [
        "water",
        "food",
        "people_count",
        "medical_supplies",
        "clothing",
        "shelter_materials",
    ];

    /// Free-text key.
    pub const OTHER: &'static str = "other";

    /// Normalize a submitted `supply_needs` value.
    ///
    /// Accepts an object or a JSON-encoded string. Numeric strings are
    /// converted to integers and `other` is coerced to text.
    pub fn parse(value: Value) -> Result<Value, String> {
        let mut map = match value {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            Value::String(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(map)) => map,
                _ => return Err("Invalid JSON format for supply needs".to_string()),
            },
            _ => return Err("Invalid JSON format for supply needs".to_string()),
        };

        let mut invalid: Vec<&str> = map
            .keys()
            .map(String::as_str)
            .filter(|k| *k != Self::OTHER && !Self::COUNTS.iter().any(|c| *c == *k))
            .collect();
        if !invalid.is_empty() {
            invalid.sort_unstable();
            return Err(format!("Invalid fields: {}", invalid.join(", ")));
        }

        for field in Self::COUNTS {
            if let Some(raw) = map.get(field) {
                let count = non_negative_int(raw)
                    .ok_or_else(|| format!("{} must be a non-negative integer", field))?;
                map.insert(field.to_string(), Value::from(count));
            }
        }

        if let Some(other) = map.get(Self::OTHER) {
            let text = match other {
                Value::String(s) => s.trim().to_string(),
                v => v.to_string(),
            };
            map.insert(Self::OTHER.to_string(), Value::String(text));
        }

        Ok(Value::Object(map))
    }

    /// Integer count stored under `key`, zero when absent.
    pub fn count(needs: &Value, key: &str) -> i64 {
        needs.get(key).and_then(non_negative_int).unwrap_or(0)
    }
}

fn non_negative_int(value: &Value) -> Option<i64> {
    let n = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    (n >= 0).then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_qr_code_format() {
        let code = generate_qr_code().unwrap();
        assert_eq!(code.len(), 16);
        assert!(code.starts_with("LOC-"));
        assert!(code[4..]
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        assert_ne!(code, generate_qr_code().unwrap());
    }

    #[test]
    fn test_supply_needs_normalizes_counts() {
        let parsed = SupplyNeeds::parse(json!({"water": "5", "food": 2, "other": "blankets"}))
            .unwrap();
        assert_eq!(parsed, json!({"water": 5, "food": 2, "other": "blankets"}));
    }

    #[test]
    fn test_supply_needs_accepts_json_string() {
        let parsed = SupplyNeeds::parse(json!("{\"people_count\": 4}")).unwrap();
        assert_eq!(parsed, json!({"people_count": 4}));

        assert_eq!(
            SupplyNeeds::parse(json!("{not json")).unwrap_err(),
            "Invalid JSON format for supply needs"
        );
    }

    #[test]
    fn test_supply_needs_rejects_bad_values() {
        assert_eq!(
            SupplyNeeds::parse(json!({"water": -1})).unwrap_err(),
            "water must be a non-negative integer"
        );
        assert_eq!(
            SupplyNeeds::parse(json!({"pets": 1, "fuel": 2})).unwrap_err(),
            "Invalid fields: fuel, pets"
        );
    }

    #[test]
    fn test_restriction_message() {
        let now = Utc::now();
        let next = now + Duration::seconds(2 * 3600 + 30 * 60 + 15);
        let r = restriction(next, now);
        assert!(r.restricted);
        assert_eq!(r.time_remaining_seconds, 9015);
        assert_eq!(
            r.message,
            "You can request help again in 2 hour(s) and 30 minute(s)"
        );
    }

    #[test]
    fn test_ph_mobile_pattern() {
        assert!(PH_MOBILE.is_match("09171234567"));
        assert!(PH_MOBILE.is_match("+639171234567"));
        assert!(!PH_MOBILE.is_match("9171234567"));
        assert!(!PH_MOBILE.is_match("+15551234567"));
    }
}
