// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! QR-confirmed donation history, ratings and contributor ranking.

use super::SupplyNeeds;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// How many contributors the ranking returns.
pub const RANKING_SIZE: usize = 10;

/// Supply kinds compared between what was promised and what arrived.
pub const TRACKED_SUPPLIES: [&str; 5] = [
    "water",
    "food",
    "medical_supplies",
    "clothing",
    "shelter_materials",
];

/// A donation confirmed by scanning an affected person's QR code.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DonationHistory {
    pub id: i64,
    pub donator: i64,
    pub donator_name: String,
    pub donator_email: String,
    pub affected_first_name: String,
    pub affected_last_name: String,
    pub affected_phone: String,
    pub latitude: f64,
    pub longitude: f64,
    #[cfg_attr(feature = "binding-generation", ts(type = "Record<string, unknown>"))]
    pub supply_needs_fulfilled: Value,
    pub qr_code: String,
    pub donated_at: DateTime<Utc>,
    pub notes: String,
}

/// Donation summary embedded in a rating.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DonationInfo {
    pub donator_name: String,
    pub donator_email: String,
    pub donated_at: DateTime<Utc>,
    #[cfg_attr(feature = "binding-generation", ts(type = "Record<string, unknown>"))]
    pub supply_needs_fulfilled: Value,
}

/// Feedback left by an affected person for one donation.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DonationRating {
    pub id: i64,
    pub donation_history: i64,
    pub donation_info: DonationInfo,
    pub rating: Option<i64>,
    pub comment: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "Record<string, unknown>"))]
    pub supplies_confirmed: Value,
    pub rated_at: DateTime<Utc>,
    pub session_id: String,
}

/// Quantities an affected person confirms having received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SuppliesConfirmed {
    #[serde(default, deserialize_with = "crate::extract::flex::count")]
    pub water_received: i64,
    #[serde(default, deserialize_with = "crate::extract::flex::count")]
    pub food_received: i64,
    #[serde(default, deserialize_with = "crate::extract::flex::count")]
    pub medical_supplies_received: i64,
    #[serde(default, deserialize_with = "crate::extract::flex::count")]
    pub clothing_received: i64,
    #[serde(default, deserialize_with = "crate::extract::flex::count")]
    pub shelter_materials_received: i64,
    #[serde(default)]
    pub other_items: String,
    #[serde(default)]
    pub all_supplies_received: bool,
}

impl SuppliesConfirmed {
    /// Read a stored confirmation, treating anything unreadable as empty.
    pub fn from_stored(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    /// Confirmed quantity for a tracked supply kind.
    pub fn received(&self, kind: &str) -> i64 {
        match kind {
            "water" => self.water_received,
            "food" => self.food_received,
            "medical_supplies" => self.medical_supplies_received,
            "clothing" => self.clothing_received,
            "shelter_materials" => self.shelter_materials_received,
            _ => 0,
        }
    }

    /// What actually arrived, in supply-needs form: positive counts plus `other`.
    pub fn as_fulfilled(&self) -> Value {
        let mut map = Map::new();
        for kind in TRACKED_SUPPLIES {
            let n = self.received(kind);
            if n > 0 {
                map.insert(kind.to_string(), Value::from(n));
            }
        }
        if !self.other_items.is_empty() {
            map.insert(
                SupplyNeeds::OTHER.to_string(),
                Value::String(self.other_items.clone()),
            );
        }
        Value::Object(map)
    }
}

/// Supplies an affected person reported as received, keyed the way donators see them.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SuppliesReceived {
    pub water: i64,
    pub food: i64,
    pub medical_supplies: i64,
    pub clothing: i64,
    pub shelter_materials: i64,
    pub other_items: String,
    pub all_supplies_received: bool,
}

impl From<&SuppliesConfirmed> for SuppliesReceived {
    fn from(c: &SuppliesConfirmed) -> Self {
        Self {
            water: c.water_received,
            food: c.food_received,
            medical_supplies: c.medical_supplies_received,
            clothing: c.clothing_received,
            shelter_materials: c.shelter_materials_received,
            other_items: c.other_items.clone(),
            all_supplies_received: c.all_supplies_received,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserFeedback {
    pub rating: Option<i64>,
    pub comment: String,
    pub rated_at: Option<DateTime<Utc>>,
}

/// A donator's view of one donation and what the recipient confirmed.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Acknowledgment {
    pub donation_id: i64,
    pub affected_user: String,
    pub location: Coordinates,
    pub donated_at: DateTime<Utc>,
    #[cfg_attr(feature = "binding-generation", ts(type = "Record<string, unknown>"))]
    pub supplies_donated: Value,
    pub supplies_received: SuppliesReceived,
    pub user_feedback: UserFeedback,
    pub has_confirmation: bool,
}

impl Acknowledgment {
    pub fn new(history: DonationHistory, rating: Option<&DonationRating>) -> Self {
        let confirmed = rating
            .map(|r| SuppliesConfirmed::from_stored(&r.supplies_confirmed))
            .unwrap_or_default();
        Self {
            donation_id: history.id,
            affected_user: format!(
                "{} {}",
                history.affected_first_name, history.affected_last_name
            )
            .trim()
            .to_string(),
            location: Coordinates {
                latitude: history.latitude,
                longitude: history.longitude,
            },
            donated_at: history.donated_at,
            supplies_donated: history.supply_needs_fulfilled,
            supplies_received: SuppliesReceived::from(&confirmed),
            user_feedback: UserFeedback {
                rating: rating.and_then(|r| r.rating),
                comment: rating.map(|r| r.comment.clone()).unwrap_or_default(),
                rated_at: rating.map(|r| r.rated_at),
            },
            has_confirmation: rating.is_some(),
        }
    }
}

/// One history entry with its optional rating, as fed to the ranking.
#[derive(Debug, Clone)]
pub struct RankingInput {
    pub donator_id: i64,
    pub donator_name: String,
    pub donator_email: String,
    pub supply_needs_fulfilled: Value,
    /// `Some` when the entry has been rated; the inner value may still be null
    pub rating: Option<Option<i64>>,
    pub supplies_confirmed: Option<Value>,
}

/// Leaderboard entry for a donator.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ContributorRanking {
    pub rank: usize,
    pub donator_id: i64,
    pub donator_name: String,
    pub donator_email: String,
    pub total_donations: i64,
    pub total_people_helped: i64,
    pub average_rating: Option<f64>,
    pub total_ratings: i64,
    pub supplies_promised: BTreeMap<String, i64>,
    pub supplies_confirmed: BTreeMap<String, i64>,
    pub supply_fulfillment_rate: f64,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Percentage of promised supplies that were confirmed as delivered.
pub fn fulfillment_rate(promised: i64, confirmed: i64) -> f64 {
    if promised == 0 {
        return if confirmed == 0 { 100.0 } else { 0.0 };
    }
    round1(confirmed as f64 / promised as f64 * 100.0)
}

/// Aggregate history entries into the top contributors.
///
/// Donators are ordered by number of donations, ties broken by id.
pub fn rank_contributors(entries: Vec<RankingInput>) -> Vec<ContributorRanking> {
    let empty_supplies = || -> BTreeMap<String, i64> {
        TRACKED_SUPPLIES.iter().map(|k| (k.to_string(), 0)).collect()
    };

    let mut by_donator: BTreeMap<i64, (ContributorRanking, i64, i64)> = BTreeMap::new();
    for entry in entries {
        let (row, rating_sum, rated) = by_donator.entry(entry.donator_id).or_insert_with(|| {
            (
                ContributorRanking {
                    rank: 0,
                    donator_id: entry.donator_id,
                    donator_name: entry.donator_name.clone(),
                    donator_email: entry.donator_email.clone(),
                    total_donations: 0,
                    total_people_helped: 0,
                    average_rating: None,
                    total_ratings: 0,
                    supplies_promised: empty_supplies(),
                    supplies_confirmed: empty_supplies(),
                    supply_fulfillment_rate: 0.0,
                },
                0,
                0,
            )
        });

        row.total_donations += 1;
        row.total_people_helped +=
            SupplyNeeds::count(&entry.supply_needs_fulfilled, "people_count");
        for kind in TRACKED_SUPPLIES {
            if let Some(total) = row.supplies_promised.get_mut(kind) {
                *total += SupplyNeeds::count(&entry.supply_needs_fulfilled, kind);
            }
        }

        if let Some(rating) = entry.rating {
            row.total_ratings += 1;
            if let Some(stars) = rating {
                *rating_sum += stars;
                *rated += 1;
            }
        }
        if let Some(stored) = &entry.supplies_confirmed {
            let confirmed = SuppliesConfirmed::from_stored(stored);
            for kind in TRACKED_SUPPLIES {
                if let Some(total) = row.supplies_confirmed.get_mut(kind) {
                    *total += confirmed.received(kind);
                }
            }
        }
    }

    let mut rows: Vec<ContributorRanking> = by_donator
        .into_values()
        .map(|(mut row, rating_sum, rated)| {
            if rated > 0 {
                row.average_rating = Some(round1(rating_sum as f64 / rated as f64));
            }
            row.supply_fulfillment_rate = fulfillment_rate(
                row.supplies_promised.values().sum(),
                row.supplies_confirmed.values().sum(),
            );
            row
        })
        .collect();

    rows.sort_by(|a, b| {
        b.total_donations
            .cmp(&a.total_donations)
            .then(a.donator_id.cmp(&b.donator_id))
    });
    rows.truncate(RANKING_SIZE);
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i + 1;
    }
    rows
}
