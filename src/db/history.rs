// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Donation history, ratings and the contributor ranking.

use super::{fetch_all, fetch_page, tables, Conditions, Db};
use crate::error::AppError;
use crate::models::history::{rank_contributors, DonationInfo, RankingInput};
use crate::models::{
    full_name, Acknowledgment, ContributorRanking, DonationHistory, DonationRating,
    SuppliesConfirmed,
};
use crate::pagination::{PageRequest, Paginated};
use crate::time_utils;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;

const HISTORY_COLUMNS: &str = "h.id, h.donator_id, u.first_name, u.last_name, u.email, \
     h.affected_first_name, h.affected_last_name, h.affected_phone, h.latitude, h.longitude, \
     h.supply_needs_fulfilled, h.qr_code, h.donated_at, h.notes";

const HISTORY_ORDER: &str = "h.donated_at DESC, h.id DESC";

const RATING_COLUMNS: &str = "r.id, r.donation_history_id, u.first_name, u.last_name, u.email, \
     h.donated_at, h.supply_needs_fulfilled, r.rating, r.comment, r.supplies_confirmed, \
     r.rated_at, r.session_id";

const RATING_ORDER: &str = "r.rated_at DESC, r.id DESC";

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<DonationHistory> {
    let first: String = row.get(2)?;
    let last: String = row.get(3)?;
    Ok(DonationHistory {
        id: row.get(0)?,
        donator: row.get(1)?,
        donator_name: full_name(&first, &last).unwrap_or_default(),
        donator_email: row.get(4)?,
        affected_first_name: row.get(5)?,
        affected_last_name: row.get(6)?,
        affected_phone: row.get(7)?,
        latitude: row.get(8)?,
        longitude: row.get(9)?,
        supply_needs_fulfilled: row.get(10)?,
        qr_code: row.get(11)?,
        donated_at: row.get(12)?,
        notes: row.get(13)?,
    })
}

fn rating_from_row(row: &Row<'_>) -> rusqlite::Result<DonationRating> {
    let first: String = row.get(2)?;
    let last: String = row.get(3)?;
    Ok(DonationRating {
        id: row.get(0)?,
        donation_history: row.get(1)?,
        donation_info: DonationInfo {
            donator_name: full_name(&first, &last).unwrap_or_default(),
            donator_email: row.get(4)?,
            donated_at: row.get(5)?,
            supply_needs_fulfilled: row.get(6)?,
        },
        rating: row.get(7)?,
        comment: row.get(8)?,
        supplies_confirmed: row.get(9)?,
        rated_at: row.get(10)?,
        session_id: row.get(11)?,
    })
}

fn history_from() -> String {
    format!(
        "FROM {} h JOIN {} u ON u.id = h.donator_id",
        tables::DONATION_HISTORY,
        tables::USERS
    )
}

fn rating_from() -> String {
    format!(
        "FROM {} r JOIN {} h ON h.id = r.donation_history_id JOIN {} u ON u.id = h.donator_id",
        tables::DONATION_RATINGS,
        tables::DONATION_HISTORY,
        tables::USERS
    )
}

pub(crate) fn load_history(conn: &Connection, id: i64) -> rusqlite::Result<Option<DonationHistory>> {
    conn.query_row(
        &format!("SELECT {} {} WHERE h.id = ?1", HISTORY_COLUMNS, history_from()),
        params![id],
        history_from_row,
    )
    .optional()
}

fn load_rating(conn: &Connection, id: i64) -> rusqlite::Result<Option<DonationRating>> {
    conn.query_row(
        &format!("SELECT {} {} WHERE r.id = ?1", RATING_COLUMNS, rating_from()),
        params![id],
        rating_from_row,
    )
    .optional()
}

/// A rating submitted by an affected person.
#[derive(Debug, Clone)]
pub struct NewRating {
    pub donation_history_id: i64,
    pub rating: Option<i64>,
    pub comment: String,
    pub supplies_confirmed: Option<SuppliesConfirmed>,
    pub session_id: String,
}

impl Db {
    pub async fn list_donation_history(
        &self,
        page: PageRequest,
    ) -> Result<Paginated<DonationHistory>, AppError> {
        self.call(move |conn| {
            fetch_page(
                conn,
                HISTORY_COLUMNS,
                &history_from(),
                &Conditions::default(),
                HISTORY_ORDER,
                &page,
                history_from_row,
            )
        })
        .await
    }

    pub async fn get_donation_history(&self, id: i64) -> Result<Option<DonationHistory>, AppError> {
        self.call(move |conn| Ok(load_history(conn, id)?)).await
    }

    /// Every QR-confirmed donation made by `donator_id`, newest first.
    pub async fn donations_by_donator(
        &self,
        donator_id: i64,
    ) -> Result<Vec<DonationHistory>, AppError> {
        self.call(move |conn| {
            let mut conditions = Conditions::default();
            conditions.push("h.donator_id = ?", donator_id);
            fetch_all(
                conn,
                HISTORY_COLUMNS,
                &history_from(),
                &conditions,
                HISTORY_ORDER,
                history_from_row,
            )
        })
        .await
    }

    /// A donator's donations joined with whatever the recipients confirmed.
    pub async fn acknowledgments(&self, donator_id: i64) -> Result<Vec<Acknowledgment>, AppError> {
        self.call(move |conn| {
            let mut conditions = Conditions::default();
            conditions.push("h.donator_id = ?", donator_id);

            let histories = fetch_all(
                conn,
                HISTORY_COLUMNS,
                &history_from(),
                &conditions,
                HISTORY_ORDER,
                history_from_row,
            )?;
            let ratings: HashMap<i64, DonationRating> = fetch_all(
                conn,
                RATING_COLUMNS,
                &rating_from(),
                &conditions,
                RATING_ORDER,
                rating_from_row,
            )?
            .into_iter()
            .map(|r| (r.donation_history, r))
            .collect();

            Ok(histories
                .into_iter()
                .map(|h| {
                    let rating = ratings.get(&h.id);
                    Acknowledgment::new(h, rating)
                })
                .collect())
        })
        .await
    }

    /// Top donators by number of QR-confirmed donations.
    pub async fn contributors_ranking(&self) -> Result<Vec<ContributorRanking>, AppError> {
        self.call(|conn| {
            let sql = format!(
                "SELECT h.donator_id, u.first_name, u.last_name, u.email, \
                 h.supply_needs_fulfilled, r.id, r.rating, r.supplies_confirmed \
                 FROM {} h JOIN {} u ON u.id = h.donator_id \
                 LEFT JOIN {} r ON r.donation_history_id = h.id",
                tables::DONATION_HISTORY,
                tables::USERS,
                tables::DONATION_RATINGS
            );
            let mut stmt = conn.prepare(&sql)?;
            let entries = stmt
                .query_map([], |row| {
                    let first: String = row.get(1)?;
                    let last: String = row.get(2)?;
                    let rating_id: Option<i64> = row.get(5)?;
                    let rating: Option<i64> = row.get(6)?;
                    Ok(RankingInput {
                        donator_id: row.get(0)?,
                        donator_name: full_name(&first, &last).unwrap_or_default(),
                        donator_email: row.get(3)?,
                        supply_needs_fulfilled: row.get(4)?,
                        rating: rating_id.map(|_| rating),
                        supplies_confirmed: row.get(7)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rank_contributors(entries))
        })
        .await
    }

    pub async fn list_ratings(
        &self,
        page: PageRequest,
    ) -> Result<Paginated<DonationRating>, AppError> {
        self.call(move |conn| {
            fetch_page(
                conn,
                RATING_COLUMNS,
                &rating_from(),
                &Conditions::default(),
                RATING_ORDER,
                &page,
                rating_from_row,
            )
        })
        .await
    }

    pub async fn get_rating(&self, id: i64) -> Result<Option<DonationRating>, AppError> {
        self.call(move |conn| Ok(load_rating(conn, id)?)).await
    }

    /// Store a rating. Confirmed supplies replace what the history entry
    /// recorded as fulfilled.
    pub async fn create_rating(&self, new: NewRating) -> Result<DonationRating, AppError> {
        self.call(move |conn| {
            let tx = conn.transaction()?;

            if load_history(&tx, new.donation_history_id)?.is_none() {
                return Err(AppError::NotFound("Donation history not found".to_string()));
            }
            let exists: bool = tx.query_row(
                &format!(
                    "SELECT EXISTS(SELECT 1 FROM {} WHERE donation_history_id = ?1)",
                    tables::DONATION_RATINGS
                ),
                params![new.donation_history_id],
                |row| row.get(0),
            )?;
            if exists {
                return Err(AppError::BadRequest(
                    "Rating already exists for this donation".to_string(),
                ));
            }

            let confirmed = match &new.supplies_confirmed {
                Some(c) => serde_json::to_value(c).map_err(anyhow::Error::from)?,
                None => serde_json::json!({}),
            };
            tx.execute(
                &format!(
                    "INSERT INTO {} (donation_history_id, rating, comment, supplies_confirmed, \
                     rated_at, session_id) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    tables::DONATION_RATINGS
                ),
                params![
                    new.donation_history_id,
                    new.rating,
                    new.comment,
                    confirmed,
                    time_utils::now(),
                    new.session_id
                ],
            )?;
            let id = tx.last_insert_rowid();

            if let Some(c) = &new.supplies_confirmed {
                tx.execute(
                    &format!(
                        "UPDATE {} SET supply_needs_fulfilled = ?1 WHERE id = ?2",
                        tables::DONATION_HISTORY
                    ),
                    params![c.as_fulfilled(), new.donation_history_id],
                )?;
            }

            let rating = load_rating(&tx, id)?.ok_or_else(AppError::not_found)?;
            tx.commit()?;
            Ok(rating)
        })
        .await
    }
}
