//! Detection of calendar days without stored insight rows

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::services::meta_ads::HierarchyLevel;
pub use crate::utils::datetime::generate_date_range;

/// Which tables a date must appear in to count as present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateScope {
    Level(HierarchyLevel),
    /// Present only when every level has at least one row for the date
    AllLevels,
}

/// Dates with at least one stored row for the scope
async fn stored_dates_for_level(
    pool: &PgPool,
    project_id: Uuid,
    ad_account_id: &str,
    level: HierarchyLevel,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<BTreeSet<NaiveDate>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT DISTINCT date
        FROM {}
        WHERE project_id = $1
          AND ad_account_id = $2
          AND date BETWEEN $3 AND $4
        "#,
        level.table_name()
    );

    let rows: Vec<(NaiveDate,)> = sqlx::query_as(&sql)
        .bind(project_id)
        .bind(ad_account_id)
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(|(d,)| d).collect())
}

pub async fn stored_dates(
    pool: &PgPool,
    project_id: Uuid,
    ad_account_id: &str,
    start: NaiveDate,
    end: NaiveDate,
    scope: DateScope,
) -> Result<BTreeSet<NaiveDate>, sqlx::Error> {
    match scope {
        DateScope::Level(level) => {
            stored_dates_for_level(pool, project_id, ad_account_id, level, start, end).await
        }
        DateScope::AllLevels => {
            let mut present: Option<BTreeSet<NaiveDate>> = None;
            for level in HierarchyLevel::ALL {
                let dates =
                    stored_dates_for_level(pool, project_id, ad_account_id, level, start, end)
                        .await?;
                present = Some(match present {
                    None => dates,
                    Some(acc) => acc.intersection(&dates).copied().collect(),
                });
            }
            Ok(present.unwrap_or_default())
        }
    }
}

/// Sorted dates of `[start, end]` not in `present`
///
/// `today` is always reported as missing when it falls inside the range, since
/// the current day's numbers are still moving.
pub fn compute_missing_dates(
    start: NaiveDate,
    end: NaiveDate,
    present: &BTreeSet<NaiveDate>,
    today: NaiveDate,
) -> Vec<NaiveDate> {
    generate_date_range(start, end)
        .into_iter()
        .filter(|d| *d == today || !present.contains(d))
        .collect()
}

/// Dates in `[start, end]` lacking stored rows for `scope`
///
/// Never fails: if the store cannot be queried the whole range is returned so
/// the caller re-fetches everything.
pub async fn missing_dates(
    pool: &PgPool,
    project_id: Uuid,
    ad_account_id: &str,
    start: NaiveDate,
    end: NaiveDate,
    scope: DateScope,
) -> Vec<NaiveDate> {
    let today = Utc::now().date_naive();
    missing_dates_at(pool, project_id, ad_account_id, start, end, scope, today).await
}

pub async fn missing_dates_at(
    pool: &PgPool,
    project_id: Uuid,
    ad_account_id: &str,
    start: NaiveDate,
    end: NaiveDate,
    scope: DateScope,
    today: NaiveDate,
) -> Vec<NaiveDate> {
    match stored_dates(pool, project_id, ad_account_id, start, end, scope).await {
        Ok(present) => {
            let missing = compute_missing_dates(start, end, &present, today);
            log::info!(
                "Gap check for project {} / {}: {} of {} dates missing",
                project_id,
                ad_account_id,
                missing.len(),
                generate_date_range(start, end).len()
            );
            missing
        }
        Err(e) => {
            log::warn!(
                "Failed to read stored dates for project {} / {}, treating whole range as missing: {}",
                project_id,
                ad_account_id,
                e
            );
            generate_date_range(start, end)
        }
    }
}

/// Per-level existence of rows for a single date
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LevelPresence {
    pub campaign: bool,
    pub adset: bool,
    pub ad: bool,
}

impl LevelPresence {
    pub fn has(&self, level: HierarchyLevel) -> bool {
        match level {
            HierarchyLevel::Campaign => self.campaign,
            HierarchyLevel::AdSet => self.adset,
            HierarchyLevel::Ad => self.ad,
        }
    }

    fn set(&mut self, level: HierarchyLevel, present: bool) {
        match level {
            HierarchyLevel::Campaign => self.campaign = present,
            HierarchyLevel::AdSet => self.adset = present,
            HierarchyLevel::Ad => self.ad = present,
        }
    }

    pub fn missing_levels(&self) -> Vec<HierarchyLevel> {
        HierarchyLevel::ALL
            .into_iter()
            .filter(|l| !self.has(*l))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.campaign && self.adset && self.ad
    }
}

pub async fn levels_present_on(
    pool: &PgPool,
    project_id: Uuid,
    ad_account_id: &str,
    date: NaiveDate,
) -> Result<LevelPresence, sqlx::Error> {
    let mut presence = LevelPresence::default();

    for level in HierarchyLevel::ALL {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE project_id = $1 AND ad_account_id = $2 AND date = $3)",
            level.table_name()
        );
        let (exists,): (bool,) = sqlx::query_as(&sql)
            .bind(project_id)
            .bind(ad_account_id)
            .bind(date)
            .fetch_one(pool)
            .await?;
        presence.set(level, exists);
    }

    Ok(presence)
}
