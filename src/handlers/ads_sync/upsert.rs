//! Idempotent batch persistence of entity insight records
//!
//! Rows are keyed on `(id, date, ad_account_id, project_id)`. Re-syncing a day
//! overwrites every metric column in place.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use super::records::EntityInsightRecord;
use crate::services::meta_ads::{HierarchyLevel, SyncError};

/// Rows per INSERT statement
pub const UPSERT_CHUNK_SIZE: usize = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertStats {
    pub count: usize,
}

/// Data columns in bind order, with their Postgres array element type
fn data_columns(level: HierarchyLevel) -> Vec<(&'static str, &'static str)> {
    let mut columns = vec![
        ("id", "text"),
        ("date", "date"),
        ("name", "text"),
        ("status", "text"),
        ("objective", "text"),
        ("daily_budget", "float8"),
        ("lifetime_budget", "float8"),
        ("spend", "float8"),
        ("impressions", "int8"),
        ("clicks", "int8"),
        ("ctr", "float8"),
        ("cpc", "float8"),
        ("cpm", "float8"),
        ("reach", "int8"),
        ("frequency", "float8"),
        ("view_content", "int8"),
        ("cost_per_view_content", "float8"),
        ("add_to_cart", "int8"),
        ("cost_per_add_to_cart", "float8"),
        ("initiate_checkout", "int8"),
        ("cost_per_initiate_checkout", "float8"),
        ("purchase", "int8"),
        ("purchase_value", "float8"),
        ("cost_per_purchase", "float8"),
        ("roas", "float8"),
    ];
    if let Some(parent) = level.parent_column() {
        columns.push((parent, "text"));
    }
    columns
}

/// Builds the UNNEST upsert statement for one level
///
/// Parameters `$1..$n` are the column arrays, followed by the ad account id and
/// the project id applied to every row.
pub fn build_upsert_sql(level: HierarchyLevel) -> String {
    let columns = data_columns(level);
    let n = columns.len();

    let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
    let arrays: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, (_, ty))| format!("${}::{}[]", i + 1, ty))
        .collect();
    let updates: Vec<String> = columns
        .iter()
        .filter(|(name, _)| !matches!(*name, "id" | "date"))
        .map(|(name, _)| format!("{name} = EXCLUDED.{name}"))
        .collect();

    format!(
        r#"
        INSERT INTO {table} ({names}, ad_account_id, project_id)
        SELECT u.*, ${account}::text, ${project}::uuid
        FROM UNNEST({arrays}) AS u
        ON CONFLICT (id, date, ad_account_id, project_id) DO UPDATE SET
            {updates},
            updated_at = NOW()
        "#,
        table = level.table_name(),
        names = names.join(", "),
        account = n + 1,
        project = n + 2,
        arrays = arrays.join(", "),
        updates = updates.join(",\n            "),
    )
}

/// Collapse repeated `(id, date)` keys, keeping the last occurrence
///
/// Postgres refuses to touch the same row twice in one `ON CONFLICT` statement.
pub fn dedupe_by_natural_key(records: &[EntityInsightRecord]) -> Vec<&EntityInsightRecord> {
    let mut positions: HashMap<(&str, NaiveDate), usize> = HashMap::new();
    let mut deduped: Vec<&EntityInsightRecord> = Vec::with_capacity(records.len());

    for record in records {
        match positions.get(&(record.id.as_str(), record.date)) {
            Some(&pos) => deduped[pos] = record,
            None => {
                positions.insert((record.id.as_str(), record.date), deduped.len());
                deduped.push(record);
            }
        }
    }

    deduped
}

/// Upsert one level's records inside a single transaction
///
/// A failure rolls back this level only; levels committed earlier are kept.
pub async fn upsert_records(
    pool: &PgPool,
    level: HierarchyLevel,
    records: &[EntityInsightRecord],
    project_id: Uuid,
    ad_account_id: &str,
) -> Result<UpsertStats, SyncError> {
    if records.is_empty() {
        log::info!("No {} records to save", level);
        return Ok(UpsertStats::default());
    }

    let rows = dedupe_by_natural_key(records);
    if rows.len() < records.len() {
        log::warn!(
            "Collapsed {} duplicate {} rows before saving",
            records.len() - rows.len(),
            level
        );
    }

    let persist_err = |e: sqlx::Error| SyncError::Persist {
        level,
        message: e.to_string(),
    };

    let sql = build_upsert_sql(level);
    let mut tx = pool.begin().await.map_err(persist_err)?;

    for chunk in rows.chunks(UPSERT_CHUNK_SIZE) {
        let mut query = sqlx::query(&sql)
            .bind(chunk.iter().map(|r| r.id.clone()).collect::<Vec<_>>())
            .bind(chunk.iter().map(|r| r.date).collect::<Vec<_>>())
            .bind(chunk.iter().map(|r| r.name.clone()).collect::<Vec<_>>())
            .bind(chunk.iter().map(|r| r.status.clone()).collect::<Vec<_>>())
            .bind(chunk.iter().map(|r| r.objective.clone()).collect::<Vec<_>>())
            .bind(chunk.iter().map(|r| r.daily_budget).collect::<Vec<_>>())
            .bind(chunk.iter().map(|r| r.lifetime_budget).collect::<Vec<_>>())
            .bind(chunk.iter().map(|r| r.spend).collect::<Vec<_>>())
            .bind(chunk.iter().map(|r| r.impressions).collect::<Vec<_>>())
            .bind(chunk.iter().map(|r| r.clicks).collect::<Vec<_>>())
            .bind(chunk.iter().map(|r| r.ctr).collect::<Vec<_>>())
            .bind(chunk.iter().map(|r| r.cpc).collect::<Vec<_>>())
            .bind(chunk.iter().map(|r| r.cpm).collect::<Vec<_>>())
            .bind(chunk.iter().map(|r| r.reach).collect::<Vec<_>>())
            .bind(chunk.iter().map(|r| r.frequency).collect::<Vec<_>>())
            .bind(chunk.iter().map(|r| r.conversions.view_content).collect::<Vec<_>>())
            .bind(
                chunk
                    .iter()
                    .map(|r| r.conversions.cost_per_view_content)
                    .collect::<Vec<_>>(),
            )
            .bind(chunk.iter().map(|r| r.conversions.add_to_cart).collect::<Vec<_>>())
            .bind(
                chunk
                    .iter()
                    .map(|r| r.conversions.cost_per_add_to_cart)
                    .collect::<Vec<_>>(),
            )
            .bind(
                chunk
                    .iter()
                    .map(|r| r.conversions.initiate_checkout)
                    .collect::<Vec<_>>(),
            )
            .bind(
                chunk
                    .iter()
                    .map(|r| r.conversions.cost_per_initiate_checkout)
                    .collect::<Vec<_>>(),
            )
            .bind(chunk.iter().map(|r| r.conversions.purchase).collect::<Vec<_>>())
            .bind(
                chunk
                    .iter()
                    .map(|r| r.conversions.purchase_value)
                    .collect::<Vec<_>>(),
            )
            .bind(
                chunk
                    .iter()
                    .map(|r| r.conversions.cost_per_purchase)
                    .collect::<Vec<_>>(),
            )
            .bind(chunk.iter().map(|r| r.conversions.roas).collect::<Vec<_>>());

        if level.parent_column().is_some() {
            query = query.bind(chunk.iter().map(|r| r.parent_id.clone()).collect::<Vec<_>>());
        }

        query
            .bind(ad_account_id)
            .bind(project_id)
            .execute(&mut *tx)
            .await
            .map_err(persist_err)?;
    }

    tx.commit().await.map_err(persist_err)?;

    log::info!(
        "Saved {} {} rows for project {} / {}",
        rows.len(),
        level,
        project_id,
        ad_account_id
    );

    Ok(UpsertStats { count: rows.len() })
}
