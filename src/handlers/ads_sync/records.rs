use chrono::NaiveDate;
use serde::Serialize;

use super::action_metrics::{ConversionMetrics, extract, parse_metric_f64, parse_metric_i64};
use crate::services::meta_ads::types::{HierarchyLevel, RawEntity, RawEntityInsight};

/// One persisted row: an entity's metrics for a single day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityInsightRecord {
    pub level: HierarchyLevel,
    pub id: String,
    pub name: Option<String>,
    pub status: Option<String>,
    pub objective: Option<String>,
    /// Owning campaign for ad sets, owning ad set for ads
    pub parent_id: Option<String>,
    pub date: NaiveDate,
    pub daily_budget: Option<f64>,
    pub lifetime_budget: Option<f64>,
    pub spend: f64,
    pub impressions: i64,
    pub clicks: i64,
    pub ctr: f64,
    pub cpc: f64,
    pub cpm: f64,
    pub reach: i64,
    pub frequency: f64,
    #[serde(flatten)]
    pub conversions: ConversionMetrics,
}

/// Budgets arrive in minor currency units
pub fn budget_from_cents(value: Option<&str>) -> Option<f64> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(|cents| cents / 100.0)
}

fn objective_for(level: HierarchyLevel, entity: &RawEntity) -> Option<String> {
    match level {
        HierarchyLevel::Campaign => entity.objective.clone(),
        // Ad sets carry no objective of their own; their optimization goal plays that role
        HierarchyLevel::AdSet => entity
            .optimization_goal
            .clone()
            .or_else(|| entity.objective.clone()),
        HierarchyLevel::Ad => entity.objective.clone(),
    }
}

fn parent_for(level: HierarchyLevel, entity: &RawEntity) -> Option<String> {
    match level {
        HierarchyLevel::Campaign => None,
        HierarchyLevel::AdSet => entity.campaign_id.clone(),
        HierarchyLevel::Ad => entity.adset_id.clone(),
    }
}

/// Flatten fetched entity series into one record per entity-day
///
/// Days without a parseable `date_start` are dropped.
pub fn build_records(raw: &[RawEntityInsight]) -> Vec<EntityInsightRecord> {
    let mut records = Vec::with_capacity(raw.iter().map(|r| r.days.len()).sum());

    for insight in raw {
        let level = insight.level;
        let entity = &insight.entity;
        let (daily_budget, lifetime_budget) = if level.has_budget() {
            (
                budget_from_cents(entity.daily_budget.as_deref()),
                budget_from_cents(entity.lifetime_budget.as_deref()),
            )
        } else {
            (None, None)
        };
        let objective = objective_for(level, entity);
        let parent_id = parent_for(level, entity);

        for day in &insight.days {
            let date = match day
                .date_start
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            {
                Some(date) => date,
                None => {
                    log::warn!(
                        "Skipping {} {} insight row with invalid date_start {:?}",
                        level,
                        entity.id,
                        day.date_start
                    );
                    continue;
                }
            };

            records.push(EntityInsightRecord {
                level,
                id: entity.id.clone(),
                name: entity.name.clone(),
                status: entity.status.clone(),
                objective: objective.clone(),
                parent_id: parent_id.clone(),
                date,
                daily_budget,
                lifetime_budget,
                spend: parse_metric_f64(day.spend.as_deref()),
                impressions: parse_metric_i64(day.impressions.as_deref()),
                clicks: parse_metric_i64(day.clicks.as_deref()),
                ctr: parse_metric_f64(day.ctr.as_deref()),
                cpc: parse_metric_f64(day.cpc.as_deref()),
                cpm: parse_metric_f64(day.cpm.as_deref()),
                reach: parse_metric_i64(day.reach.as_deref()),
                frequency: parse_metric_f64(day.frequency.as_deref()),
                conversions: extract(day),
            });
        }
    }

    records
}
