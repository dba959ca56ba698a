//! Scheduled rolling refresh and targeted per-date fill
//!
//! The rolling refresh re-syncs `[yesterday, today]` for every connected
//! integration, regardless of what is already stored. The targeted fill checks
//! each requested date level by level and only fetches what is absent.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::date_gaps::{LevelPresence, levels_present_on};
use super::integrations::{list_connected_integrations, update_last_sync};
use super::orchestrator::{SyncOptions, SyncOrchestrator, SyncRequest, SyncStats, no_progress};
use crate::services::meta_ads::{HierarchyLevel, InsightSource};

/// Delay before the first refresh so the server can finish starting
const INITIAL_DELAY_SECS: u64 = 5;

/// `[yesterday, today]`
pub fn rolling_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    (today.pred_opt().unwrap_or(today), today)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrationSyncOutcome {
    pub project_id: Uuid,
    pub ad_account_id: String,
    pub success: bool,
    pub stats: SyncStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One pass over every connected facebook integration
///
/// A failing integration is recorded and the loop moves on. Only a failure to
/// list integrations is returned as an error.
pub async fn rolling_refresh_once<S: InsightSource>(
    orchestrator: &SyncOrchestrator<S>,
    today: NaiveDate,
) -> Result<Vec<IntegrationSyncOutcome>, sqlx::Error> {
    let (since, until) = rolling_window(today);
    let integrations = list_connected_integrations(orchestrator.pool()).await?;

    if integrations.is_empty() {
        log::info!("No connected facebook integrations to refresh");
        return Ok(Vec::new());
    }

    log::info!(
        "Rolling refresh of {} integrations for {} to {}",
        integrations.len(),
        since,
        until
    );

    let mut outcomes = Vec::with_capacity(integrations.len());
    for integration in integrations {
        let Some(ad_account_id) = integration.ad_account_id() else {
            log::warn!(
                "Could not extract ad account id from account_name {:?} (project {})",
                integration.account_name,
                integration.project_id
            );
            continue;
        };

        let request = SyncRequest::new(integration.project_id, ad_account_id.clone(), since, until);
        let result = orchestrator
            .sync(&request, SyncOptions { check_gaps: false }, &no_progress)
            .await;

        if let Some(e) = &result.error {
            log::error!(
                "Rolling refresh failed for project {} / {}: {}",
                integration.project_id,
                ad_account_id,
                e
            );
        }

        outcomes.push(IntegrationSyncOutcome {
            project_id: integration.project_id,
            ad_account_id,
            success: result.success,
            stats: result.stats,
            error: result.error.map(|e| e.to_string()),
        });
    }

    Ok(outcomes)
}

/// Background loop running [`rolling_refresh_once`] every `interval_secs`
///
/// An interval of 0 disables the service.
pub async fn run_rolling_refresh_service<S: InsightSource + 'static>(
    orchestrator: Arc<SyncOrchestrator<S>>,
    interval_secs: u64,
) {
    if interval_secs == 0 {
        log::info!("Rolling refresh service disabled (interval is 0)");
        return;
    }

    log::info!(
        "Starting rolling refresh service (interval: {} seconds)",
        interval_secs
    );

    tokio::time::sleep(Duration::from_secs(INITIAL_DELAY_SECS)).await;

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let today = Utc::now().date_naive();
        match rolling_refresh_once(&orchestrator, today).await {
            Ok(outcomes) => {
                let failed = outcomes.iter().filter(|o| !o.success).count();
                log::info!(
                    "Rolling refresh finished: {} integrations, {} failed",
                    outcomes.len(),
                    failed
                );
            }
            Err(e) => {
                log::error!("Failed to list integrations for rolling refresh: {}", e);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LevelFillResult {
    pub fetched: bool,
    /// Rows for this level already existed
    pub skipped: bool,
    pub inserted: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateFillResult {
    pub date: NaiveDate,
    pub success: bool,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub campaigns: LevelFillResult,
    pub adsets: LevelFillResult,
    pub ads: LevelFillResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DateFillResult {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            success: true,
            skipped: false,
            reason: None,
            campaigns: LevelFillResult::default(),
            adsets: LevelFillResult::default(),
            ads: LevelFillResult::default(),
            error: None,
        }
    }

    fn level_mut(&mut self, level: HierarchyLevel) -> &mut LevelFillResult {
        match level {
            HierarchyLevel::Campaign => &mut self.campaigns,
            HierarchyLevel::AdSet => &mut self.adsets,
            HierarchyLevel::Ad => &mut self.ads,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FillMissingReport {
    pub results: Vec<DateFillResult>,
}

/// Fetch only the levels that have no rows, date by date
pub async fn fill_missing_dates<S: InsightSource>(
    orchestrator: &SyncOrchestrator<S>,
    project_id: Uuid,
    ad_account_id: &str,
    dates: &[NaiveDate],
) -> FillMissingReport {
    let pool = orchestrator.pool();
    let mut report = FillMissingReport::default();

    for &date in dates {
        let presence = match levels_present_on(pool, project_id, ad_account_id, date).await {
            Ok(presence) => presence,
            Err(e) => {
                log::warn!(
                    "Failed to check stored levels for {} ({} / {}), fetching all levels: {}",
                    date,
                    project_id,
                    ad_account_id,
                    e
                );
                LevelPresence::default()
            }
        };

        let mut result = DateFillResult::new(date);

        if presence.is_complete() {
            log::info!("Data already exists for {}, skipping", date);
            result.skipped = true;
            result.reason = Some("Data already exists for all levels".to_string());
            for level in HierarchyLevel::ALL {
                result.level_mut(level).skipped = true;
            }
            report.results.push(result);
            continue;
        }

        log::info!(
            "Missing levels for {}: {:?}",
            date,
            presence.missing_levels()
        );

        for level in HierarchyLevel::ALL {
            if presence.has(level) {
                result.level_mut(level).skipped = true;
                continue;
            }

            match orchestrator
                .sync_level(project_id, ad_account_id, level, date, date)
                .await
            {
                Ok(inserted) => {
                    let entry = result.level_mut(level);
                    entry.fetched = true;
                    entry.inserted = inserted;
                }
                Err(e) => {
                    log::error!("Failed to fill {} data for {}: {}", level, date, e);
                    result.success = false;
                    result.error = Some(e.to_string());
                    break;
                }
            }
        }

        report.results.push(result);
    }

    if let Err(e) = update_last_sync(pool, project_id).await {
        log::warn!(
            "Failed to update last_sync for project {}: {}",
            project_id,
            e
        );
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_window_is_two_days() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(
            rolling_window(today),
            (NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(), today)
        );
    }

    #[test]
    fn test_skipped_date_serialization() {
        let mut result = DateFillResult::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        result.skipped = true;
        result.reason = Some("Data already exists for all levels".to_string());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["date"], "2024-01-01");
        assert_eq!(json["skipped"], true);
        assert!(json.get("error").is_none());
        assert_eq!(json["campaigns"]["inserted"], 0);
    }
}
