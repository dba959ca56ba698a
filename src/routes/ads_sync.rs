use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use uuid::Uuid;

use crate::AppState;
use crate::handlers::ads_sync::{
    SyncOptions, SyncProgress, SyncRequest,
    backfill::{fill_missing_dates, rolling_refresh_once},
    date_gaps::{DateScope, missing_dates},
    integrations::find_integration,
};
use crate::services::meta_ads::{AdAccount, HierarchyLevel, InsightSource, SyncError};
use crate::utils::cache::CacheKey;
use crate::utils::datetime::days_before;

#[derive(Debug, Deserialize)]
pub struct DateRange {
    pub since: NaiveDate,
    pub until: NaiveDate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncTrigger {
    #[default]
    Manual,
    Auto,
}

#[derive(Debug, Deserialize)]
pub struct SyncBody {
    pub project_id: Uuid,
    pub ad_account_id: String,
    pub date_range: Option<DateRange>,
    #[serde(default)]
    pub trigger: SyncTrigger,
    #[serde(default)]
    pub check_gaps: bool,
}

#[derive(Debug, Deserialize)]
pub struct FillMissingBody {
    pub project_id: Uuid,
    pub ad_account_id: String,
    pub dates: Vec<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct MissingDatesQuery {
    pub project_id: Uuid,
    pub ad_account_id: String,
    pub since: NaiveDate,
    pub until: NaiveDate,
    pub level: Option<HierarchyLevel>,
}

/// Sync one ad account over a date range (default: the last `DEFAULT_SYNC_DAYS` days)
///
/// `trigger: "auto"` is skipped when the integration synced recently.
pub async fn sync_ads(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SyncBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let today = Utc::now().date_naive();
    let (since, until) = match &body.date_range {
        Some(range) => (range.since, range.until),
        None => (
            days_before(today, u64::from(state.env_vars.default_sync_days)),
            today,
        ),
    };

    if body.trigger == SyncTrigger::Auto {
        match find_integration(&state.db_pool, body.project_id).await {
            Ok(Some(integration))
                if integration.has_recent_sync(
                    Utc::now(),
                    state.env_vars.recent_sync_threshold_hours,
                ) =>
            {
                log::info!(
                    "Skipping automatic sync for project {}: last sync at {:?}",
                    body.project_id,
                    integration.last_sync
                );
                return Ok(Json(json!({
                    "success": true,
                    "skipped": true,
                    "reason": "Recently synced",
                    "last_sync": integration.last_sync,
                })));
            }
            Ok(_) => {}
            Err(e) => {
                log::warn!(
                    "Could not read integration for project {}, syncing anyway: {}",
                    body.project_id,
                    e
                );
            }
        }
    }

    let request = SyncRequest::new(body.project_id, body.ad_account_id.clone(), since, until);
    let on_progress = |p: SyncProgress| {
        log::debug!("Sync progress {}%: {}", p.percent, p.message);
    };

    let result = state
        .orchestrator
        .sync(
            &request,
            SyncOptions {
                check_gaps: body.check_gaps,
            },
            &on_progress,
        )
        .await;

    match result.error {
        None => Ok(Json(json!({
            "success": true,
            "message": "Data sync completed successfully",
            "summary": {
                "campaigns": { "inserted": result.stats.campaigns },
                "adsets": { "inserted": result.stats.adsets },
                "ads": { "inserted": result.stats.ads },
            },
            "stats": result.stats,
        }))),
        Some(error) => {
            let mut body = error.response_body();
            body["stats"] = json!(result.stats);
            body["stage"] = json!(result.stage);
            Err((error.status_code(), Json(body)))
        }
    }
}

/// Fetch only the missing levels for an explicit list of dates
pub async fn fill_missing(
    State(state): State<Arc<AppState>>,
    Json(body): Json<FillMissingBody>,
) -> Result<Json<Value>, SyncError> {
    if body.ad_account_id.trim().is_empty() || body.dates.is_empty() {
        return Err(SyncError::InvalidRequest(
            "project_id, ad_account_id, and a non-empty dates array are required".to_string(),
        ));
    }

    let report = fill_missing_dates(
        &state.orchestrator,
        body.project_id,
        &body.ad_account_id,
        &body.dates,
    )
    .await;

    Ok(Json(json!({
        "success": true,
        "message": "Fill missing data operation completed",
        "results": report.results,
    })))
}

/// Run one rolling `[yesterday, today]` refresh over every connected integration
pub async fn cron_sync(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let today = Utc::now().date_naive();

    match rolling_refresh_once(&state.orchestrator, today).await {
        Ok(results) => Ok(Json(json!({
            "success": true,
            "message": "Cron sync completed",
            "results": results,
        }))),
        Err(e) => {
            log::error!("Cron sync failed to list integrations: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": format!("Failed to fetch integrations: {}", e),
                })),
            ))
        }
    }
}

pub async fn get_missing_dates(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MissingDatesQuery>,
) -> Result<Json<Value>, SyncError> {
    if params.since > params.until {
        return Err(SyncError::InvalidRequest(
            "since must not be after until".to_string(),
        ));
    }

    let scope = params
        .level
        .map(DateScope::Level)
        .unwrap_or(DateScope::AllLevels);

    let dates = missing_dates(
        &state.db_pool,
        params.project_id,
        &params.ad_account_id,
        params.since,
        params.until,
        scope,
    )
    .await;

    Ok(Json(json!({
        "missing_dates": dates,
        "count": dates.len(),
    })))
}

/// Ad accounts visible to the configured token, cached for five minutes
pub async fn list_ad_accounts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let orchestrator = &state.orchestrator;
    let accounts: Vec<AdAccount> = state
        .cache
        .cached(
            CacheKey::new("ad-accounts").with("me").build(),
            async {
                orchestrator
                    .source()
                    .list_ad_accounts(orchestrator.credentials())
                    .await
            },
        )
        .await
        .map_err(|(status, message)| {
            (
                status,
                Json(json!({ "success": false, "error": message })),
            )
        })?;

    Ok(Json(json!({ "accounts": accounts })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_body_defaults() {
        let body: SyncBody = serde_json::from_value(json!({
            "project_id": "6f1c2b8e-0a43-4a8f-9d61-0e6f4a1f7b21",
            "ad_account_id": "act_1"
        }))
        .unwrap();

        assert_eq!(body.trigger, SyncTrigger::Manual);
        assert!(!body.check_gaps);
        assert!(body.date_range.is_none());
    }

    #[test]
    fn test_sync_body_with_range_and_auto_trigger() {
        let body: SyncBody = serde_json::from_value(json!({
            "project_id": "6f1c2b8e-0a43-4a8f-9d61-0e6f4a1f7b21",
            "ad_account_id": "act_1",
            "date_range": {"since": "2024-01-01", "until": "2024-01-31"},
            "trigger": "auto"
        }))
        .unwrap();

        assert_eq!(body.trigger, SyncTrigger::Auto);
        let range = body.date_range.unwrap();
        assert_eq!(range.since, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }
}
