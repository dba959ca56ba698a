#![allow(dead_code)]

use ads_sync::services::meta_ads::{
    AdAccount, CredentialsProvider, HierarchyLevel, InsightSource, RawEntity, RawEntityInsight,
    RawInsightDay, SyncError,
};
use ads_sync::utils::env::EnvVars;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Mutex, Once};
use uuid::Uuid;

static INIT: Once = Once::new();

/// Load test environment variables. Safe to call multiple times - only runs once.
/// Loads .env first, then .env.test which overrides (e.g., DATABASE_URL for test database).
pub fn load_test_env() {
    INIT.call_once(|| {
        dotenvy::from_filename(".env").ok();
        dotenvy::from_filename_override(".env.test").ok();
    });
}

/// Configuration pointing the Graph API client at `graph_base_url`
pub fn test_env_vars(graph_base_url: &str) -> EnvVars {
    let vars: HashMap<&str, String> = HashMap::from([
        ("DATABASE_URL", "postgres://unused/ads_sync_test".to_string()),
        ("FACEBOOK_PERMANENT_TOKEN", "test-token".to_string()),
        ("META_GRAPH_API_BASE_URL", graph_base_url.to_string()),
        ("CRON_SYNC_INTERVAL_SECONDS", "0".to_string()),
        ("META_HTTP_TIMEOUT_SECONDS", "5".to_string()),
    ]);
    EnvVars::from_lookup(|name| vars.get(name).cloned()).expect("test env vars are complete")
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid test date")
}

/// One entity with a single day of insights
pub fn entity_day(
    level: HierarchyLevel,
    id: &str,
    parent_id: Option<&str>,
    day: &str,
    spend: &str,
) -> RawEntityInsight {
    let mut entity = RawEntity {
        id: id.to_string(),
        name: Some(format!("{} {}", level.label(), id)),
        status: Some("ACTIVE".to_string()),
        ..Default::default()
    };
    match level {
        HierarchyLevel::Campaign => {
            entity.objective = Some("OUTCOME_SALES".to_string());
            entity.daily_budget = Some("5000".to_string());
        }
        HierarchyLevel::AdSet => {
            entity.optimization_goal = Some("OFFSITE_CONVERSIONS".to_string());
            entity.campaign_id = parent_id.map(str::to_string);
        }
        HierarchyLevel::Ad => {
            entity.adset_id = parent_id.map(str::to_string);
        }
    }

    RawEntityInsight {
        level,
        entity,
        days: vec![RawInsightDay {
            date_start: Some(day.to_string()),
            spend: Some(spend.to_string()),
            impressions: Some("1000".to_string()),
            clicks: Some("25".to_string()),
            ..Default::default()
        }],
    }
}

/// In-memory insight source returning canned data per level
///
/// Every `fetch_level` call is recorded so tests can assert which windows
/// were requested.
#[derive(Default)]
pub struct StubSource {
    responses: HashMap<HierarchyLevel, Result<Vec<RawEntityInsight>, SyncError>>,
    pub calls: Mutex<Vec<(HierarchyLevel, NaiveDate, NaiveDate)>>,
}

impl StubSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(
        mut self,
        level: HierarchyLevel,
        response: Result<Vec<RawEntityInsight>, SyncError>,
    ) -> Self {
        self.responses.insert(level, response);
        self
    }

    pub fn calls(&self) -> Vec<(HierarchyLevel, NaiveDate, NaiveDate)> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl InsightSource for StubSource {
    fn source_name(&self) -> &'static str {
        "stub"
    }

    async fn fetch_level(
        &self,
        _credentials: &dyn CredentialsProvider,
        _ad_account_id: &str,
        level: HierarchyLevel,
        since: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<RawEntityInsight>, SyncError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((level, since, until));
        let canned = self
            .responses
            .get(&level)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))?;

        // Mirror the API: only days inside the window, only entities with data
        Ok(canned
            .into_iter()
            .filter_map(|mut insight| {
                insight.days.retain(|day| {
                    day.date_start
                        .as_deref()
                        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
                        .is_some_and(|d| d >= since && d <= until)
                });
                (!insight.days.is_empty()).then_some(insight)
            })
            .collect())
    }

    async fn list_ad_accounts(
        &self,
        _credentials: &dyn CredentialsProvider,
    ) -> Result<Vec<AdAccount>, SyncError> {
        Ok(Vec::new())
    }
}

pub async fn insert_integration(
    pool: &PgPool,
    project_id: Uuid,
    status: &str,
    account_name: Option<&str>,
    last_sync: Option<DateTime<Utc>>,
) {
    sqlx::query(
        r#"
        INSERT INTO integrations (project_id, platform, status, name, account_name, last_sync)
        VALUES ($1, 'facebook', $2, 'Facebook Ads', $3, $4)
        "#,
    )
    .bind(project_id)
    .bind(status)
    .bind(account_name)
    .bind(last_sync)
    .execute(pool)
    .await
    .expect("Failed to insert integration");
}

pub async fn count_rows(pool: &PgPool, level: HierarchyLevel, project_id: Uuid) -> i64 {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE project_id = $1",
        level.table_name()
    );
    sqlx::query_scalar(&sql)
        .bind(project_id)
        .fetch_one(pool)
        .await
        .expect("Failed to count rows")
}

pub async fn last_sync_of(pool: &PgPool, project_id: Uuid) -> Option<DateTime<Utc>> {
    sqlx::query_scalar("SELECT last_sync FROM integrations WHERE project_id = $1")
        .bind(project_id)
        .fetch_one(pool)
        .await
        .expect("Failed to read last_sync")
}
