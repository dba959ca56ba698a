//! Graph API client for listing ad entities and their daily insights
//!
//! Fetching is two-step per hierarchy level: list the entities under the ad
//! account, then pull each entity's daily insight series. The second step fans
//! out over entities with a bounded, order-preserving stream.

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::{StreamExt, TryStreamExt, stream};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::HashSet;

use super::credentials::CredentialsProvider;
use super::error::{SyncError, classify_error};
use super::types::{
    AdAccount, GraphPage, HierarchyLevel, RawAdAccount, RawEntity, RawEntityInsight,
    RawInsightDay,
};
use crate::utils::datetime::{format_date, split_date_windows};

/// Default Graph API base URL
pub const DEFAULT_GRAPH_API_BASE: &str = "https://graph.facebook.com/v18.0";

/// Page size requested on every listing call
const PAGE_LIMIT: &str = "500";

/// Default number of entity insight requests in flight per level
pub const DEFAULT_FETCH_CONCURRENCY: usize = 4;

/// Longest date range requested in a single insights call
pub const DEFAULT_MAX_WINDOW_DAYS: u32 = 90;

const INSIGHT_FIELDS: &str = "date_start,spend,impressions,clicks,ctr,cpc,cpm,reach,frequency,actions,action_values,cost_per_action_type";

const AD_ACCOUNT_FIELDS: &str = "name,account_id,account_status,currency,business_name";

/// Source of hierarchical insight data
#[async_trait]
pub trait InsightSource: Send + Sync {
    /// Returns the name of the data source (e.g., "meta")
    fn source_name(&self) -> &'static str;

    /// Lists every entity at `level` under the ad account and returns the ones
    /// that have at least one day of insights in `[since, until]`
    async fn fetch_level(
        &self,
        credentials: &dyn CredentialsProvider,
        ad_account_id: &str,
        level: HierarchyLevel,
        since: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<RawEntityInsight>, SyncError>;

    /// Ad accounts visible to the token
    async fn list_ad_accounts(
        &self,
        credentials: &dyn CredentialsProvider,
    ) -> Result<Vec<AdAccount>, SyncError>;
}

/// Meta Marketing API client
pub struct MetaAdsClient {
    http_client: Client,
    base_url: String,
    concurrency: usize,
    max_window_days: u32,
}

impl MetaAdsClient {
    /// Creates a client against `base_url` (normally [`DEFAULT_GRAPH_API_BASE`])
    pub fn with_base_url(http_client: Client, base_url: String) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            concurrency: DEFAULT_FETCH_CONCURRENCY,
            max_window_days: DEFAULT_MAX_WINDOW_DAYS,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_max_window_days(mut self, days: u32) -> Self {
        self.max_window_days = days.max(1);
        self
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        level: Option<HierarchyLevel>,
        entity: Option<&str>,
    ) -> Result<T, SyncError> {
        let response = request
            .send()
            .await
            .map_err(|e| SyncError::transport(level, entity, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!(
                "Graph API error ({}) for {} {}: {}",
                status,
                level.map(|l| l.as_str()).unwrap_or("account"),
                entity.unwrap_or("-"),
                body
            );
            return Err(classify_error(status.as_u16(), &body, level, entity));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SyncError::transport(level, entity, e))
    }

    /// Reads a listing endpoint to exhaustion by following `paging.next`
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        token: &str,
        url: String,
        query: &[(&str, String)],
        level: Option<HierarchyLevel>,
        entity: Option<&str>,
    ) -> Result<Vec<T>, SyncError> {
        let first = self
            .http_client
            .get(&url)
            .query(query)
            .bearer_auth(token);
        let mut page: GraphPage<T> = self.get_json(first, level, entity).await?;

        let mut items = Vec::new();
        let mut seen = HashSet::new();
        loop {
            items.append(&mut page.data);

            let next = match page.paging.and_then(|p| p.next) {
                Some(next) if seen.insert(next.clone()) => next,
                Some(next) => {
                    log::warn!("Graph API returned a repeated page cursor, stopping: {}", next);
                    break;
                }
                None => break,
            };

            let request = self.http_client.get(&next).bearer_auth(token);
            page = self.get_json(request, level, entity).await?;
        }

        Ok(items)
    }

    async fn list_entities(
        &self,
        token: &str,
        ad_account_id: &str,
        level: HierarchyLevel,
    ) -> Result<Vec<RawEntity>, SyncError> {
        let url = format!(
            "{}/{}/{}",
            self.base_url,
            account_node(ad_account_id),
            level.edge()
        );
        let query = [
            ("fields", level.entity_fields().to_string()),
            ("limit", PAGE_LIMIT.to_string()),
        ];
        self.get_all_pages(token, url, &query, Some(level), None)
            .await
    }

    async fn fetch_entity_insights(
        &self,
        token: &str,
        level: HierarchyLevel,
        entity: RawEntity,
        since: NaiveDate,
        until: NaiveDate,
    ) -> Result<Option<RawEntityInsight>, SyncError> {
        let url = format!("{}/{}/insights", self.base_url, entity.id);
        let mut days: Vec<RawInsightDay> = Vec::new();

        for (window_start, window_end) in split_date_windows(since, until, self.max_window_days) {
            let time_range = json!({
                "since": format_date(window_start),
                "until": format_date(window_end),
            })
            .to_string();
            let query = [
                ("fields", INSIGHT_FIELDS.to_string()),
                ("time_increment", "1".to_string()),
                ("time_range", time_range),
                ("limit", PAGE_LIMIT.to_string()),
            ];
            let mut window_days = self
                .get_all_pages(token, url.clone(), &query, Some(level), Some(&entity.id))
                .await?;
            days.append(&mut window_days);
        }

        if days.is_empty() {
            log::debug!("No insights for {} {}", level, entity.id);
            return Ok(None);
        }

        Ok(Some(RawEntityInsight {
            level,
            entity,
            days,
        }))
    }
}

#[async_trait]
impl InsightSource for MetaAdsClient {
    fn source_name(&self) -> &'static str {
        "meta"
    }

    async fn fetch_level(
        &self,
        credentials: &dyn CredentialsProvider,
        ad_account_id: &str,
        level: HierarchyLevel,
        since: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<RawEntityInsight>, SyncError> {
        let token = credentials.access_token()?;
        let token = token.as_str();

        let entities = self.list_entities(token, ad_account_id, level).await?;
        log::info!(
            "Fetching {} insights for {} {} ({} to {})",
            level,
            entities.len(),
            level.label(),
            since,
            until
        );

        let insights: Vec<Option<RawEntityInsight>> = stream::iter(entities)
            .map(|entity| self.fetch_entity_insights(token, level, entity, since, until))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let insights: Vec<RawEntityInsight> = insights.into_iter().flatten().collect();
        log::info!(
            "Fetched {} daily rows across {} {} with insights",
            insights.iter().map(|i| i.days.len()).sum::<usize>(),
            insights.len(),
            level.label()
        );

        Ok(insights)
    }

    async fn list_ad_accounts(
        &self,
        credentials: &dyn CredentialsProvider,
    ) -> Result<Vec<AdAccount>, SyncError> {
        let token = credentials.access_token()?;
        let url = format!("{}/me/adaccounts", self.base_url);
        let query = [
            ("fields", AD_ACCOUNT_FIELDS.to_string()),
            ("limit", PAGE_LIMIT.to_string()),
        ];

        let accounts: Vec<RawAdAccount> = self
            .get_all_pages(&token, url, &query, None, None)
            .await?;

        Ok(accounts.into_iter().map(AdAccount::from).collect())
    }
}

/// Graph node for an ad account; accepts ids with or without the `act_` prefix
pub fn account_node(ad_account_id: &str) -> String {
    if ad_account_id.starts_with("act_") {
        ad_account_id.to_string()
    } else {
        format!("act_{}", ad_account_id)
    }
}
