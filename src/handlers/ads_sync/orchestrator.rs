//! Sequential Campaign → AdSet → Ad synchronization pipeline
//!
//! Each level is fetched, normalized and upserted before the next one starts.
//! The first failing level stops the run; levels already committed stay in
//! place and the run can simply be repeated.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use super::date_gaps::{DateScope, missing_dates};
use super::integrations::update_last_sync;
use super::records::build_records;
use super::upsert::upsert_records;
use crate::services::meta_ads::{CredentialsProvider, HierarchyLevel, InsightSource, SyncError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub project_id: Uuid,
    pub ad_account_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl SyncRequest {
    pub fn new(
        project_id: Uuid,
        ad_account_id: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            project_id,
            ad_account_id: ad_account_id.into(),
            start_date,
            end_date,
        }
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.ad_account_id.trim().is_empty() {
            return Err(SyncError::InvalidRequest(
                "ad_account_id must not be empty".to_string(),
            ));
        }
        if self.start_date > self.end_date {
            return Err(SyncError::InvalidRequest(format!(
                "start date {} is after end date {}",
                self.start_date, self.end_date
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Run gap analysis first and skip the fetch entirely when nothing is missing
    pub check_gaps: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    Start,
    CheckDates,
    FetchCampaigns,
    FetchAdSets,
    FetchAds,
    UpdateLastSync,
    Done,
    Aborted,
}

impl SyncStage {
    pub fn fetching(level: HierarchyLevel) -> Self {
        match level {
            HierarchyLevel::Campaign => SyncStage::FetchCampaigns,
            HierarchyLevel::AdSet => SyncStage::FetchAdSets,
            HierarchyLevel::Ad => SyncStage::FetchAds,
        }
    }
}

/// Progress percentage when a level starts and when it finishes
fn level_milestones(level: HierarchyLevel) -> (u8, u8) {
    match level {
        HierarchyLevel::Campaign => (20, 50),
        HierarchyLevel::AdSet => (50, 70),
        HierarchyLevel::Ad => (70, 90),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncProgress {
    pub percent: u8,
    pub stage: SyncStage,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub campaigns: usize,
    pub adsets: usize,
    pub ads: usize,
    pub total: usize,
}

impl SyncStats {
    pub fn record(&mut self, level: HierarchyLevel, count: usize) {
        match level {
            HierarchyLevel::Campaign => self.campaigns += count,
            HierarchyLevel::AdSet => self.adsets += count,
            HierarchyLevel::Ad => self.ads += count,
        }
        self.total += count;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncResult {
    pub success: bool,
    pub stats: SyncStats,
    pub error: Option<SyncError>,
    /// Terminal state reached
    pub stage: SyncStage,
}

impl SyncResult {
    fn done(stats: SyncStats) -> Self {
        Self {
            success: true,
            stats,
            error: None,
            stage: SyncStage::Done,
        }
    }

    fn aborted(stats: SyncStats, error: SyncError) -> Self {
        Self {
            success: false,
            stats,
            error: Some(error),
            stage: SyncStage::Aborted,
        }
    }
}

/// Forwards progress to the caller, dropping anything that would move backwards
struct ProgressReporter<'a> {
    last: Option<u8>,
    callback: &'a (dyn Fn(SyncProgress) + Send + Sync),
}

impl<'a> ProgressReporter<'a> {
    fn new(callback: &'a (dyn Fn(SyncProgress) + Send + Sync)) -> Self {
        Self {
            last: None,
            callback,
        }
    }

    fn report(&mut self, percent: u8, stage: SyncStage, message: impl Into<String>) {
        let percent = percent.min(100);
        if self.last.is_some_and(|last| percent < last) {
            return;
        }
        self.last = Some(percent);
        (self.callback)(SyncProgress {
            percent,
            stage,
            message: message.into(),
        });
    }
    /// Terminal report at the last percentage reached
    fn abort(&mut self, error: &SyncError) {
        let percent = self.last.unwrap_or(0);
        self.report(percent, SyncStage::Aborted, format!("Sync failed: {}", error));
    }
}

/// Progress callback that discards every update
pub fn no_progress(_: SyncProgress) {}

pub struct SyncOrchestrator<S: InsightSource> {
    pool: PgPool,
    source: S,
    credentials: Arc<dyn CredentialsProvider>,
}

impl<S: InsightSource> SyncOrchestrator<S> {
    pub fn new(pool: PgPool, source: S, credentials: Arc<dyn CredentialsProvider>) -> Self {
        Self {
            pool,
            source,
            credentials,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn credentials(&self) -> &dyn CredentialsProvider {
        self.credentials.as_ref()
    }

    /// Fetch, normalize and persist one level; returns the number of rows written
    pub async fn sync_level(
        &self,
        project_id: Uuid,
        ad_account_id: &str,
        level: HierarchyLevel,
        since: NaiveDate,
        until: NaiveDate,
    ) -> Result<usize, SyncError> {
        let raw = self
            .source
            .fetch_level(self.credentials(), ad_account_id, level, since, until)
            .await?;
        let records = build_records(&raw);
        let stats = upsert_records(&self.pool, level, &records, project_id, ad_account_id).await?;
        Ok(stats.count)
    }

    pub async fn sync(
        &self,
        request: &SyncRequest,
        options: SyncOptions,
        on_progress: &(dyn Fn(SyncProgress) + Send + Sync),
    ) -> SyncResult {
        let mut progress = ProgressReporter::new(on_progress);
        let mut stats = SyncStats::default();

        progress.report(0, SyncStage::Start, "Starting sync");
        if let Err(e) = request.validate() {
            progress.abort(&e);
            return SyncResult::aborted(stats, e);
        }

        let project_id = request.project_id;
        let ad_account_id = request.ad_account_id.as_str();
        let (mut since, mut until) = (request.start_date, request.end_date);

        progress.report(10, SyncStage::CheckDates, "Checking dates");
        if options.check_gaps {
            let missing = missing_dates(
                &self.pool,
                project_id,
                ad_account_id,
                since,
                until,
                DateScope::AllLevels,
            )
            .await;

            match (missing.first(), missing.last()) {
                (Some(first), Some(last)) => {
                    since = *first;
                    until = *last;
                }
                _ => {
                    log::info!(
                        "All dates {} to {} already stored for project {} / {}",
                        since,
                        until,
                        project_id,
                        ad_account_id
                    );
                    progress.report(100, SyncStage::Done, "No missing dates");
                    return SyncResult::done(stats);
                }
            }
        }

        log::info!(
            "Syncing project {} / {} via {} from {} to {}",
            project_id,
            ad_account_id,
            self.source.source_name(),
            since,
            until
        );

        for level in HierarchyLevel::ALL {
            let (start_pct, done_pct) = level_milestones(level);
            progress.report(
                start_pct,
                SyncStage::fetching(level),
                format!("Fetching {}", level.label()),
            );

            match self
                .sync_level(project_id, ad_account_id, level, since, until)
                .await
            {
                Ok(count) => {
                    stats.record(level, count);
                    progress.report(
                        done_pct,
                        SyncStage::fetching(level),
                        format!("Saved {} {} rows", count, level),
                    );
                }
                Err(e) => {
                    log::error!(
                        "Sync aborted at {} level for project {} / {}: {}",
                        level,
                        project_id,
                        ad_account_id,
                        e
                    );
                    progress.abort(&e);
                    return SyncResult::aborted(stats, e);
                }
            }
        }

        progress.report(90, SyncStage::UpdateLastSync, "Updating sync timestamp");
        match update_last_sync(&self.pool, project_id).await {
            Ok(0) => log::warn!("No facebook integration found for project {}", project_id),
            Ok(_) => {}
            Err(e) => log::warn!(
                "Failed to update last_sync for project {}: {}",
                project_id,
                e
            ),
        }

        progress.report(100, SyncStage::Done, "Sync complete");
        log::info!(
            "Sync finished for project {} / {}: {} campaigns, {} ad sets, {} ads",
            project_id,
            ad_account_id,
            stats.campaigns,
            stats.adsets,
            stats.ads
        );

        SyncResult::done(stats)
    }
}
