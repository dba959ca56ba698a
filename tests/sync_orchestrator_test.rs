mod common;

use ads_sync::handlers::ads_sync::orchestrator::no_progress;
use ads_sync::handlers::ads_sync::{
    SyncOptions, SyncOrchestrator, SyncProgress, SyncRequest, SyncStage,
};
use ads_sync::services::meta_ads::{HierarchyLevel, StaticTokenProvider, SyncError};
use common::{StubSource, count_rows, date, entity_day, insert_integration, last_sync_of};
use sqlx::PgPool;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const ACCOUNT: &str = "act_1234";

fn orchestrator(pool: &PgPool, source: StubSource) -> SyncOrchestrator<StubSource> {
    let credentials = StaticTokenProvider::new("test-token").unwrap();
    SyncOrchestrator::new(pool.clone(), source, Arc::new(credentials))
}

fn full_source(day: &str) -> StubSource {
    StubSource::new()
        .with_level(
            HierarchyLevel::Campaign,
            Ok(vec![entity_day(HierarchyLevel::Campaign, "c1", None, day, "10.00")]),
        )
        .with_level(
            HierarchyLevel::AdSet,
            Ok(vec![entity_day(HierarchyLevel::AdSet, "s1", Some("c1"), day, "6.00")]),
        )
        .with_level(
            HierarchyLevel::Ad,
            Ok(vec![
                entity_day(HierarchyLevel::Ad, "a1", Some("s1"), day, "4.00"),
                entity_day(HierarchyLevel::Ad, "a2", Some("s1"), day, "2.00"),
            ]),
        )
}

#[sqlx::test]
async fn test_sync_with_no_entities_succeeds_with_zero_stats(pool: PgPool) {
    let project_id = Uuid::new_v4();
    insert_integration(&pool, project_id, "connected", Some("Shop (act_1234)"), None).await;

    let orch = orchestrator(&pool, StubSource::new());
    let request = SyncRequest::new(project_id, ACCOUNT, date("2024-01-01"), date("2024-01-07"));

    let result = orch.sync(&request, SyncOptions::default(), &no_progress).await;

    assert!(result.success);
    assert_eq!(result.stage, SyncStage::Done);
    assert_eq!(result.stats.total, 0);
    assert!(result.error.is_none());
    assert!(
        last_sync_of(&pool, project_id).await.is_some(),
        "last_sync should be stamped after a successful sync"
    );
}

#[sqlx::test]
async fn test_full_sync_persists_every_level(pool: PgPool) {
    let project_id = Uuid::new_v4();
    insert_integration(&pool, project_id, "connected", Some("Shop (act_1234)"), None).await;

    let orch = orchestrator(&pool, full_source("2024-01-05"));
    let request = SyncRequest::new(project_id, ACCOUNT, date("2024-01-05"), date("2024-01-05"));

    let progress: Mutex<Vec<SyncProgress>> = Mutex::new(Vec::new());
    let on_progress = |p: SyncProgress| progress.lock().unwrap().push(p);

    let result = orch.sync(&request, SyncOptions::default(), &on_progress).await;

    assert!(result.success, "sync failed: {:?}", result.error);
    assert_eq!(result.stats.campaigns, 1);
    assert_eq!(result.stats.adsets, 1);
    assert_eq!(result.stats.ads, 2);
    assert_eq!(result.stats.total, 4);

    assert_eq!(count_rows(&pool, HierarchyLevel::Campaign, project_id).await, 1);
    assert_eq!(count_rows(&pool, HierarchyLevel::AdSet, project_id).await, 1);
    assert_eq!(count_rows(&pool, HierarchyLevel::Ad, project_id).await, 2);

    let budget: Option<f64> =
        sqlx::query_scalar("SELECT daily_budget FROM facebook_campaigns WHERE id = 'c1'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(budget, Some(50.0), "budgets are stored in major units");

    let progress = progress.into_inner().unwrap();
    let percents: Vec<u8> = progress.iter().map(|p| p.percent).collect();
    assert!(
        percents.windows(2).all(|w| w[0] <= w[1]),
        "progress must not go backwards: {:?}",
        percents
    );
    assert_eq!(percents.last(), Some(&100));
}

#[sqlx::test]
async fn test_resync_overwrites_instead_of_duplicating(pool: PgPool) {
    let project_id = Uuid::new_v4();
    let request = SyncRequest::new(project_id, ACCOUNT, date("2024-01-05"), date("2024-01-05"));

    let first = orchestrator(&pool, full_source("2024-01-05"));
    assert!(first.sync(&request, SyncOptions::default(), &no_progress).await.success);

    let second = orchestrator(
        &pool,
        StubSource::new().with_level(
            HierarchyLevel::Campaign,
            Ok(vec![entity_day(HierarchyLevel::Campaign, "c1", None, "2024-01-05", "99.50")]),
        ),
    );
    assert!(second.sync(&request, SyncOptions::default(), &no_progress).await.success);

    assert_eq!(count_rows(&pool, HierarchyLevel::Campaign, project_id).await, 1);
    let spend: f64 = sqlx::query_scalar("SELECT spend FROM facebook_campaigns WHERE id = 'c1'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(spend, 99.5);
}

#[sqlx::test]
async fn test_adset_failure_aborts_but_keeps_campaigns(pool: PgPool) {
    let project_id = Uuid::new_v4();
    insert_integration(&pool, project_id, "connected", Some("Shop (act_1234)"), None).await;

    let source = full_source("2024-01-05").with_level(
        HierarchyLevel::AdSet,
        Err(SyncError::Request {
            level: Some(HierarchyLevel::AdSet),
            entity: None,
            status: Some(500),
            message: "Internal error".to_string(),
        }),
    );
    let orch = orchestrator(&pool, source);
    let request = SyncRequest::new(project_id, ACCOUNT, date("2024-01-05"), date("2024-01-05"));

    let progress: Mutex<Vec<SyncProgress>> = Mutex::new(Vec::new());
    let on_progress = |p: SyncProgress| progress.lock().unwrap().push(p);

    let result = orch.sync(&request, SyncOptions::default(), &on_progress).await;

    assert!(!result.success);
    assert_eq!(result.stage, SyncStage::Aborted);
    assert!(matches!(result.error, Some(SyncError::Request { .. })));

    let last = progress.into_inner().unwrap().pop().unwrap();
    assert_eq!(last.stage, SyncStage::Aborted);
    assert_eq!(last.percent, 50, "abort is reported where the run stopped");
    assert_eq!(result.stats.campaigns, 1);
    assert_eq!(result.stats.adsets, 0);
    assert_eq!(result.stats.ads, 0);

    // Committed levels stay committed; later levels are never requested
    assert_eq!(count_rows(&pool, HierarchyLevel::Campaign, project_id).await, 1);
    assert!(
        orch.source()
            .calls()
            .iter()
            .all(|(level, _, _)| *level != HierarchyLevel::Ad)
    );
    assert!(last_sync_of(&pool, project_id).await.is_none());
}

#[sqlx::test]
async fn test_invalid_request_fetches_nothing(pool: PgPool) {
    let orch = orchestrator(&pool, StubSource::new());
    let request = SyncRequest::new(Uuid::new_v4(), ACCOUNT, date("2024-02-01"), date("2024-01-01"));

    let result = orch.sync(&request, SyncOptions::default(), &no_progress).await;

    assert!(!result.success);
    assert!(matches!(result.error, Some(SyncError::InvalidRequest(_))));
    assert!(orch.source().calls().is_empty());
}

#[sqlx::test]
async fn test_check_gaps_skips_when_everything_is_stored(pool: PgPool) {
    let project_id = Uuid::new_v4();
    let request = SyncRequest::new(project_id, ACCOUNT, date("2024-01-05"), date("2024-01-05"));

    let seed = orchestrator(&pool, full_source("2024-01-05"));
    assert!(seed.sync(&request, SyncOptions::default(), &no_progress).await.success);

    let orch = orchestrator(&pool, full_source("2024-01-05"));
    let result = orch
        .sync(&request, SyncOptions { check_gaps: true }, &no_progress)
        .await;

    assert!(result.success);
    assert_eq!(result.stats.total, 0);
    assert!(orch.source().calls().is_empty(), "nothing should be fetched");
}

#[sqlx::test]
async fn test_check_gaps_narrows_fetch_window(pool: PgPool) {
    let project_id = Uuid::new_v4();

    let seed = orchestrator(&pool, full_source("2024-01-05"));
    let seed_request =
        SyncRequest::new(project_id, ACCOUNT, date("2024-01-05"), date("2024-01-05"));
    assert!(seed.sync(&seed_request, SyncOptions::default(), &no_progress).await.success);

    let orch = orchestrator(&pool, StubSource::new());
    let request = SyncRequest::new(project_id, ACCOUNT, date("2024-01-05"), date("2024-01-08"));
    let result = orch
        .sync(&request, SyncOptions { check_gaps: true }, &no_progress)
        .await;

    assert!(result.success);
    let calls = orch.source().calls();
    assert_eq!(calls.len(), 3);
    for (_, since, until) in calls {
        assert_eq!(since, date("2024-01-06"));
        assert_eq!(until, date("2024-01-08"));
    }
}

#[sqlx::test]
async fn test_persist_failure_rolls_back_only_that_level(pool: PgPool) {
    let project_id = Uuid::new_v4();
    insert_integration(&pool, project_id, "connected", Some("Shop (act_1234)"), None).await;

    sqlx::query("ALTER TABLE facebook_adsets ADD CONSTRAINT reject_s2 CHECK (id <> 's2')")
        .execute(&pool)
        .await
        .unwrap();

    let source = full_source("2024-01-05").with_level(
        HierarchyLevel::AdSet,
        Ok(vec![
            entity_day(HierarchyLevel::AdSet, "s1", Some("c1"), "2024-01-05", "3.00"),
            entity_day(HierarchyLevel::AdSet, "s2", Some("c1"), "2024-01-05", "3.00"),
        ]),
    );
    let orch = orchestrator(&pool, source);
    let request = SyncRequest::new(project_id, ACCOUNT, date("2024-01-05"), date("2024-01-05"));

    let result = orch.sync(&request, SyncOptions::default(), &no_progress).await;

    assert!(!result.success);
    assert!(
        matches!(
            result.error,
            Some(SyncError::Persist {
                level: HierarchyLevel::AdSet,
                ..
            })
        ),
        "unexpected error: {:?}",
        result.error
    );
    assert_eq!(result.stats.campaigns, 1);
    assert_eq!(result.stats.adsets, 0);

    assert_eq!(count_rows(&pool, HierarchyLevel::Campaign, project_id).await, 1);
    assert_eq!(
        count_rows(&pool, HierarchyLevel::AdSet, project_id).await,
        0,
        "s1 must be rolled back together with s2"
    );
    assert_eq!(count_rows(&pool, HierarchyLevel::Ad, project_id).await, 0);
    assert!(last_sync_of(&pool, project_id).await.is_none());
}
