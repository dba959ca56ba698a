use sqlx::PgPool;
use std::{sync::Arc, time::Duration};

use crate::{
    handlers::ads_sync::SyncOrchestrator,
    services::meta_ads::{MetaAdsClient, StaticTokenProvider, SyncError},
    utils::{cache::Cache, env::EnvVars},
};

pub struct AppState {
    pub http_client: reqwest::Client,
    pub cache: Cache,
    pub env_vars: EnvVars,
    pub db_pool: PgPool,
    pub orchestrator: Arc<SyncOrchestrator<MetaAdsClient>>,
}

impl AppState {
    /// Initialize the application state with database connection and migrations
    pub async fn new() -> Result<AppState, Box<dyn std::error::Error>> {
        let env_vars = EnvVars::from_env()?;

        // Database connection
        log::info!("Connecting to database...");
        let db_pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(20)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&env_vars.database_url)
            .await?;

        log::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&db_pool).await?;

        log::info!("Database connection established successfully");

        Ok(Self::with_pool(env_vars, db_pool)?)
    }

    /// Build the state around an existing pool; no connection or migration is attempted
    pub fn with_pool(env_vars: EnvVars, db_pool: PgPool) -> Result<AppState, SyncError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(env_vars.meta_http_timeout_seconds))
            .build()
            .map_err(|e| SyncError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let credentials = StaticTokenProvider::new(env_vars.facebook_permanent_token.clone())?;

        log::info!(
            "Using Graph API at {} (concurrency {}, window {} days)",
            env_vars.meta_graph_api_base_url,
            env_vars.meta_fetch_concurrency,
            env_vars.max_insight_window_days
        );
        let client =
            MetaAdsClient::with_base_url(http_client.clone(), env_vars.meta_graph_api_base_url.clone())
                .with_concurrency(env_vars.meta_fetch_concurrency)
                .with_max_window_days(env_vars.max_insight_window_days);

        let orchestrator = Arc::new(SyncOrchestrator::new(
            db_pool.clone(),
            client,
            Arc::new(credentials),
        ));

        Ok(AppState {
            http_client,
            cache: Cache::new(),
            env_vars,
            db_pool,
            orchestrator,
        })
    }
}
