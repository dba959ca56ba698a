use crate::handlers::ads_sync::integrations::DEFAULT_RECENT_SYNC_THRESHOLD_HOURS;
use crate::services::meta_ads::SyncError;
use crate::services::meta_ads::client::{
    DEFAULT_FETCH_CONCURRENCY, DEFAULT_GRAPH_API_BASE, DEFAULT_MAX_WINDOW_DAYS,
};

/// Upper bound for `MAX_INSIGHT_WINDOW_DAYS` and `DEFAULT_SYNC_DAYS`
pub const MAX_CONFIGURED_DAYS: i64 = 3650;

#[derive(Clone, Debug)]
pub struct EnvVars {
    pub database_url: String,
    pub facebook_permanent_token: String,
    pub meta_graph_api_base_url: String, // Override for testing
    pub meta_fetch_concurrency: usize,
    pub meta_http_timeout_seconds: u64,
    pub max_insight_window_days: u32,
    // 0 disables the rolling refresh service
    pub cron_sync_interval_seconds: u64,
    pub recent_sync_threshold_hours: i64,
    pub default_sync_days: u32,
    pub port: u16,
    // CORS configuration
    pub cors_allowed_origins: Vec<String>,
}

impl EnvVars {
    /// Reads configuration from the process environment
    ///
    /// Fails when `DATABASE_URL` or `FACEBOOK_PERMANENT_TOKEN` is missing so the
    /// server never starts half-configured.
    pub fn from_env() -> Result<Self, SyncError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, SyncError> {
        let non_empty = |name: &str| get(name).filter(|s| !s.trim().is_empty());
        let required = |name: &str| {
            non_empty(name).ok_or_else(|| SyncError::Config(format!("{} is not set", name)))
        };
        let parsed = |name: &str| non_empty(name).and_then(|s| s.trim().parse::<i64>().ok());

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            facebook_permanent_token: required("FACEBOOK_PERMANENT_TOKEN")?,
            meta_graph_api_base_url: non_empty("META_GRAPH_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GRAPH_API_BASE.to_string()),
            meta_fetch_concurrency: parsed("META_FETCH_CONCURRENCY")
                .map(|v| v.max(1) as usize)
                .unwrap_or(DEFAULT_FETCH_CONCURRENCY),
            meta_http_timeout_seconds: parsed("META_HTTP_TIMEOUT_SECONDS")
                .map(|v| v.max(1) as u64)
                .unwrap_or(60),
            max_insight_window_days: parsed("MAX_INSIGHT_WINDOW_DAYS")
                .map(|v| v.clamp(1, MAX_CONFIGURED_DAYS) as u32)
                .unwrap_or(DEFAULT_MAX_WINDOW_DAYS),
            cron_sync_interval_seconds: parsed("CRON_SYNC_INTERVAL_SECONDS")
                .map(|v| v.max(0) as u64)
                .unwrap_or(3600),
            recent_sync_threshold_hours: parsed("RECENT_SYNC_THRESHOLD_HOURS")
                .unwrap_or(DEFAULT_RECENT_SYNC_THRESHOLD_HOURS),
            default_sync_days: parsed("DEFAULT_SYNC_DAYS")
                .map(|v| v.clamp(0, MAX_CONFIGURED_DAYS) as u32)
                .unwrap_or(30),
            port: non_empty("PORT")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(3002),
            cors_allowed_origins: get("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|| "http://localhost:3001,http://localhost:3000".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }
}
