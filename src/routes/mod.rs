use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::AppState;

mod ads_sync;

async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    // Test database connection
    let db_connected = sqlx::query("SELECT 1")
        .fetch_one(&state.db_pool)
        .await
        .is_ok();

    let pool_size = state.db_pool.size();
    let idle_connections = state.db_pool.num_idle();

    if !db_connected {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "database": {
                    "connected": false,
                    "error": "Database connection failed"
                }
            })),
        ));
    }

    Ok(Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "database": {
            "connected": true,
            "pool_size": pool_size,
            "idle_connections": idle_connections
        }
    })))
}

pub fn create_routes(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/api/health", get(health_check))
        // Sync endpoints
        .route("/api/ads/sync", post(ads_sync::sync_ads))
        .route("/api/ads/fill-missing", post(ads_sync::fill_missing))
        .route("/api/ads/cron-sync", post(ads_sync::cron_sync))
        // Read endpoints
        .route("/api/ads/missing-dates", get(ads_sync::get_missing_dates))
        .route("/api/ads/accounts", get(ads_sync::list_ad_accounts))
        .with_state(state)
}
