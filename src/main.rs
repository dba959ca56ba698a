use ads_sync::AppState;
use ads_sync::handlers::ads_sync::backfill::run_rolling_refresh_service;
use axum::{Router, http::HeaderValue};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize logging
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }
    env_logger::init();

    let state = match AppState::new().await {
        Ok(state) => Arc::new(state),
        Err(e) => {
            log::error!("Failed to initialize application state: {}", e);
            std::process::exit(1);
        }
    };

    tokio::spawn(run_rolling_refresh_service(
        state.orchestrator.clone(),
        state.env_vars.cron_sync_interval_seconds,
    ));

    let origins: Vec<HeaderValue> = state
        .env_vars
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Ignoring invalid CORS origin {}: {}", origin, e);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any);

    let addr = format!("0.0.0.0:{}", state.env_vars.port);

    let app = Router::new()
        .merge(ads_sync::routes::create_routes(state))
        .layer(cors);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            log::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    log::info!("Server running on {}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        log::error!("Server error: {}", e);
    }
}
