// Library exports for the Aspirant backend
// Usage limits, subscription tiers and payment settlement for the learning platform

pub mod app;
pub mod app_config;
pub mod config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod migrations;
pub mod models;
pub mod schema;
pub mod services;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use app::{build_router, AppSettings, AppState};
pub use app_config::{AppConfig, CONFIG};
pub use config::FreeTierDefaults;
pub use db::DieselPool;
pub use middleware::{auth_middleware, AuthenticatedUser};
pub use models::{Ceiling, FeatureKind, Tier};
pub use services::{
    JwtConfig, JwtError, JwtService, LimitsStatus, PaymentService, SubscriptionManager,
    TierStore, UsageDecision, UsageLimitService,
};
pub use store::{DieselStore, InMemoryStore, Store, StoreError};

use std::sync::Arc;

/// Builds the production service graph: PostgreSQL store, Razorpay gateway, system clock
pub async fn initialize_app_state() -> Result<AppState, Box<dyn std::error::Error + Send + Sync>> {
    use tracing::info;

    let config = app_config::config();

    info!(
        "Initializing database pool for {}...",
        db::mask_connection_string(&config.database_url)
    );
    let db_config = db::DieselDatabaseConfig::from_config();
    let max_connections = db_config.max_connections;
    let diesel_pool = db::create_diesel_pool(db_config).await?;
    let health = db::check_diesel_health(&diesel_pool, max_connections).await?;
    info!(
        "Database reachable in {}ms ({}/{} connections)",
        health.latency_ms, health.connections, health.max_connections
    );

    if migrations::should_run_migrations() {
        info!("Running embedded migrations...");
        migrations::run_all_migrations(&config.database_url).await?;
    } else {
        let status = migrations::check_migration_status(config.database_url.clone()).await?;
        if !status.is_up_to_date() {
            tracing::warn!(
                "Embedded migrations disabled with {} pending: {:?}",
                status.pending_migrations.len(),
                status.pending_migrations
            );
        }
    }

    let gateway = services::RazorpayClient::new(services::RazorpayConfig::from_config())?;
    if !gateway.is_configured() {
        tracing::warn!("RAZORPAY_KEY_ID not set; order creation will fail until configured");
    }

    Ok(AppState::new(
        Arc::new(DieselStore::new(diesel_pool)),
        Arc::new(gateway),
        Arc::new(services::SystemClock),
        Arc::new(JwtService::from_env()),
        AppSettings::from_config(),
    ))
}

// Health check handler
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl axum::response::IntoResponse {
    use axum::http::StatusCode;
    use axum::Json;

    let timestamp = chrono::Utc::now().to_rfc3339();
    let started = std::time::Instant::now();

    let (healthy, store_health) = match state.store.ping().await {
        Ok(()) => (
            true,
            serde_json::json!({
                "status": "healthy",
                "latency_ms": started.elapsed().as_millis(),
                "error": null
            }),
        ),
        Err(e) => (
            false,
            serde_json::json!({
                "status": "unhealthy",
                "error": e.to_string()
            }),
        ),
    };

    let response = serde_json::json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "service": "aspirant-backend",
        "timestamp": timestamp,
        "components": {
            "store": store_health
        }
    });

    if healthy {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}
