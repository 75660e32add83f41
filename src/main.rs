use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aspirant_backend_core::{
    build_router, initialize_app_state, services::initialize_background_tasks,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before the config is first touched
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aspirant_backend_core=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = aspirant_backend_core::app_config::config();
    info!(
        "Starting Aspirant backend on {} ({})",
        config.bind_address, config.environment
    );

    let state = initialize_app_state()
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to initialize application state")?;

    let _background_tasks = initialize_background_tasks(&state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;

    info!("Listening on {}", config.bind_address);
    axum::serve(listener, build_router(state))
        .await
        .context("HTTP server error")?;

    Ok(())
}
