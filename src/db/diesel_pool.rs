// Diesel Database Pool
// diesel-async connections pooled through bb8

use bb8::{Pool, RunError};
use diesel_async::pooled_connection::{AsyncDieselConnectionManager, PoolError};
use diesel_async::AsyncPgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::info;

// Embed migrations at compile time
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/diesel");

pub type DieselPool = Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Failed to build connection pool: {0}")]
    Build(#[from] PoolError),

    #[error("Failed to acquire connection: {0}")]
    Acquire(#[from] RunError<PoolError>),
}

#[derive(Debug, Clone)]
pub struct DieselDatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
    pub test_on_checkout: bool,
}

impl DieselDatabaseConfig {
    pub fn from_config() -> Self {
        let config = crate::app_config::config();
        Self {
            url: config.database_url.clone(),
            max_connections: config.database_max_connections,
            min_connections: config.database_min_connections.min(config.database_max_connections),
            connection_timeout: Duration::from_secs(config.database_connect_timeout),
            idle_timeout: Duration::from_secs(config.database_idle_timeout),
            max_lifetime: Duration::from_secs(config.database_max_lifetime),
            test_on_checkout: true,
        }
    }
}

/// Pool status reported by the health endpoint
#[derive(Debug, Clone, serde::Serialize)]
pub struct DatabaseHealth {
    pub latency_ms: u128,
    pub connections: u32,
    pub idle_connections: u32,
    pub max_connections: u32,
}

pub async fn create_diesel_pool(config: DieselDatabaseConfig) -> Result<DieselPool, DatabaseError> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(config.url.clone());

    let pool = Pool::builder()
        .max_size(config.max_connections)
        .min_idle(Some(config.min_connections))
        .connection_timeout(config.connection_timeout)
        .idle_timeout(Some(config.idle_timeout))
        .max_lifetime(Some(config.max_lifetime))
        .test_on_check_out(config.test_on_checkout)
        .build(manager)
        .await?;

    // Fail at startup rather than on the first request
    drop(pool.get().await?);

    info!(
        "Diesel pool initialized for {} with {} max connections",
        mask_connection_string(&config.url),
        config.max_connections
    );

    Ok(pool)
}

/// Checks a connection out of the pool and reports pool occupancy against the
/// size it was built with
pub async fn check_diesel_health(
    pool: &DieselPool,
    max_connections: u32,
) -> Result<DatabaseHealth, DatabaseError> {
    let started = Instant::now();
    drop(pool.get().await?);

    let state = pool.state();
    Ok(DatabaseHealth {
        latency_ms: started.elapsed().as_millis(),
        connections: state.connections,
        idle_connections: state.idle_connections,
        max_connections,
    })
}

/// Mask database connection string for logging
pub fn mask_connection_string(url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(url) {
        let scheme = parsed.scheme();
        let host = parsed.host_str().unwrap_or("***");
        let path = parsed.path();

        // Always normalize to postgresql:// prefix
        let normalized_scheme = if scheme == "postgres" {
            "postgresql"
        } else {
            scheme
        };

        if parsed.username().is_empty() && parsed.password().is_none() {
            format!("{}://{}{}", normalized_scheme, host, path)
        } else {
            format!("{}://***:***@{}{}", normalized_scheme, host, path)
        }
    } else {
        "postgresql://***:***@***".to_string()
    }
}
