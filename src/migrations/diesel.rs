// Diesel migration runner for PostgreSQL
// MigrationHarness needs a sync connection, so the work runs on the blocking pool

use diesel::{Connection, PgConnection};
use diesel_migrations::MigrationHarness;
use thiserror::Error;
use tracing::{debug, info};

use crate::db::diesel_pool::MIGRATIONS;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Failed to establish sync connection: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("Migration failed: {0}")]
    Harness(String),

    #[error("Migration task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug)]
pub struct MigrationStatus {
    pub applied_migrations: Vec<String>,
    pub pending_migrations: Vec<String>,
}

impl MigrationStatus {
    pub fn is_up_to_date(&self) -> bool {
        self.pending_migrations.is_empty()
    }
}

/// Run all pending migrations, returning how many were applied
pub async fn run_migrations(database_url: String) -> Result<usize, MigrationError> {
    let applied = tokio::task::spawn_blocking(move || -> Result<usize, MigrationError> {
        let mut conn = PgConnection::establish(&database_url)?;

        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| MigrationError::Harness(e.to_string()))?;

        for migration in &applied {
            debug!("[DIESEL] Applied migration: {}", migration);
        }
        Ok(applied.len())
    })
    .await??;

    info!("[DIESEL] Applied {} migrations", applied);
    Ok(applied)
}

/// Applied and pending migrations without changing anything
pub async fn check_migration_status(database_url: String) -> Result<MigrationStatus, MigrationError> {
    tokio::task::spawn_blocking(move || -> Result<MigrationStatus, MigrationError> {
        let mut conn = PgConnection::establish(&database_url)?;

        let applied = conn
            .applied_migrations()
            .map_err(|e| MigrationError::Harness(e.to_string()))?;
        let pending = conn
            .pending_migrations(MIGRATIONS)
            .map_err(|e| MigrationError::Harness(e.to_string()))?;

        Ok(MigrationStatus {
            applied_migrations: applied.iter().map(|m| m.to_string()).collect(),
            pending_migrations: pending.iter().map(|m| m.name().to_string()).collect(),
        })
    })
    .await?
}
