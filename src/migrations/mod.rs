// Embedded schema migrations
// Compiled into the binary so the service can migrate its own database on boot

pub mod diesel;

use tracing::{error, info};

pub use self::diesel::{check_migration_status, MigrationError, MigrationStatus};

/// Runs pending migrations unless disabled by configuration
pub async fn run_all_migrations(database_url: &str) -> Result<usize, MigrationError> {
    info!("[MIGRATIONS] Running Diesel (PostgreSQL) migrations...");
    match self::diesel::run_migrations(database_url.to_string()).await {
        Ok(0) => {
            info!("[MIGRATIONS] Schema up to date");
            Ok(0)
        },
        Ok(applied) => {
            info!("[MIGRATIONS] Applied {} migrations", applied);
            Ok(applied)
        },
        Err(e) => {
            error!("[MIGRATIONS] Migration failed: {}", e);
            Err(e)
        },
    }
}

pub fn should_run_migrations() -> bool {
    !crate::app_config::config().disable_embedded_migrations
}
