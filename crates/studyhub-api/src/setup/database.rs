//! Record store setup and initialization

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use studyhub_core::Config;
use studyhub_db::{InMemoryMaterialRepository, MaterialRepository, PgMaterialRepository};

/// Connect the pool and run pending migrations
pub async fn setup_database(config: &Config, database_url: &str) -> Result<PgPool> {
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections())
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds()))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(
        max_connections = config.db_max_connections(),
        "Database connected successfully"
    );

    // Workspace migrations/ relative to this crate
    let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations");
    let migrator = sqlx::migrate::Migrator::new(migrations_dir)
        .await
        .context("Failed to load migrations")?;
    migrator
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}

/// Postgres when `DATABASE_URL` is set, otherwise the in-process store.
pub async fn setup_records(config: &Config) -> Result<Arc<dyn MaterialRepository>> {
    match config.database_url() {
        Some(url) => {
            let pool = setup_database(config, url).await?;
            Ok(Arc::new(PgMaterialRepository::new(
                pool,
                config.full_text_search(),
            )))
        }
        None if config.is_production() => {
            anyhow::bail!("DATABASE_URL must be set in production")
        }
        None => {
            tracing::warn!(
                "DATABASE_URL not set; using the in-memory record store (data is lost on restart)"
            );
            Ok(Arc::new(InMemoryMaterialRepository::new()))
        }
    }
}
