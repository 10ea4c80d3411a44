//! Database connection pool setup.

use crate::config::{Config, StoreBackend};
use crate::error::{AppError, Result};
use crate::store::Stores;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Create a new database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Apply pending schema migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Open the configured store backend, migrating Postgres first.
pub async fn connect_stores(config: &Config) -> Result<Stores> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on exit");
            Ok(Stores::memory())
        }
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| AppError::Config("DATABASE_URL not set".into()))?;
            let pool = create_pool(url).await?;
            tracing::info!("Connected to database");
            migrate(&pool).await?;
            tracing::info!("Database migrations complete");
            Ok(Stores::postgres(pool))
        }
    }
}
