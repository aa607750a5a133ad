//! Database connection pool management.

use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::Config;
use crate::repository::PgStorage;

/// Create a PostgreSQL connection pool.
pub async fn create_pool(config: &Config) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to PostgreSQL")?;

    Ok(pool)
}

/// Create a pool that connects on first use.
pub fn create_lazy_pool(config: &Config) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect_lazy(&config.database_url)
        .context("invalid DATABASE_URL")
}

/// Connect and wrap the pool as repository storage.
pub async fn create_storage(config: &Config) -> Result<PgStorage> {
    let pool = create_pool(config).await?;
    Ok(PgStorage::new(pool).with_statement_timeout(config.statement_timeout))
}

/// Wrap a lazy pool as repository storage; nothing connects until a
/// statement runs.
pub fn create_lazy_storage(config: &Config) -> Result<PgStorage> {
    let pool = create_lazy_pool(config)?;
    Ok(PgStorage::new(pool).with_statement_timeout(config.statement_timeout))
}
