//! Database connection pool management

use anyhow::{Context, Result};
use codeintel_config::DatabaseConfig;
use sqlx::PgPool;

use crate::migrations::run_migrations;

/// Create a database connection pool.
///
/// # Errors
///
/// Returns an error if the database is unreachable, credentials are
/// rejected, or the pool configuration is invalid.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    config
        .create_pool()
        .await
        .context("Failed to create database pool")
}

/// Create a pool and run pending migrations.
///
/// # Errors
///
/// Returns an error if pool creation fails or a migration fails to apply.
pub async fn initialize_database(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = create_pool(config).await?;

    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    Ok(pool)
}
