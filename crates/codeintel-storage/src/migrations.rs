//! Database migration runner with advisory lock support.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};

/// Advisory lock ID for migrations (arbitrary but stable).
const MIGRATION_LOCK_ID: i64 = 7411;

/// Run all pending migrations under an advisory lock.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(MIGRATION_LOCK_ID)
        .execute(pool)
        .await
        .context("Failed to acquire migration lock")?;

    let result = run_migrations_inner(pool).await;

    sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(MIGRATION_LOCK_ID)
        .execute(pool)
        .await
        .context("Failed to release migration lock")?;

    result
}

async fn run_migrations_inner(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TIMESTAMPTZ DEFAULT now()
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create migrations table")?;

    let applied: Vec<i32> = sqlx::query("SELECT version FROM schema_migrations ORDER BY version")
        .fetch_all(pool)
        .await
        .context("Failed to fetch applied migrations")?
        .iter()
        .map(|row| row.get(0))
        .collect();

    let migrations = vec![
        (
            1,
            "initial_schema",
            include_str!("../migrations/001_initial_schema.sql"),
        ),
        (2, "indexes", include_str!("../migrations/002_indexes.sql")),
        (
            3,
            "functions",
            include_str!("../migrations/003_functions.sql"),
        ),
    ];

    for (version, name, sql) in migrations {
        if applied.contains(&version) {
            tracing::debug!(version, name, "migration already applied");
            continue;
        }

        tracing::info!(version, name, "applying migration");

        let mut tx = pool.begin().await.context("Failed to start transaction")?;

        sqlx::query(sql)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to execute migration {version} ({name})"))?;

        sqlx::query("INSERT INTO schema_migrations (version, name) VALUES ($1, $2)")
            .bind(version)
            .bind(name)
            .execute(&mut *tx)
            .await
            .context("Failed to record migration")?;

        tx.commit().await.context("Failed to commit migration")?;

        tracing::info!(version, name, "migration completed");
    }

    Ok(())
}

/// Poll for another process's migration run to finish, used by workers that
/// start up before the owning process has migrated the schema.
pub async fn wait_for_migrations(pool: &PgPool, max_wait_secs: u64) -> Result<()> {
    use tokio::time::{Duration, sleep};

    let start = std::time::Instant::now();
    let max_duration = Duration::from_secs(max_wait_secs);

    loop {
        let locked: Option<bool> = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .bind(MIGRATION_LOCK_ID)
            .fetch_one(pool)
            .await
            .context("Failed to check migration lock")?;

        if locked == Some(true) {
            sqlx::query("SELECT pg_advisory_unlock($1)")
                .bind(MIGRATION_LOCK_ID)
                .execute(pool)
                .await
                .context("Failed to release migration lock")?;
            return Ok(());
        }

        if start.elapsed() > max_duration {
            anyhow::bail!("Timeout waiting for migrations to complete");
        }

        sleep(Duration::from_millis(500)).await;
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn migration_sql_embedded() {
        let sql1 = include_str!("../migrations/001_initial_schema.sql");
        assert!(sql1.contains("CREATE TABLE"));

        let sql2 = include_str!("../migrations/002_indexes.sql");
        assert!(sql2.contains("CREATE INDEX"));

        let sql3 = include_str!("../migrations/003_functions.sql");
        assert!(sql3.contains("CREATE OR REPLACE FUNCTION"));
    }
}
