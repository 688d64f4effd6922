//! Database initialization
//!
//! The store is a single `settings` key-value table. It is created on first
//! open; an unreachable database is reported to the caller, who degrades to
//! running without persistence.

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::info;

/// Open (creating if missing) the settings database at `path`
pub async fn open_pool(path: &Path) -> Result<Pool<Sqlite>> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;

    init_schema(&pool).await?;
    info!("Settings database ready: {}", path.display());
    Ok(pool)
}

/// Open an in-memory database (tests and ephemeral runs)
pub async fn open_in_memory() -> Result<Pool<Sqlite>> {
    // One connection only: each in-memory connection is a separate database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    init_schema(&pool).await?;
    Ok(pool)
}

/// Create the settings table if it does not exist
pub async fn init_schema(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory_creates_schema() {
        let pool = open_in_memory().await.unwrap();

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='settings')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        assert!(exists);
    }
}
