// ABOUTME: Database connection management and schema initialization
// ABOUTME: Opens the SQLite pool with WAL, foreign keys and busy timeout, then migrates

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::StorageError;

/// Connection pool settings
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub busy_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Open (creating if needed) the database at `database_path` and run migrations
pub async fn connect(
    database_path: &Path,
    settings: &PoolSettings,
) -> Result<SqlitePool, StorageError> {
    // Ensure parent directory exists
    if let Some(parent) = database_path.parent() {
        std::fs::create_dir_all(parent).map_err(StorageError::Io)?;
    }

    let database_url = format!("sqlite:{}", database_path.display());

    debug!("Connecting to database: {}", database_url);

    let options = SqliteConnectOptions::from_str(&database_url)
        .map_err(StorageError::Sqlx)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(settings.busy_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .connect_with(options)
        .await
        .map_err(StorageError::Sqlx)?;

    info!("Database connection established");

    migrate(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database with the schema applied.
///
/// Uses a single connection, so every statement is serialized.
pub async fn connect_in_memory() -> Result<SqlitePool, StorageError> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(StorageError::Sqlx)?
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(StorageError::Sqlx)?;

    migrate(&pool).await?;

    Ok(pool)
}

async fn migrate(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(StorageError::Migration)?;

    debug!("Database migrations completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_schema_is_migrated() {
        let pool = connect_in_memory().await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE '\\_%' ESCAPE '\\' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        assert_eq!(tables, vec!["term_history", "term_senses", "terms", "votes"]);
    }

    #[tokio::test]
    async fn test_file_database_uses_wal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("hellafresh.db");

        let pool = connect(&path, &PoolSettings::default()).await.unwrap();

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_single_canonical_per_text_is_enforced() {
        let pool = connect_in_memory().await.unwrap();

        for id in ["term-a", "term-b"] {
            sqlx::query(
                "INSERT INTO terms (id, text, normalized_text, definition, status, submitted_by, created_at)
                 VALUES (?, 'Yeet', 'yeet', 'to throw', 'pending', 'user-1', '2025-01-01T00:00:00Z')",
            )
            .bind(id)
            .execute(&pool)
            .await
            .unwrap();
        }

        sqlx::query("UPDATE terms SET status = 'canonical' WHERE id = 'term-a'")
            .execute(&pool)
            .await
            .unwrap();

        let err = sqlx::query("UPDATE terms SET status = 'canonical' WHERE id = 'term-b'")
            .execute(&pool)
            .await
            .map_err(StorageError::Sqlx)
            .unwrap_err();

        assert!(err.is_unique_violation());
    }
}
