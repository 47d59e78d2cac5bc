//! SQLite-based status store

use crate::core::error::{PipelineError, Result};
use crate::persistence::{StatusRecord, CURRENT_SCHEMA_VERSION};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Contents of the status row
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub schema_version: i64,
    pub started: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Status record stored in a `status_info` table holding exactly one row
pub struct SqliteStatusStore {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteStatusStore {
    async fn connect(path: &Path, create: bool) -> Result<SqlitePool> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(create);
        Ok(SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?)
    }

    async fn has_status_table(pool: &SqlitePool) -> Result<bool> {
        let row = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'status_info'",
        )
        .fetch_optional(pool)
        .await?;
        Ok(row.is_some())
    }

    async fn row_count(pool: &SqlitePool) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM status_info")
            .fetch_one(pool)
            .await?;
        Ok(row.get("n"))
    }

    /// Create the status table and its single row (not started).
    ///
    /// Fails with [`PipelineError::StatusAlreadyInitialized`] when the row
    /// already exists.
    pub async fn initialize(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| PipelineError::io(format!("Failed to create {}", parent.display()), e))?;
        }

        let pool = Self::connect(path, true).await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS status_info (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                schema_version INTEGER NOT NULL,
                started INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT
            )
            "#,
        )
        .execute(&pool)
        .await?;

        if Self::row_count(&pool).await? > 0 {
            return Err(PipelineError::StatusAlreadyInitialized(path.display().to_string()));
        }

        sqlx::query("INSERT INTO status_info (id, schema_version, started, updated_at) VALUES (1, ?1, 0, ?2)")
            .bind(CURRENT_SCHEMA_VERSION)
            .bind(Utc::now())
            .execute(&pool)
            .await?;

        info!("Initialized status record at {}", path.display());
        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    /// Open an initialized status record
    pub async fn open(path: &Path) -> Result<Self> {
        let not_initialized = || PipelineError::StatusNotInitialized(path.display().to_string());
        if !path.is_file() {
            return Err(not_initialized());
        }

        let pool = Self::connect(path, false).await?;
        if !Self::has_status_table(&pool).await? || Self::row_count(&pool).await? == 0 {
            return Err(not_initialized());
        }

        debug!("Opened status record at {}", path.display());
        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn snapshot(&self) -> Result<StatusSnapshot> {
        let row = sqlx::query("SELECT schema_version, started, updated_at FROM status_info WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PipelineError::StatusNotInitialized(self.path.display().to_string()))?;

        Ok(StatusSnapshot {
            schema_version: row.get("schema_version"),
            started: row.get::<i64, _>("started") != 0,
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait::async_trait]
impl StatusRecord for SqliteStatusStore {
    async fn is_started(&self) -> Result<bool> {
        Ok(self.snapshot().await?.started)
    }

    async fn set_started(&self, started: bool) -> Result<()> {
        sqlx::query("UPDATE status_info SET started = ?1, updated_at = ?2 WHERE id = 1")
            .bind(started as i64)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn schema_version(&self) -> Result<i64> {
        Ok(self.snapshot().await?.schema_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_requires_initialize() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("status.db");

        let err = SqliteStatusStore::open(&path).await.err().unwrap();
        assert!(matches!(err, PipelineError::StatusNotInitialized(_)));
        assert!(err.to_string().contains("batchline status init --db"));
        assert!(!path.exists());

        let store = SqliteStatusStore::initialize(&path).await.unwrap();
        assert!(!store.is_started().await.unwrap());
        assert!(store.is_current_schema().await.unwrap());
        drop(store);

        let err = SqliteStatusStore::initialize(&path).await.err().unwrap();
        assert!(matches!(err, PipelineError::StatusAlreadyInitialized(_)));
    }

    #[tokio::test]
    async fn test_started_flag_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.db");

        let store = SqliteStatusStore::initialize(&path).await.unwrap();
        store.set_started(true).await.unwrap();
        drop(store);

        let reopened = SqliteStatusStore::open(&path).await.unwrap();
        let snapshot = reopened.snapshot().await.unwrap();
        assert!(snapshot.started);
        assert_eq!(snapshot.schema_version, CURRENT_SCHEMA_VERSION);
        assert!(snapshot.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_schema_mismatch_visible() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.db");
        let store = SqliteStatusStore::initialize(&path).await.unwrap();

        sqlx::query("UPDATE status_info SET schema_version = 0")
            .execute(&store.pool)
            .await
            .unwrap();
        assert_eq!(store.schema_version().await.unwrap(), 0);
        assert!(!store.is_current_schema().await.unwrap());
    }
}
