//! Managed batch queue backed by SQLite
//!
//! Jobs are not submitted directly; they are enqueued for an external
//! coordinator that releases them as their dependencies finish.

use crate::core::error::{PipelineError, Result};
use crate::scheduler::{dependency_ids, BatchScript, DependencyToken, Invocation, JobRunner, SchedulerError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use tracing::info;

/// A job waiting in the managed queue
#[derive(Debug, Clone)]
pub struct ManagedJob {
    pub id: i64,
    pub job_name: String,
    pub script: PathBuf,
    pub depends_on: Vec<String>,
    pub enqueued_at: DateTime<Utc>,
}

/// Enqueues jobs into the `managed_jobs` table
pub struct ManagedBatchRunner {
    pool: SqlitePool,
}

impl ManagedBatchRunner {
    /// Open (creating if needed) the queue database at `db_path`
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| PipelineError::io(format!("Failed to create {}", parent.display()), e))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let runner = Self { pool };
        runner.init().await?;
        Ok(runner)
    }

    /// Queue under the user's local data directory
    pub async fn with_default_path() -> Result<Self> {
        let data_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::open(&data_dir.join("batchline").join("managed.db")).await
    }

    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS managed_jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_name TEXT NOT NULL,
                script TEXT NOT NULL,
                depends_on TEXT NOT NULL DEFAULT '',
                enqueued_at TEXT NOT NULL,
                state TEXT NOT NULL DEFAULT 'queued'
            );

            CREATE INDEX IF NOT EXISTS idx_managed_state ON managed_jobs(state);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Jobs still waiting for the coordinator, oldest first
    pub async fn queued_jobs(&self) -> Result<Vec<ManagedJob>> {
        let rows = sqlx::query(
            r#"
            SELECT id, job_name, script, depends_on, enqueued_at
            FROM managed_jobs
            WHERE state = 'queued'
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let depends_on: String = row.get("depends_on");
                ManagedJob {
                    id: row.get("id"),
                    job_name: row.get("job_name"),
                    script: PathBuf::from(row.get::<String, _>("script")),
                    depends_on: depends_on
                        .split(':')
                        .filter(|id| !id.is_empty())
                        .map(str::to_string)
                        .collect(),
                    enqueued_at: row.get("enqueued_at"),
                }
            })
            .collect())
    }
}

#[async_trait]
impl JobRunner for ManagedBatchRunner {
    async fn submit(
        &self,
        job_name: &str,
        depends_on: &[DependencyToken],
        invocation: &Invocation,
    ) -> std::result::Result<DependencyToken, SchedulerError> {
        let script = BatchScript::render(job_name, depends_on, invocation);
        let script_path = script.write_to(&invocation.log_dir)?;

        let result = sqlx::query(
            r#"
            INSERT INTO managed_jobs (job_name, script, depends_on, enqueued_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(job_name)
        .bind(script_path.display().to_string())
        .bind(dependency_ids(depends_on).join(":"))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        info!("Enqueued {} as managed job {}", job_name, id);
        Ok(DependencyToken::job(id.to_string()))
    }

    fn name(&self) -> &str {
        "managed"
    }
}
