//! Pipeline status record
//!
//! A single persisted "started" flag plus a schema version. The orchestrator
//! reads it before submitting anything so a pipeline is never submitted twice.

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::{SqliteStatusStore, StatusSnapshot};

use crate::core::error::Result;
use tokio::sync::RwLock;

/// Schema version this build reads and writes
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// Persisted submission status of one pipeline output directory
#[async_trait::async_trait]
pub trait StatusRecord: Send + Sync {
    async fn is_started(&self) -> Result<bool>;

    async fn set_started(&self, started: bool) -> Result<()>;

    async fn schema_version(&self) -> Result<i64>;

    async fn is_current_schema(&self) -> Result<bool> {
        Ok(self.schema_version().await? == CURRENT_SCHEMA_VERSION)
    }
}

/// In-memory status (dry runs and tests)
pub struct InMemoryStatus {
    started: RwLock<bool>,
    schema_version: i64,
}

impl InMemoryStatus {
    pub fn new() -> Self {
        Self::with_schema_version(CURRENT_SCHEMA_VERSION)
    }

    pub fn with_schema_version(schema_version: i64) -> Self {
        Self {
            started: RwLock::new(false),
            schema_version,
        }
    }

    /// A record that already shows a submission
    pub fn started() -> Self {
        Self {
            started: RwLock::new(true),
            schema_version: CURRENT_SCHEMA_VERSION,
        }
    }
}

impl Default for InMemoryStatus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StatusRecord for InMemoryStatus {
    async fn is_started(&self) -> Result<bool> {
        Ok(*self.started.read().await)
    }

    async fn set_started(&self, started: bool) -> Result<()> {
        *self.started.write().await = started;
        Ok(())
    }

    async fn schema_version(&self) -> Result<i64> {
        Ok(self.schema_version)
    }
}
