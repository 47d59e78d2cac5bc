//! Job scheduler clients
//!
//! A [`JobRunner`] takes one rendered job and hands it to some backend,
//! returning a [`DependencyToken`] later jobs can wait on.

pub mod dry_run;
#[cfg(feature = "sqlite")]
pub mod managed;
pub mod qsub;
pub mod script;

pub use dry_run::DryRunRunner;
#[cfg(feature = "sqlite")]
pub use managed::ManagedBatchRunner;
pub use qsub::QsubRunner;
pub use script::BatchScript;

use crate::core::error::PipelineError;
use crate::execution::ExecMode;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Opaque set of scheduler job ids that dependents wait on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyToken {
    job_ids: Vec<String>,
}

impl DependencyToken {
    /// Token for a single scheduler job
    pub fn job(id: impl Into<String>) -> Self {
        Self {
            job_ids: vec![id.into()],
        }
    }

    /// Union of several tokens, first occurrence order, no duplicates
    pub fn join(tokens: impl IntoIterator<Item = DependencyToken>) -> Self {
        let mut job_ids: Vec<String> = Vec::new();
        for token in tokens {
            for id in token.job_ids {
                if !job_ids.contains(&id) {
                    job_ids.push(id);
                }
            }
        }
        Self { job_ids }
    }

    pub fn job_ids(&self) -> &[String] {
        &self.job_ids
    }

    /// An empty token means "no dependency"
    pub fn is_empty(&self) -> bool {
        self.job_ids.is_empty()
    }
}

impl fmt::Display for DependencyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.job_ids.is_empty() {
            write!(f, "<none>")
        } else {
            write!(f, "{}", self.job_ids.join(":"))
        }
    }
}

/// All job ids in a dependency list
pub fn dependency_ids(depends_on: &[DependencyToken]) -> Vec<String> {
    DependencyToken::join(depends_on.iter().cloned()).job_ids
}

/// Resources requested for one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobResources {
    /// `HH:MM:SS`
    pub walltime: String,
    pub mem: String,
    pub threads: u32,
    pub queue: Option<String>,
}

impl Default for JobResources {
    fn default() -> Self {
        Self {
            walltime: "01:00:00".to_string(),
            mem: "1gb".to_string(),
            threads: 1,
            queue: None,
        }
    }
}

/// A rendered tool invocation ready for submission
#[derive(Debug, Clone)]
pub struct Invocation {
    pub command: String,
    pub resources: JobResources,
    pub modules: Vec<String>,
    pub log_dir: PathBuf,
}

/// Errors reported by a scheduler backend
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Scheduler rejected the job: {0}")]
    Rejected(String),

    #[error("Failed to start scheduler client: {0}")]
    Spawn(String),

    #[error("Unexpected scheduler response: {0}")]
    InvalidResponse(String),

    #[error("Scheduler client timed out after {0}s")]
    Timeout(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "sqlite")]
    #[error("Managed queue error: {0}")]
    Queue(#[from] sqlx::Error),
}

/// Hands jobs to a scheduler backend
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Submit one job that starts only after every job in `depends_on`
    async fn submit(
        &self,
        job_name: &str,
        depends_on: &[DependencyToken],
        invocation: &Invocation,
    ) -> Result<DependencyToken, SchedulerError>;

    /// Backend name for messages
    fn name(&self) -> &str;
}

/// Settings for building the runner of an execution mode
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// `qsub` executable
    pub qsub: String,

    /// Seconds to wait for `qsub`
    pub qsub_timeout_secs: u64,

    /// Managed queue database; the per-user default when absent
    pub managed_db: Option<PathBuf>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            qsub: "qsub".to_string(),
            qsub_timeout_secs: 60,
            managed_db: None,
        }
    }
}

/// Build the runner for an execution mode
pub async fn runner_for_mode(
    mode: ExecMode,
    options: &RunnerOptions,
) -> Result<Box<dyn JobRunner>, PipelineError> {
    match mode {
        ExecMode::NoSubmit => Ok(Box::new(DryRunRunner::new())),
        ExecMode::BatchStandard => Ok(Box::new(QsubRunner::new(
            options.qsub.clone(),
            options.qsub_timeout_secs,
        ))),
        #[cfg(feature = "sqlite")]
        ExecMode::BatchManaged => {
            let runner = match &options.managed_db {
                Some(path) => ManagedBatchRunner::open(path).await?,
                None => ManagedBatchRunner::with_default_path().await?,
            };
            Ok(Box::new(runner))
        }
        #[cfg(not(feature = "sqlite"))]
        ExecMode::BatchManaged => Err(PipelineError::UnsupportedMode(mode.label().to_string())),
        ExecMode::Cloud => Err(PipelineError::UnsupportedMode(mode.label().to_string())),
    }
}
