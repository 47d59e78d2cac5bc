//! Error types for loading, resolving and submitting a pipeline

use crate::core::state::SubmissionState;
use crate::scheduler::SchedulerError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the loader, the resolution engine and the orchestrator.
///
/// Every variant is fatal for the current run; nothing is retried internally.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Malformed pipeline definition: {0}")]
    MalformedDefinition(String),

    #[error("Not enough arguments for this pipeline: {required} required, {supplied} supplied")]
    InsufficientArguments { required: usize, supplied: usize },

    #[error("File '{id}' refers to '{reference}', which has no resolved path yet")]
    UnresolvedReference { id: String, reference: String },

    #[error("Input '{id}' does not exist: {}", path.display())]
    MissingInput { id: String, path: PathBuf },

    #[error("Pipeline '{0}' has already been submitted")]
    AlreadySubmitted(String),

    #[error("This orchestrator was already used for '{pipeline}' (state {state:?}); create a new one")]
    OrchestratorReused { pipeline: String, state: SubmissionState },

    #[error("Status record schema version {found} does not match {expected}; reinitialize the status database")]
    SchemaMismatch { found: i64, expected: i64 },

    #[error("Status record not initialized: {0} (run `batchline status init --db {0}` first)")]
    StatusNotInitialized(String),

    #[error("Status record already initialized: {0}")]
    StatusAlreadyInitialized(String),

    #[error("Execution mode '{0}' is not supported by this build")]
    UnsupportedMode(String),

    #[error("Submission of job {job_name} failed: {source}")]
    Scheduler {
        job_name: String,
        #[source]
        source: SchedulerError,
    },

    #[cfg(feature = "sqlite")]
    #[error("Status store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        PipelineError::MalformedDefinition(msg.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        PipelineError::Io {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
