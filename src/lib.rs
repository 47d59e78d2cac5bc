//! batchline - submit declarative pipelines to a cluster batch scheduler

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod scheduler;

// Re-export commonly used types
pub use crate::core::{FileKind, FileTable, PipelineDefinition, PipelineError, PipelineLoader, PipelineStep};
pub use crate::execution::{ExecMode, Orchestrator, SubmissionEvent};
pub use crate::persistence::{InMemoryStatus, StatusRecord};
pub use crate::scheduler::{DependencyToken, Invocation, JobResources, JobRunner, SchedulerError};
