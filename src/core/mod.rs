//! Core domain models for a pipeline
//!
//! File entities and their table, the four-pass resolver, the YAML loader
//! and the steps built from it.

pub mod config;
pub mod context;
pub mod error;
pub mod file;
pub mod pipeline;
pub mod resolve;
pub mod state;
pub mod step;
pub mod table;

pub use config::{PipelineLoader, StepDefaults};
pub use context::SubmitContext;
pub use error::{PipelineError, Result};
pub use file::{FileEntity, FileKind, PathSource};
pub use pipeline::PipelineDefinition;
pub use state::{SubmissionState, SubmittedStep};
pub use step::{ForEachStep, PipelineStep, StepDeclaration, StepKind, ToolStep};
pub use table::FileTable;
