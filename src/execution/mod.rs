//! Pipeline submission

pub mod mode;
pub mod orchestrator;

pub use mode::ExecMode;
pub use orchestrator::{EventHandler, Orchestrator, SubmissionEvent};
