//! Submission state models

use crate::scheduler::DependencyToken;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle of one submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubmissionState {
    /// Nothing checked or submitted yet
    NotStarted,
    /// Guards passed, jobs are being handed to the scheduler
    Submitting,
    /// Every step was submitted and the status record updated
    Submitted,
    /// A guard or a submission failed
    Failed,
}

/// A step that reached the scheduler
#[derive(Debug, Clone, Serialize)]
pub struct SubmittedStep {
    /// 1-based declaration index
    pub index: usize,
    pub job_name: String,
    pub token: DependencyToken,
    pub submitted_at: DateTime<Utc>,
}
