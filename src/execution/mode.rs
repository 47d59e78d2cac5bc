//! Execution mode detection

use serde::Serialize;
use std::fmt;
use std::path::Path;

pub const MANAGED_MARKER: &str = "MANAGED_MODE";
pub const CLOUD_MARKER: &str = "CLOUD_MODE";
pub const NO_SUBMIT_MARKER: &str = "NO_SUBMIT";

/// Which backend executes the jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecMode {
    NoSubmit,
    BatchStandard,
    BatchManaged,
    Cloud,
}

impl ExecMode {
    /// Pick the mode from marker files in `dir`.
    ///
    /// Managed wins over cloud, cloud over no-submit; with no marker the
    /// standard batch scheduler is used.
    pub fn detect(dir: &Path) -> Self {
        if dir.join(MANAGED_MARKER).exists() {
            ExecMode::BatchManaged
        } else if dir.join(CLOUD_MARKER).exists() {
            ExecMode::Cloud
        } else if dir.join(NO_SUBMIT_MARKER).exists() {
            ExecMode::NoSubmit
        } else {
            ExecMode::BatchStandard
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExecMode::NoSubmit => "No Submission",
            ExecMode::BatchStandard => "Standard Batch",
            ExecMode::BatchManaged => "Managed Batch",
            ExecMode::Cloud => "Cloud",
        }
    }

    /// Whether jobs reach a real scheduler
    pub fn submits_jobs(&self) -> bool {
        !matches!(self, ExecMode::NoSubmit)
    }
}

impl fmt::Display for ExecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
