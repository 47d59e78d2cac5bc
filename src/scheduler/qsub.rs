//! PBS/Torque `qsub` client

use crate::scheduler::{BatchScript, DependencyToken, Invocation, JobRunner, SchedulerError};
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Submits batch scripts with `qsub`
#[derive(Debug, Clone)]
pub struct QsubRunner {
    /// Path to the qsub executable
    qsub_path: String,

    timeout_secs: u64,
}

impl QsubRunner {
    pub fn new(qsub_path: String, timeout_secs: u64) -> Self {
        Self {
            qsub_path,
            timeout_secs,
        }
    }

    pub fn qsub_path(&self) -> &str {
        &self.qsub_path
    }
}

#[async_trait]
impl JobRunner for QsubRunner {
    /// Write the script and run `qsub <script>`; stdout is the job id.
    ///
    /// A non-zero exit is reported as [`SchedulerError::Rejected`] with the
    /// scheduler's stderr.
    async fn submit(
        &self,
        job_name: &str,
        depends_on: &[DependencyToken],
        invocation: &Invocation,
    ) -> Result<DependencyToken, SchedulerError> {
        let script = BatchScript::render(job_name, depends_on, invocation);
        let script_path = script.write_to(&invocation.log_dir)?;

        debug!("Running {} {}", self.qsub_path, script_path.display());

        let result = timeout(
            Duration::from_secs(self.timeout_secs),
            Command::new(&self.qsub_path)
                .arg(&script_path)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| SchedulerError::Timeout(self.timeout_secs))?;

        let output = result
            .map_err(|e| SchedulerError::Spawn(format!("{}: {}", self.qsub_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            warn!("qsub exited with code {}: {}", exit_code, stderr.trim());
            return Err(SchedulerError::Rejected(format!(
                "qsub exited with code {}: {}",
                exit_code,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| SchedulerError::InvalidResponse(format!("non UTF-8 job id: {}", e)))?;
        let job_id = stdout.trim();
        if job_id.is_empty() || job_id.contains(char::is_whitespace) {
            return Err(SchedulerError::InvalidResponse(format!(
                "expected a job id, got '{}'",
                job_id
            )));
        }

        Ok(DependencyToken::job(job_id))
    }

    fn name(&self) -> &str {
        "qsub"
    }
}
