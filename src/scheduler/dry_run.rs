//! Runner that writes batch scripts without contacting a scheduler

use crate::scheduler::{BatchScript, DependencyToken, Invocation, JobRunner, SchedulerError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

/// Writes each job's script to the log directory and returns synthetic ids
#[derive(Debug, Default)]
pub struct DryRunRunner {
    submitted: AtomicUsize,
}

impl DryRunRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs seen so far
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobRunner for DryRunRunner {
    async fn submit(
        &self,
        job_name: &str,
        depends_on: &[DependencyToken],
        invocation: &Invocation,
    ) -> Result<DependencyToken, SchedulerError> {
        let script = BatchScript::render(job_name, depends_on, invocation);
        let path = script.write_to(&invocation.log_dir)?;
        let n = self.submitted.fetch_add(1, Ordering::SeqCst) + 1;

        info!("[dry-run] {} -> {}", job_name, path.display());
        Ok(DependencyToken::job(format!("dryrun.{}", n)))
    }

    fn name(&self) -> &str {
        "dry-run"
    }
}
