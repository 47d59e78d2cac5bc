//! Test utility functions for batchline

#![allow(dead_code)]

use async_trait::async_trait;
use batchline::core::{PipelineDefinition, PipelineLoader};
use batchline::execution::Orchestrator;
use batchline::persistence::{InMemoryStatus, StatusRecord};
use batchline::scheduler::{DependencyToken, Invocation, JobRunner, SchedulerError};
use batchline::PipelineError;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// One call seen by [`RecordingRunner`]
#[derive(Debug, Clone)]
pub struct RecordedJob {
    pub job_name: String,
    pub depends_on: Vec<String>,
    pub command: String,
}

/// Mock scheduler that records every submission and returns `<n>.mock` ids
pub struct RecordingRunner {
    jobs: Mutex<Vec<RecordedJob>>,
    counter: AtomicUsize,
    reject_at: Option<usize>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            counter: AtomicUsize::new(0),
            reject_at: None,
        }
    }

    /// Reject the `n`th submission (1-based)
    pub fn rejecting_at(n: usize) -> Self {
        Self {
            reject_at: Some(n),
            ..Self::new()
        }
    }

    pub fn jobs(&self) -> Vec<RecordedJob> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }

    pub fn job(&self, name: &str) -> RecordedJob {
        self.jobs()
            .into_iter()
            .find(|j| j.job_name == name)
            .unwrap_or_else(|| panic!("No job named {}", name))
    }
}

#[async_trait]
impl JobRunner for RecordingRunner {
    async fn submit(
        &self,
        job_name: &str,
        depends_on: &[DependencyToken],
        invocation: &Invocation,
    ) -> Result<DependencyToken, SchedulerError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        if self.reject_at == Some(n) {
            return Err(SchedulerError::Rejected(format!("mock rejected {}", job_name)));
        }

        self.jobs.lock().unwrap().push(RecordedJob {
            job_name: job_name.to_string(),
            depends_on: depends_on
                .iter()
                .flat_map(|t| t.job_ids().to_vec())
                .collect(),
            command: invocation.command.clone(),
        });
        Ok(DependencyToken::job(format!("{}.mock", n)))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Load a definition from YAML text
pub fn load(yaml: &str, args: &[&str]) -> Result<PipelineDefinition, PipelineError> {
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    PipelineLoader::load(yaml, &args)
}

/// Write `contents` to `dir/name`, returning the path as a string
pub fn write_file(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path.display().to_string()
}

/// Submit with a fresh orchestrator and in-memory status
pub async fn submit(
    definition: &PipelineDefinition,
    runner: &RecordingRunner,
) -> Result<DependencyToken, PipelineError> {
    let status = InMemoryStatus::new();
    submit_with_status(definition, runner, &status).await
}

pub async fn submit_with_status(
    definition: &PipelineDefinition,
    runner: &RecordingRunner,
    status: &dyn StatusRecord,
) -> Result<DependencyToken, PipelineError> {
    let mut orchestrator = Orchestrator::new();
    orchestrator.submit(definition, runner, status).await
}
