//! Submission orchestrator - turns a loaded pipeline into a chain of jobs

use crate::core::context::SubmitContext;
use crate::core::error::{PipelineError, Result};
use crate::core::pipeline::PipelineDefinition;
use crate::core::state::{SubmissionState, SubmittedStep};
use crate::persistence::{StatusRecord, CURRENT_SCHEMA_VERSION};
use crate::scheduler::{DependencyToken, JobRunner};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Events emitted while a pipeline is submitted
#[derive(Debug, Clone)]
pub enum SubmissionEvent {
    SubmissionStarted {
        submission_id: Uuid,
        pipeline_name: String,
        steps: usize,
    },
    StepSubmitted {
        index: usize,
        job_name: String,
        description: String,
        token: DependencyToken,
    },
    StepFailed {
        index: usize,
        job_name: String,
        error: String,
    },
    SubmissionFinished {
        submission_id: Uuid,
        state: SubmissionState,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(&SubmissionEvent) + Send + Sync>;

/// Submits every step of a pipeline as dependent scheduler jobs.
///
/// An orchestrator is used once. A second `submit` fails with
/// [`PipelineError::OrchestratorReused`] whatever the first one returned,
/// and makes no scheduler calls.
pub struct Orchestrator {
    submission_id: Uuid,
    state: SubmissionState,
    submitted: Vec<SubmittedStep>,
    event_handlers: Vec<EventHandler>,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            submission_id: Uuid::new_v4(),
            state: SubmissionState::NotStarted,
            submitted: Vec::new(),
            event_handlers: Vec::new(),
        }
    }

    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(&SubmissionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    fn emit(&self, event: SubmissionEvent) {
        for handler in &self.event_handlers {
            handler(&event);
        }
    }

    pub fn submission_id(&self) -> Uuid {
        self.submission_id
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    /// Steps that reached the scheduler, in submission order
    pub fn submitted(&self) -> &[SubmittedStep] {
        &self.submitted
    }

    /// Check the status record and inputs, then submit every step in order.
    ///
    /// Returns the token of the last step (empty for a pipeline without
    /// steps). Jobs already handed to the scheduler are not withdrawn when a
    /// later step fails.
    pub async fn submit(
        &mut self,
        definition: &PipelineDefinition,
        runner: &dyn JobRunner,
        status: &dyn StatusRecord,
    ) -> Result<DependencyToken> {
        if self.state != SubmissionState::NotStarted {
            return Err(PipelineError::OrchestratorReused {
                pipeline: definition.name.clone(),
                state: self.state,
            });
        }

        info!(
            "Submitting pipeline {} ({}) via {}",
            definition.name,
            self.submission_id,
            runner.name()
        );
        self.emit(SubmissionEvent::SubmissionStarted {
            submission_id: self.submission_id,
            pipeline_name: definition.name.clone(),
            steps: definition.step_count(),
        });

        let result = self.run(definition, runner, status).await;

        self.state = match &result {
            Ok(_) => SubmissionState::Submitted,
            Err(e) => {
                error!("Submission of {} failed: {}", definition.name, e);
                SubmissionState::Failed
            }
        };
        self.emit(SubmissionEvent::SubmissionFinished {
            submission_id: self.submission_id,
            state: self.state,
        });

        result
    }

    async fn run(
        &mut self,
        definition: &PipelineDefinition,
        runner: &dyn JobRunner,
        status: &dyn StatusRecord,
    ) -> Result<DependencyToken> {
        if !status.is_current_schema().await? {
            return Err(PipelineError::SchemaMismatch {
                found: status.schema_version().await?,
                expected: CURRENT_SCHEMA_VERSION,
            });
        }
        if status.is_started().await? {
            return Err(PipelineError::AlreadySubmitted(definition.name.clone()));
        }

        definition.check_inputs()?;
        definition.prepare_directories()?;

        self.state = SubmissionState::Submitting;
        let ctx = SubmitContext::new(definition, runner);

        let mut incoming: Vec<DependencyToken> = Vec::new();
        let mut last = DependencyToken::default();

        for (i, step) in definition.steps().iter().enumerate() {
            let index = i + 1;
            let job_name = ctx.job_name(index);

            let token = match step.submit(&ctx, &incoming, &job_name).await {
                Ok(token) => token,
                Err(e) => {
                    self.emit(SubmissionEvent::StepFailed {
                        index,
                        job_name: job_name.clone(),
                        error: e.to_string(),
                    });
                    return Err(e);
                }
            };

            self.emit(SubmissionEvent::StepSubmitted {
                index,
                job_name: job_name.clone(),
                description: step.describe(),
                token: token.clone(),
            });
            self.submitted.push(SubmittedStep {
                index,
                job_name,
                token: token.clone(),
                submitted_at: Utc::now(),
            });

            incoming = if token.is_empty() { Vec::new() } else { vec![token.clone()] };
            last = token;
        }

        status.set_started(true).await?;
        info!(
            "Pipeline {} submitted: {} steps, final token {}",
            definition.name,
            self.submitted.len(),
            last
        );
        Ok(last)
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}
