//! Test: dependency chaining between steps

use crate::helpers::*;
use batchline::execution::Orchestrator;
use batchline::persistence::{InMemoryStatus, StatusRecord};
use batchline::core::SubmissionState;
use batchline::{DependencyToken, PipelineError};

fn two_unrelated_steps(out: &std::path::Path) -> String {
    format!(
        r#"
name: "scenarioC"
defaults:
  walltime: "02:00:00"
contents:
  - outputdir: {{ id: out, path: "{}" }}
  - step:
      name: first
      command: "date > /dev/null"
  - step:
      name: second
      command: "hostname"
"#,
        out.display()
    )
}

#[tokio::test]
async fn test_chain_is_positional_not_data_driven() {
    let dir = tempfile::tempdir().unwrap();
    let definition = load(&two_unrelated_steps(dir.path()), &[]).unwrap();
    let runner = RecordingRunner::new();

    let token = submit(&definition, &runner).await.unwrap();

    let jobs = runner.jobs();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].job_name, "scenarioC_Step_1");
    assert!(jobs[0].depends_on.is_empty());
    assert_eq!(jobs[1].job_name, "scenarioC_Step_2");
    assert_eq!(jobs[1].depends_on, vec!["1.mock"]);
    assert_eq!(token, DependencyToken::job("2.mock"));
}

#[tokio::test]
async fn test_rejection_stops_the_chain() {
    let dir = tempfile::tempdir().unwrap();
    let definition = load(&two_unrelated_steps(dir.path()), &[]).unwrap();
    let runner = RecordingRunner::rejecting_at(2);
    let status = InMemoryStatus::new();

    let mut orchestrator = Orchestrator::new();
    let err = orchestrator
        .submit(&definition, &runner, &status)
        .await
        .unwrap_err();

    match err {
        PipelineError::Scheduler { job_name, source } => {
            assert_eq!(job_name, "scenarioC_Step_2");
            assert!(source.to_string().contains("mock rejected"));
        }
        other => panic!("Expected Scheduler error, got {:?}", other),
    }
    assert_eq!(orchestrator.state(), SubmissionState::Failed);
    assert_eq!(orchestrator.submitted().len(), 1);
    assert!(!status.is_started().await.unwrap());
}

#[tokio::test]
async fn test_pipeline_without_steps() {
    let dir = tempfile::tempdir().unwrap();
    let yaml = format!(
        "name: empty\ncontents:\n  - outputdir: {{ id: out, path: \"{}\" }}\n",
        dir.path().display()
    );
    let definition = load(&yaml, &[]).unwrap();
    let runner = RecordingRunner::new();
    let status = InMemoryStatus::new();

    let token = submit_with_status(&definition, &runner, &status).await.unwrap();
    assert!(token.is_empty());
    assert_eq!(runner.calls(), 0);
    assert!(status.is_started().await.unwrap());
}
