//! Test: checks made before anything is submitted

use crate::helpers::*;
use batchline::persistence::{InMemoryStatus, SqliteStatusStore, StatusRecord};
use batchline::PipelineError;

fn pipeline(input: &str, out: &std::path::Path) -> String {
    format!(
        r#"
name: "guarded"
contents:
  - input: {{ id: reads, path: "{}" }}
  - outputdir: {{ id: out, path: "{}" }}
  - step:
      command: "gzip -c {{{{ reads }}}}"
"#,
        input,
        out.display()
    )
}

#[tokio::test]
async fn test_already_started_makes_no_calls() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "reads.fq", "@r");
    let definition = load(&pipeline(&input, &dir.path().join("out")), &[]).unwrap();

    let runner = RecordingRunner::new();
    let status = InMemoryStatus::started();
    let err = submit_with_status(&definition, &runner, &status)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::AlreadySubmitted(ref name) if name == "guarded"));
    assert_eq!(runner.calls(), 0);
}

#[tokio::test]
async fn test_missing_input_names_the_entity() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.fq").display().to_string();
    let definition = load(&pipeline(&missing, &dir.path().join("out")), &[]).unwrap();

    let runner = RecordingRunner::new();
    let err = submit(&definition, &runner).await.unwrap_err();

    match err {
        PipelineError::MissingInput { id, path } => {
            assert_eq!(id, "reads");
            assert_eq!(path.display().to_string(), missing);
        }
        other => panic!("Expected MissingInput, got {:?}", other),
    }
    assert_eq!(runner.calls(), 0);
}

#[tokio::test]
async fn test_persisted_status_blocks_resubmission() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "reads.fq", "@r");
    let out = dir.path().join("out");
    let db = out.join(".batchline").join("status.db");

    let definition = load(&pipeline(&input, &out), &[]).unwrap();
    let runner = RecordingRunner::new();
    {
        let status = SqliteStatusStore::initialize(&db).await.unwrap();
        submit_with_status(&definition, &runner, &status).await.unwrap();
    }
    assert_eq!(runner.calls(), 1);

    let status = SqliteStatusStore::open(&db).await.unwrap();
    assert!(status.is_started().await.unwrap());

    let definition = load(&pipeline(&input, &out), &[]).unwrap();
    let err = submit_with_status(&definition, &runner, &status)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::AlreadySubmitted(_)));
    assert_eq!(runner.calls(), 1);
}

#[tokio::test]
async fn test_schema_mismatch_before_submission() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "reads.fq", "@r");
    let definition = load(&pipeline(&input, &dir.path().join("out")), &[]).unwrap();

    let runner = RecordingRunner::new();
    let status = InMemoryStatus::with_schema_version(2);
    let err = submit_with_status(&definition, &runner, &status)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::SchemaMismatch { found: 2, expected: 1 }));
    assert_eq!(runner.calls(), 0);
}

#[tokio::test]
async fn test_submit_requires_initialized_status() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("out").join(".batchline").join("status.db");

    let err = SqliteStatusStore::open(&db).await.err().unwrap();
    match err {
        PipelineError::StatusNotInitialized(ref path) => {
            assert_eq!(path, &db.display().to_string());
            assert!(err.to_string().contains("status init"));
        }
        other => panic!("Expected StatusNotInitialized, got {:?}", other),
    }
    // a failed open leaves nothing behind for a later submission to pick up
    assert!(!db.exists());
    assert!(SqliteStatusStore::open(&db).await.is_err());
}
