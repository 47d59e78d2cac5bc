//! Test: file resolution end to end

use crate::helpers::*;
use batchline::PipelineError;
use std::path::Path;

#[tokio::test]
async fn test_positional_input_single_step() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "sample.txt", "a\nb\n");
    let out = dir.path().join("out");

    let yaml = format!(
        r#"
name: "scenarioA"
contents:
  - input: {{ id: in1, positional: 1 }}
  - outputdir: {{ id: outdir, path: "{}" }}
  - step:
      command: "wc -l {{{{ in1 }}}}"
"#,
        out.display()
    );

    let definition = load(&yaml, &[&input]).unwrap();
    assert_eq!(definition.files.path("in1"), Some(Path::new(&input)));

    let runner = RecordingRunner::new();
    submit(&definition, &runner).await.unwrap();

    let jobs = runner.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job_name, "scenarioA_Step_1");
    assert!(jobs[0].depends_on.is_empty());
    assert_eq!(jobs[0].command, format!("wc -l {}", input));
    assert!(out.is_dir());
}

#[test]
fn test_missing_positional_assigns_nothing() {
    let yaml = r#"
name: "p"
contents:
  - input: { id: a, positional: 1 }
  - input: { id: b, positional: 3 }
"#;
    let err = load(yaml, &["/x", "/y"]).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::InsufficientArguments { required: 3, supplied: 2 }
    ));
}

#[test]
fn test_temp_then_derived() {
    let dir = tempfile::tempdir().unwrap();
    let yaml = format!(
        r#"
name: "scenarioB"
contents:
  - outputdir: {{ id: out, path: "{}" }}
  - tempfile: {{ id: tmp1, suffix: .tmp }}
  - tempfile: {{ id: tmp2 }}
  - output: {{ id: derived1, based_on: tmp1, pattern: "\\.tmp$", replace: ".out" }}
  - output: {{ id: derived2, based_on: tmp2, pattern: "\\.tmp$", replace: ".out" }}
"#,
        dir.path().display()
    );

    let definition = load(&yaml, &[]).unwrap();
    let tmp1 = definition.files.path("tmp1").unwrap().display().to_string();
    let tmp2 = definition.files.path("tmp2").unwrap().display().to_string();

    assert!(tmp1.ends_with(".tmp"));
    assert!(Path::new(&tmp1).starts_with(dir.path()));
    assert_ne!(tmp1, tmp2);

    let derived1 = definition.files.path("derived1").unwrap().display().to_string();
    assert_eq!(derived1, format!("{}.out", tmp1.trim_end_matches(".tmp")));

    // no `.tmp` suffix: the pattern does not match and the path is kept
    let derived2 = definition.files.path("derived2").unwrap().display().to_string();
    assert_eq!(derived2, tmp2);
}

#[test]
fn test_derivation_chain_declared_backwards() {
    let yaml = r#"
name: "p"
contents:
  - output: { id: c, based_on: b, pattern: "\\.b$", replace: ".c" }
  - output: { id: b, based_on: a, pattern: "\\.a$", replace: ".b" }
  - input: { id: a, positional: 1 }
"#;
    let definition = load(yaml, &["/data/x.a"]).unwrap();
    assert_eq!(definition.files.path("b"), Some(Path::new("/data/x.b")));
    assert_eq!(definition.files.path("c"), Some(Path::new("/data/x.c")));
}

#[test]
fn test_in_dir_prefixes_every_rule() {
    let dir = tempfile::tempdir().unwrap();
    let yaml = format!(
        r#"
name: "p"
contents:
  - outputdir: {{ id: out, path: "{}" }}
  - outputdir: {{ id: results, path: results, in_dir: out }}
  - input: {{ id: reads, positional: 1, in_dir: out }}
  - output: {{ id: table, path: table.tsv, in_dir: results }}
  - tempfile: {{ id: scratch, in_dir: results }}
  - output: {{ id: summary, based_on: reads, pattern: "\\.fq$", replace: ".txt", in_dir: results }}
"#,
        dir.path().display()
    );

    let definition = load(&yaml, &["/elsewhere/s1.fq"]).unwrap();
    let results = dir.path().join("results");
    let files = &definition.files;

    assert_eq!(files.path("results"), Some(results.as_path()));
    assert_eq!(files.path("reads"), Some(dir.path().join("s1.fq").as_path()));
    assert_eq!(files.path("table"), Some(results.join("table.tsv").as_path()));
    assert_eq!(files.path("summary"), Some(results.join("s1.txt").as_path()));
    let scratch = files.path("scratch").unwrap();
    assert!(scratch.starts_with(&results));
    assert!(scratch.is_file());
    let stray = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .any(|entry| entry.file_name().to_string_lossy().starts_with("scratch_"));
    assert!(!stray);
}

#[test]
fn test_temp_under_output_dir_placed_in_dir() {
    let base = tempfile::tempdir().unwrap();
    let yaml = format!(
        r#"
name: "p"
contents:
  - inputdir: {{ id: base, path: "{}" }}
  - outputdir: {{ id: out, path: run1, in_dir: base }}
  - tempfile: {{ id: scratch }}
"#,
        base.path().display()
    );

    let definition = load(&yaml, &[]).unwrap();
    let out = base.path().join("run1");

    assert_eq!(definition.output_dir(), out.as_path());
    let scratch = definition.files.path("scratch").unwrap();
    assert!(scratch.starts_with(&out), "temp at {}", scratch.display());
    assert!(scratch.is_file());
}

#[test]
fn test_cycle_is_malformed() {
    let yaml = r#"
name: "p"
contents:
  - output: { id: a, based_on: b, pattern: "x", replace: "y" }
  - output: { id: b, based_on: a, pattern: "x", replace: "y" }
"#;
    let err = load(yaml, &[]).unwrap_err();
    assert!(matches!(err, PipelineError::MalformedDefinition(ref m) if m.contains("cycle")));
}
