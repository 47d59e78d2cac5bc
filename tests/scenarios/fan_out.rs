//! Test: foreach fan-out and join

use crate::helpers::*;

fn fan_out_yaml(reads: &std::path::Path, out: &std::path::Path) -> String {
    format!(
        r#"
name: "align"
contents:
  - inputdir: {{ id: reads, path: "{}" }}
  - outputdir: {{ id: out, path: "{}" }}
  - step:
      name: index
      command: "prepare {{{{ out }}}}"
  - foreach:
      id: fq
      dir: reads
      pattern: "\\.fastq$"
      related:
        - {{ id: bam, pattern: "\\.fastq$", replace: ".bam" }}
      steps:
        - command: "align {{{{ fq }}}} > {{{{ bam }}}}"
        - command: "samtools index {{{{ bam }}}}"
  - step:
      name: report
      command: "report {{{{ out }}}}"
"#,
        reads.display(),
        out.display()
    )
}

#[tokio::test]
async fn test_fan_out_joins_before_next_step() {
    let dir = tempfile::tempdir().unwrap();
    let reads = dir.path().join("reads");
    std::fs::create_dir(&reads).unwrap();
    write_file(&reads, "s2.fastq", "@r");
    write_file(&reads, "s1.fastq", "@r");
    write_file(&reads, "README", "skip me");
    let out = dir.path().join("out");

    let definition = load(&fan_out_yaml(&reads, &out), &[]).unwrap();
    let runner = RecordingRunner::new();
    submit(&definition, &runner).await.unwrap();

    let names: Vec<_> = runner.jobs().into_iter().map(|j| j.job_name).collect();
    assert_eq!(
        names,
        vec![
            "align_Step_1",
            "align_Step_2_1_1",
            "align_Step_2_1_2",
            "align_Step_2_2_1",
            "align_Step_2_2_2",
            "align_Step_3",
        ]
    );

    // each item chain starts after step 1
    assert_eq!(runner.job("align_Step_2_1_1").depends_on, vec!["1.mock"]);
    assert_eq!(runner.job("align_Step_2_2_1").depends_on, vec!["1.mock"]);
    assert_eq!(runner.job("align_Step_2_1_2").depends_on, vec!["2.mock"]);

    // the join waits for the last job of every item
    assert_eq!(runner.job("align_Step_3").depends_on, vec!["3.mock", "5.mock"]);

    let s1 = reads.join("s1.fastq").display().to_string();
    let bam1 = reads.join("s1.bam").display().to_string();
    assert_eq!(
        runner.job("align_Step_2_1_1").command,
        format!("align {} > {}", s1, bam1)
    );
}

#[tokio::test]
async fn test_empty_fan_out_passes_dependencies_through() {
    let dir = tempfile::tempdir().unwrap();
    let reads = dir.path().join("reads");
    std::fs::create_dir(&reads).unwrap();
    let out = dir.path().join("out");

    let definition = load(&fan_out_yaml(&reads, &out), &[]).unwrap();
    let runner = RecordingRunner::new();
    submit(&definition, &runner).await.unwrap();

    let jobs = runner.jobs();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[1].job_name, "align_Step_3");
    assert_eq!(jobs[1].depends_on, vec!["1.mock"]);
}
