//! PBS batch script rendering

use crate::scheduler::{dependency_ids, DependencyToken, Invocation};
use std::path::{Path, PathBuf};

/// Batch script for one job
#[derive(Debug, Clone)]
pub struct BatchScript {
    pub job_name: String,
    pub contents: String,
}

impl BatchScript {
    pub fn render(job_name: &str, depends_on: &[DependencyToken], invocation: &Invocation) -> Self {
        let resources = &invocation.resources;
        let log = |ext: &str| invocation.log_dir.join(format!("{}.{}", job_name, ext));

        let mut lines = vec![
            "#!/bin/bash".to_string(),
            format!("#PBS -N {}", job_name),
            format!("#PBS -l walltime={}", resources.walltime),
            format!("#PBS -l mem={}", resources.mem),
            format!("#PBS -l nodes=1:ppn={}", resources.threads),
        ];
        if let Some(queue) = &resources.queue {
            lines.push(format!("#PBS -q {}", queue));
        }
        lines.push(format!("#PBS -o {}", log("o").display()));
        lines.push(format!("#PBS -e {}", log("e").display()));

        let ids = dependency_ids(depends_on);
        if !ids.is_empty() {
            lines.push(format!("#PBS -W depend=afterok:{}", ids.join(":")));
        }

        lines.push(String::new());
        for module in &invocation.modules {
            lines.push(format!("module load {}", module));
        }
        lines.push("set -e".to_string());
        lines.push(String::new());
        lines.push(invocation.command.clone());
        lines.push(String::new());

        Self {
            job_name: job_name.to_string(),
            contents: lines.join("\n"),
        }
    }

    /// Write the script as `<dir>/<job_name>.sh`
    pub fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let path = dir.join(format!("{}.sh", self.job_name));
        std::fs::write(&path, &self.contents)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::JobResources;

    fn invocation() -> Invocation {
        Invocation {
            command: "bwa mem ref.fa reads.fq > out.sam".to_string(),
            resources: JobResources {
                walltime: "02:00:00".to_string(),
                mem: "8gb".to_string(),
                threads: 4,
                queue: Some("batch".to_string()),
            },
            modules: vec!["bwa/0.7.17".to_string()],
            log_dir: PathBuf::from("/out/logs"),
        }
    }

    #[test]
    fn test_render_directives() {
        let script = BatchScript::render(
            "exome_Step_2",
            &[DependencyToken::job("101.head")],
            &invocation(),
        );
        let text = &script.contents;
        assert!(text.starts_with("#!/bin/bash\n#PBS -N exome_Step_2\n"));
        assert!(text.contains("#PBS -l walltime=02:00:00"));
        assert!(text.contains("#PBS -l nodes=1:ppn=4"));
        assert!(text.contains("#PBS -q batch"));
        assert!(text.contains("#PBS -o /out/logs/exome_Step_2.o"));
        assert!(text.contains("#PBS -W depend=afterok:101.head"));
        assert!(text.contains("module load bwa/0.7.17\nset -e"));
        assert!(text.trim_end().ends_with("bwa mem ref.fa reads.fq > out.sam"));
    }

    #[test]
    fn test_no_dependency_directive_for_first_step() {
        let script = BatchScript::render("exome_Step_1", &[], &invocation());
        assert!(!script.contents.contains("depend="));
    }
}
