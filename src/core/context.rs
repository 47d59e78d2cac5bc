//! Per-submission context shared by all steps

use crate::core::pipeline::PipelineDefinition;
use crate::core::table::FileTable;
use crate::scheduler::JobRunner;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Everything a step needs while it submits jobs
pub struct SubmitContext<'a> {
    pub pipeline_name: &'a str,

    /// Resolved file table
    pub files: &'a FileTable,

    /// Id to path, for placeholder substitution
    pub paths: HashMap<String, PathBuf>,

    /// Where batch scripts and job output go
    pub log_dir: &'a Path,

    pub runner: &'a dyn JobRunner,
}

impl<'a> SubmitContext<'a> {
    pub fn new(definition: &'a PipelineDefinition, runner: &'a dyn JobRunner) -> Self {
        Self {
            pipeline_name: &definition.name,
            files: &definition.files,
            paths: definition.files.resolved_paths(),
            log_dir: definition.log_dir(),
            runner,
        }
    }

    /// Job name of the 1-based step `index`
    pub fn job_name(&self, index: usize) -> String {
        format!("{}_Step_{}", self.pipeline_name, index)
    }
}
