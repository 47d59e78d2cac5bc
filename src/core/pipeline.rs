//! Pipeline domain model

use crate::core::config::StepDefaults;
use crate::core::error::{PipelineError, Result};
use crate::core::file::FileKind;
use crate::core::step::PipelineStep;
use crate::core::table::FileTable;
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

/// A loaded pipeline with every file path resolved
#[derive(Debug)]
pub struct PipelineDefinition {
    /// Pipeline name, used as the job name prefix
    pub name: String,

    /// Resolved file table
    pub files: FileTable,

    /// Job settings shared by all steps
    pub defaults: StepDefaults,

    /// Live steps in declaration order
    steps: Vec<Box<dyn PipelineStep>>,

    output_dir: OnceLock<PathBuf>,
    log_dir: OnceLock<PathBuf>,
}

impl PipelineDefinition {
    pub fn new(
        name: String,
        files: FileTable,
        steps: Vec<Box<dyn PipelineStep>>,
        defaults: StepDefaults,
    ) -> Self {
        Self {
            name,
            files,
            defaults,
            steps,
            output_dir: OnceLock::new(),
            log_dir: OnceLock::new(),
        }
    }

    /// Use a fixed log directory instead of the timestamped default
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = OnceLock::from(dir.into());
        self
    }

    pub fn steps(&self) -> &[Box<dyn PipelineStep>] {
        &self.steps
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Path of the first declared output directory, `.` when there is none
    pub fn output_dir(&self) -> &Path {
        self.output_dir.get_or_init(|| self.files.output_dir())
    }

    /// `<output_dir>/logs/<YYYYmmdd_HHMMSS>`, fixed on first use
    pub fn log_dir(&self) -> &Path {
        self.log_dir.get_or_init(|| {
            self.output_dir()
                .join("logs")
                .join(Local::now().format("%Y%m%d_%H%M%S").to_string())
        })
    }

    /// Every input file and directory must exist with the declared kind
    pub fn check_inputs(&self) -> Result<()> {
        for file in self.files.iter().filter(|f| f.kind.is_input()) {
            let path = file.path().ok_or_else(|| PipelineError::UnresolvedReference {
                id: file.id.clone(),
                reference: file.id.clone(),
            })?;

            let present = match file.kind {
                FileKind::InputDir => path.is_dir(),
                _ => path.is_file(),
            };
            if !present {
                return Err(PipelineError::MissingInput {
                    id: file.id.clone(),
                    path: path.to_path_buf(),
                });
            }
        }
        Ok(())
    }

    /// Create output directories flagged `create` and the log directory
    pub fn prepare_directories(&self) -> Result<()> {
        let wanted = self
            .files
            .iter()
            .filter(|f| f.kind == FileKind::OutputDir && f.create)
            .filter_map(|f| f.path());

        for dir in wanted.chain(std::iter::once(self.log_dir())) {
            debug!("Creating directory {}", dir.display());
            std::fs::create_dir_all(dir)
                .map_err(|e| PipelineError::io(format!("Failed to create {}", dir.display()), e))?;
        }
        Ok(())
    }
}
