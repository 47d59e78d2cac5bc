//! File entity domain model

use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// What a declared file entity stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    InputFile,
    InputDir,
    OutputFile,
    OutputDir,
    TempFile,
}

impl FileKind {
    /// Map a definition tag to a file kind (`None` for step tags)
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "input" => Some(FileKind::InputFile),
            "inputdir" => Some(FileKind::InputDir),
            "output" => Some(FileKind::OutputFile),
            "outputdir" => Some(FileKind::OutputDir),
            "tempfile" => Some(FileKind::TempFile),
            _ => None,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, FileKind::InputDir | FileKind::OutputDir)
    }

    pub fn is_input(&self) -> bool {
        matches!(self, FileKind::InputFile | FileKind::InputDir)
    }
}

/// The single rule that produces an entity's path
#[derive(Debug, Clone)]
pub enum PathSource {
    /// Path written in the definition
    Literal(PathBuf),
    /// Path taken from the 1-based command line argument
    Positional(usize),
    /// Freshly allocated scratch file under the output directory
    Temp,
    /// Path computed from another entity's path by regex substitution
    BasedOn {
        source: String,
        pattern: Regex,
        replace: String,
    },
}

impl PathSource {
    fn describe(&self) -> String {
        match self {
            PathSource::Literal(_) => "literal".to_string(),
            PathSource::Positional(index) => format!("positional {}", index),
            PathSource::Temp => "temp".to_string(),
            PathSource::BasedOn { source, .. } => format!("based_on {}", source),
        }
    }
}

/// A named, typed reference to a file or directory
#[derive(Debug, Clone)]
pub struct FileEntity {
    pub id: String,
    pub kind: FileKind,
    pub source: PathSource,

    /// Directory entity whose path becomes this entity's prefix
    pub in_dir: Option<String>,

    /// Suffix for generated temp file names
    pub suffix: Option<String>,

    /// Create this (output) directory before submitting
    pub create: bool,

    /// Resolved path, absent until resolution assigns it
    path: Option<PathBuf>,
}

impl FileEntity {
    pub fn new(id: impl Into<String>, kind: FileKind, source: PathSource) -> Self {
        let create = kind == FileKind::OutputDir;
        Self {
            id: id.into(),
            kind,
            source,
            in_dir: None,
            suffix: None,
            create,
            path: None,
        }
    }

    pub fn with_in_dir(mut self, dir: impl Into<String>) -> Self {
        self.in_dir = Some(dir.into());
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_resolved(&self) -> bool {
        self.path.is_some()
    }

    pub fn is_temp(&self) -> bool {
        matches!(self.source, PathSource::Temp)
    }

    pub fn based_on(&self) -> Option<&str> {
        match &self.source {
            PathSource::BasedOn { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Short description of how the path is produced (for listings)
    pub fn rule(&self) -> String {
        match &self.in_dir {
            Some(dir) => format!("{} in {}", self.source.describe(), dir),
            None => self.source.describe(),
        }
    }

    /// Only the resolution passes assign paths
    pub(crate) fn set_path(&mut self, path: PathBuf) {
        self.path = Some(path);
    }
}
