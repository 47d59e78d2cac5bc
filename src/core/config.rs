//! Pipeline definition loading from YAML
//!
//! A definition is a mapping with a `name`, optional job `defaults`, and an
//! ordered `contents` list of single-tag entries:
//!
//! ```yaml
//! name: exome
//! contents:
//!   - input: { id: reads, positional: 1 }
//!   - outputdir: { id: out, path: /scratch/exome }
//!   - tempfile: { id: sam, suffix: .tmp }
//!   - output: { id: bam, based_on: sam, pattern: "\\.tmp$", replace: ".bam" }
//!   - step:
//!       command: "align {{ reads }} > {{ sam }}"
//! ```
//!
//! Loading happens in two passes. File declarations go into the
//! [`FileTable`] right away while `step` and `foreach` bodies are stashed
//! unparsed; after the table is resolved the stashed bodies become live steps.

use crate::core::error::{PipelineError, Result};
use crate::core::file::{FileEntity, FileKind, PathSource};
use crate::core::pipeline::PipelineDefinition;
use crate::core::resolve::resolve;
use crate::core::step::{check_id, StepDeclaration, StepKind};
use crate::core::table::FileTable;
use crate::scheduler::JobResources;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Tags allowed in `contents`
pub const VALID_TAGS: [&str; 7] = [
    "input",
    "inputdir",
    "foreach",
    "output",
    "outputdir",
    "tempfile",
    "step",
];

const ROOT_KEYS: [&str; 3] = ["name", "defaults", "contents"];

/// File or directory declaration as written in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Unique file identifier
    pub id: String,

    /// Literal path
    #[serde(default)]
    pub path: Option<String>,

    /// 1-based index of the command line argument holding the path
    #[serde(default)]
    pub positional: Option<usize>,

    /// Id of the file whose path this one is derived from
    #[serde(default)]
    pub based_on: Option<String>,

    /// Regex applied to the `based_on` file's path
    #[serde(default)]
    pub pattern: Option<String>,

    /// Replacement for `pattern` matches
    #[serde(default)]
    pub replace: Option<String>,

    /// Directory entity this file lives in
    #[serde(default)]
    pub in_dir: Option<String>,

    /// Name suffix for temp files
    #[serde(default)]
    pub suffix: Option<String>,

    /// Whether an output directory is created before submission
    #[serde(default)]
    pub create: Option<bool>,
}

impl FileConfig {
    /// Build a file entity of the given kind, checking that exactly one path rule is set
    pub fn to_entity(&self, kind: FileKind) -> Result<FileEntity> {
        let id = self.id.trim();
        if id.is_empty() {
            return Err(PipelineError::malformed(format!("{:?} declaration without an id", kind)));
        }
        check_id(id, "file")?;

        let rules = [
            self.path.is_some(),
            self.positional.is_some(),
            self.based_on.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();

        if kind == FileKind::TempFile {
            if rules > 0 {
                return Err(PipelineError::malformed(format!(
                    "temp file '{}' may not declare path, positional or based_on",
                    id
                )));
            }
        } else if rules != 1 {
            return Err(PipelineError::malformed(format!(
                "file '{}' must declare exactly one of path, positional or based_on",
                id
            )));
        }

        if self.based_on.is_none() && (self.pattern.is_some() || self.replace.is_some()) {
            return Err(PipelineError::malformed(format!(
                "file '{}' has pattern/replace without based_on",
                id
            )));
        }
        if self.suffix.is_some() && kind != FileKind::TempFile {
            return Err(PipelineError::malformed(format!(
                "only temp files take a suffix ('{}')",
                id
            )));
        }
        if self.create.is_some() && kind != FileKind::OutputDir {
            return Err(PipelineError::malformed(format!(
                "only output directories take create ('{}')",
                id
            )));
        }

        let source = if kind == FileKind::TempFile {
            PathSource::Temp
        } else if let Some(path) = &self.path {
            PathSource::Literal(PathBuf::from(path))
        } else if let Some(index) = self.positional {
            if index == 0 {
                return Err(PipelineError::malformed(format!(
                    "positional index of '{}' must start at 1",
                    id
                )));
            }
            PathSource::Positional(index)
        } else {
            let source = self.based_on.clone().unwrap_or_default();
            let pattern = self.pattern.as_deref().ok_or_else(|| {
                PipelineError::malformed(format!("file '{}' is based_on '{}' but has no pattern", id, source))
            })?;
            let pattern = Regex::new(pattern).map_err(|e| {
                PipelineError::malformed(format!("invalid pattern for '{}': {}", id, e))
            })?;
            PathSource::BasedOn {
                source,
                pattern,
                replace: self.replace.clone().unwrap_or_default(),
            }
        };

        let mut entity = FileEntity::new(id, kind, source);
        entity.in_dir = self.in_dir.clone();
        entity.suffix = self.suffix.clone();
        if let Some(create) = self.create {
            entity.create = create;
        }
        Ok(entity)
    }
}

/// Job settings shared by every step unless the step overrides them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepDefaults {
    /// Wall clock limit, `HH:MM:SS`
    #[serde(default)]
    pub walltime: Option<String>,

    /// Memory request, e.g. `8gb`
    #[serde(default)]
    pub mem: Option<String>,

    /// Processors per node
    #[serde(default)]
    pub threads: Option<u32>,

    /// Scheduler queue
    #[serde(default)]
    pub queue: Option<String>,
}

impl StepDefaults {
    /// Merge step-level overrides on top of these defaults
    pub fn resources(
        &self,
        walltime: Option<&String>,
        mem: Option<&String>,
        threads: Option<u32>,
        queue: Option<&String>,
    ) -> JobResources {
        let base = JobResources::default();
        JobResources {
            walltime: walltime.or(self.walltime.as_ref()).cloned().unwrap_or(base.walltime),
            mem: mem.or(self.mem.as_ref()).cloned().unwrap_or(base.mem),
            threads: threads.or(self.threads).unwrap_or(base.threads),
            queue: queue.or(self.queue.as_ref()).cloned(),
        }
    }
}

/// Result of the first loading pass
#[derive(Debug)]
pub struct ParsedDefinition {
    pub name: String,
    pub defaults: StepDefaults,
    pub files: FileTable,
    pub pending: Vec<StepDeclaration>,
}

impl ParsedDefinition {
    /// First pass: validate the tree, fill the file table and stash steps
    pub fn parse(source: &str) -> Result<Self> {
        let root: Value = serde_yaml::from_str(source)
            .map_err(|e| PipelineError::malformed(format!("invalid YAML: {}", e)))?;
        let root = root
            .as_mapping()
            .ok_or_else(|| PipelineError::malformed("the pipeline must be a mapping with a name"))?;

        for key in root.keys() {
            let known = key.as_str().is_some_and(|k| ROOT_KEYS.contains(&k));
            if !known {
                return Err(PipelineError::malformed(format!(
                    "unexpected top-level entry {}; a pipeline holds only name, defaults and contents",
                    describe_value(key)
                )));
            }
        }

        let name = root
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| PipelineError::malformed("the pipeline must have a non-empty name"))?
            .to_string();

        let defaults = match root.get("defaults") {
            None | Some(Value::Null) => StepDefaults::default(),
            Some(value) => serde_yaml::from_value(value.clone())
                .map_err(|e| PipelineError::malformed(format!("invalid defaults: {}", e)))?,
        };

        let contents = match root.get("contents") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Sequence(items)) => items.clone(),
            Some(other) => {
                return Err(PipelineError::malformed(format!(
                    "contents must be a list, found {}",
                    describe_value(other)
                )))
            }
        };

        let mut files = FileTable::new();
        let mut pending = Vec::new();

        for (position, entry) in contents.iter().enumerate() {
            let (tag, body) = match entry {
                Value::Mapping(map) if map.len() == 1 => {
                    let (tag, body) = map.iter().next().ok_or_else(|| {
                        PipelineError::malformed(format!("entry {} is empty", position + 1))
                    })?;
                    let tag = tag.as_str().ok_or_else(|| {
                        PipelineError::malformed(format!("entry {} has a non-string tag", position + 1))
                    })?;
                    (tag, body)
                }
                Value::String(_) | Value::Number(_) | Value::Bool(_) => {
                    return Err(PipelineError::malformed(format!(
                        "free-form text is not allowed among pipeline contents: {}",
                        describe_value(entry)
                    )))
                }
                _ => {
                    return Err(PipelineError::malformed(format!(
                        "entry {} must be a single tag such as `step:` or `input:`",
                        position + 1
                    )))
                }
            };

            if !VALID_TAGS.contains(&tag) {
                return Err(PipelineError::malformed(format!("illegal tag: {}", tag)));
            }

            match tag {
                "step" => pending.push(StepDeclaration::new(StepKind::Tool, body.clone())),
                "foreach" => pending.push(StepDeclaration::new(StepKind::ForEach, body.clone())),
                _ => {
                    let kind = FileKind::from_tag(tag)
                        .ok_or_else(|| PipelineError::malformed(format!("illegal tag: {}", tag)))?;
                    let config: FileConfig = serde_yaml::from_value(body.clone()).map_err(|e| {
                        PipelineError::malformed(format!("invalid {} declaration: {}", tag, e))
                    })?;
                    let entity = config.to_entity(kind)?;
                    debug!("Declared {} '{}' ({})", tag, entity.id, entity.rule());
                    files.insert(entity).map_err(|dup| {
                        PipelineError::malformed(format!("duplicate file id: {}", dup.id))
                    })?;
                }
            }
        }

        Ok(Self {
            name,
            defaults,
            files,
            pending,
        })
    }
}

/// Loads pipeline definitions
pub struct PipelineLoader;

impl PipelineLoader {
    /// Load a definition from a YAML file
    pub fn load_file<P: AsRef<Path>>(path: P, args: &[String]) -> Result<PipelineDefinition> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::io(format!("Failed to read {}", path.display()), e))?;
        Self::load(&content, args)
    }

    /// Load a definition from YAML text, resolving files against `args`
    pub fn load(source: &str, args: &[String]) -> Result<PipelineDefinition> {
        let ParsedDefinition {
            name,
            defaults,
            mut files,
            pending,
        } = ParsedDefinition::parse(source)?;

        resolve(&mut files, args)?;

        let steps = pending
            .iter()
            .map(|declaration| declaration.instantiate(&files, &defaults))
            .collect::<Result<Vec<_>>>()?;

        info!(
            "Loaded pipeline {} ({} files, {} steps)",
            name,
            files.len(),
            steps.len()
        );

        Ok(PipelineDefinition::new(name, files, steps, defaults))
    }
}

fn describe_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Sequence(_) => "a list".to_string(),
        Value::Mapping(_) => "a mapping".to_string(),
        Value::Tagged(tagged) => format!("tagged value {}", tagged.tag),
    }
}
