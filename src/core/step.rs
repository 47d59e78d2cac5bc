//! Step domain model
//!
//! Steps are declared in the definition but only built once every file path
//! is final, so a step can check its file references up front.

use crate::core::config::StepDefaults;
use crate::core::context::SubmitContext;
use crate::core::error::{PipelineError, Result};
use crate::core::resolve::derive_path;
use crate::core::table::FileTable;
use crate::scheduler::{DependencyToken, Invocation, JobResources};
use async_trait::async_trait;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// A live pipeline step that knows how to submit itself
#[async_trait]
pub trait PipelineStep: Send + Sync + std::fmt::Debug {
    /// Submit the step after `depends_on`, returning the token that
    /// represents its completion
    async fn submit(
        &self,
        ctx: &SubmitContext<'_>,
        depends_on: &[DependencyToken],
        job_name: &str,
    ) -> Result<DependencyToken>;

    /// One-line description for listings
    fn describe(&self) -> String;
}

/// Which tag a stashed declaration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Tool,
    ForEach,
}

/// A `step` or `foreach` body kept unparsed until file resolution is done
#[derive(Debug, Clone)]
pub struct StepDeclaration {
    pub kind: StepKind,
    body: Value,
}

impl StepDeclaration {
    pub fn new(kind: StepKind, body: Value) -> Self {
        Self { kind, body }
    }

    /// Second loading pass: parse the body against the resolved table
    pub fn instantiate(
        &self,
        files: &FileTable,
        defaults: &StepDefaults,
    ) -> Result<Box<dyn PipelineStep>> {
        match self.kind {
            StepKind::Tool => {
                let config: ToolStepConfig = serde_yaml::from_value(self.body.clone())
                    .map_err(|e| PipelineError::malformed(format!("invalid step: {}", e)))?;
                let known: HashSet<String> = files.ids().map(str::to_string).collect();
                Ok(Box::new(ToolStep::from_config(&config, defaults, &known)?))
            }
            StepKind::ForEach => {
                let config: ForEachConfig = serde_yaml::from_value(self.body.clone())
                    .map_err(|e| PipelineError::malformed(format!("invalid foreach: {}", e)))?;
                Ok(Box::new(ForEachStep::from_config(&config, files, defaults)?))
            }
        }
    }
}

/// Single tool invocation as written in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolStepConfig {
    /// Human-readable label
    #[serde(default)]
    pub name: Option<String>,

    /// Shell command; `{{ id }}` is replaced by the file's path
    pub command: String,

    #[serde(default)]
    pub walltime: Option<String>,

    #[serde(default)]
    pub mem: Option<String>,

    #[serde(default)]
    pub threads: Option<u32>,

    #[serde(default)]
    pub queue: Option<String>,

    /// Environment modules loaded before the command
    #[serde(default)]
    pub modules: Vec<String>,
}

/// Fan-out over the files of a directory, as written in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForEachConfig {
    /// Id bound to the current file in each iteration
    pub id: String,

    /// Directory entity to iterate over
    pub dir: String,

    /// Regex selecting file names in the directory
    pub pattern: String,

    /// Files derived from the current file in each iteration
    #[serde(default)]
    pub related: Vec<RelatedFileConfig>,

    /// Steps run for every matching file
    pub steps: Vec<ToolStepConfig>,
}

/// Per-iteration file derived from the loop file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelatedFileConfig {
    pub id: String,
    pub pattern: String,
    #[serde(default)]
    pub replace: String,
}

/// Reject ids that a `{{ id }}` placeholder could not name
pub(crate) fn check_id(id: &str, what: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if !valid {
        return Err(PipelineError::malformed(format!(
            "{} id '{}' may only use ASCII letters, digits, '_', '.' or '-'",
            what, id
        )));
    }
    Ok(())
}

/// Anything written like a placeholder, valid or not
fn braced() -> &'static Regex {
    static BRACED: OnceLock<Regex> = OnceLock::new();
    BRACED.get_or_init(|| Regex::new(r"\{\{([^{}]*)\}\}").expect("braced pattern is valid"))
}

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("placeholder pattern is valid")
    })
}

/// One tool invocation
#[derive(Debug, Clone)]
pub struct ToolStep {
    pub name: Option<String>,
    command_template: String,
    references: Vec<String>,
    pub resources: JobResources,
    pub modules: Vec<String>,
}

impl ToolStep {
    /// Build a step, checking every `{{ id }}` against `known`
    pub fn from_config(
        config: &ToolStepConfig,
        defaults: &StepDefaults,
        known: &HashSet<String>,
    ) -> Result<Self> {
        if config.command.trim().is_empty() {
            return Err(PipelineError::malformed(format!(
                "step {} has an empty command",
                config.name.as_deref().unwrap_or("<unnamed>")
            )));
        }

        for caps in braced().captures_iter(&config.command) {
            if !placeholder().is_match(&caps[0]) {
                return Err(PipelineError::malformed(format!(
                    "step {} has an invalid file reference '{}'",
                    config.name.as_deref().unwrap_or("<unnamed>"),
                    &caps[0]
                )));
            }
        }

        let mut references = Vec::new();
        for caps in placeholder().captures_iter(&config.command) {
            let id = caps[1].to_string();
            if !known.contains(&id) {
                return Err(PipelineError::malformed(format!(
                    "step {} references unknown file '{}'",
                    config.name.as_deref().unwrap_or("<unnamed>"),
                    id
                )));
            }
            if !references.contains(&id) {
                references.push(id);
            }
        }

        Ok(ToolStep {
            name: config.name.clone(),
            command_template: config.command.clone(),
            references,
            resources: defaults.resources(
                config.walltime.as_ref(),
                config.mem.as_ref(),
                config.threads,
                config.queue.as_ref(),
            ),
            modules: config.modules.clone(),
        })
    }

    /// File ids used by the command, in order of first use
    pub fn references(&self) -> &[String] {
        &self.references
    }

    /// Substitute file paths into the command
    pub fn render_command(&self, paths: &HashMap<String, PathBuf>) -> String {
        placeholder()
            .replace_all(&self.command_template, |caps: &Captures| {
                match paths.get(&caps[1]) {
                    Some(path) => path.display().to_string(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Submit with an explicit path map (fan-out iterations add their own ids)
    pub async fn submit_with(
        &self,
        ctx: &SubmitContext<'_>,
        paths: &HashMap<String, PathBuf>,
        depends_on: &[DependencyToken],
        job_name: &str,
    ) -> Result<DependencyToken> {
        let invocation = Invocation {
            command: self.render_command(paths),
            resources: self.resources.clone(),
            modules: self.modules.clone(),
            log_dir: ctx.log_dir.to_path_buf(),
        };
        debug!("Command for {}: {}", job_name, invocation.command);

        let token = ctx
            .runner
            .submit(job_name, depends_on, &invocation)
            .await
            .map_err(|source| PipelineError::Scheduler {
                job_name: job_name.to_string(),
                source,
            })?;

        info!("Submitted {} as {}", job_name, token);
        Ok(token)
    }
}

#[async_trait]
impl PipelineStep for ToolStep {
    async fn submit(
        &self,
        ctx: &SubmitContext<'_>,
        depends_on: &[DependencyToken],
        job_name: &str,
    ) -> Result<DependencyToken> {
        self.submit_with(ctx, &ctx.paths, depends_on, job_name).await
    }

    fn describe(&self) -> String {
        match &self.name {
            Some(name) => format!("step {}", name),
            None => format!("step [{}]", self.references.join(", ")),
        }
    }
}

/// Runs its inner steps once per matching file of a directory
#[derive(Debug, Clone)]
pub struct ForEachStep {
    pub loop_id: String,
    pub dir: String,
    pattern: Regex,
    related: Vec<(String, Regex, String)>,
    steps: Vec<ToolStep>,
}

impl ForEachStep {
    pub fn from_config(
        config: &ForEachConfig,
        files: &FileTable,
        defaults: &StepDefaults,
    ) -> Result<Self> {
        check_id(&config.id, "foreach")?;
        for file in &config.related {
            check_id(&file.id, "related file")?;
        }
        let mut known: HashSet<String> = files.ids().map(str::to_string).collect();

        match files.get(&config.dir) {
            Some(dir) if dir.kind.is_dir() => {}
            Some(_) => {
                return Err(PipelineError::malformed(format!(
                    "foreach '{}' iterates over '{}', which is not a directory",
                    config.id, config.dir
                )))
            }
            None => {
                return Err(PipelineError::malformed(format!(
                    "foreach '{}' iterates over unknown directory '{}'",
                    config.id, config.dir
                )))
            }
        }

        let pattern = Regex::new(&config.pattern).map_err(|e| {
            PipelineError::malformed(format!("invalid pattern for foreach '{}': {}", config.id, e))
        })?;

        if !known.insert(config.id.clone()) {
            return Err(PipelineError::malformed(format!(
                "foreach id '{}' clashes with another file id",
                config.id
            )));
        }

        let mut related = Vec::new();
        for file in &config.related {
            if !known.insert(file.id.clone()) {
                return Err(PipelineError::malformed(format!(
                    "related file '{}' in foreach '{}' clashes with another file id",
                    file.id, config.id
                )));
            }
            let file_pattern = Regex::new(&file.pattern).map_err(|e| {
                PipelineError::malformed(format!("invalid pattern for '{}': {}", file.id, e))
            })?;
            related.push((file.id.clone(), file_pattern, file.replace.clone()));
        }

        let steps = config
            .steps
            .iter()
            .map(|step| ToolStep::from_config(step, defaults, &known))
            .collect::<Result<Vec<_>>>()?;

        Ok(ForEachStep {
            loop_id: config.id.clone(),
            dir: config.dir.clone(),
            pattern,
            related,
            steps,
        })
    }

    /// Matching regular files of the directory, sorted by name
    pub fn items(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let context = || format!("Failed to list {}", dir.display());
        let mut items = Vec::new();

        for entry in std::fs::read_dir(dir).map_err(|e| PipelineError::io(context(), e))? {
            let entry = entry.map_err(|e| PipelineError::io(context(), e))?;
            let is_file = entry
                .file_type()
                .map_err(|e| PipelineError::io(context(), e))?
                .is_file();
            if is_file && self.pattern.is_match(&entry.file_name().to_string_lossy()) {
                items.push(entry.path());
            }
        }

        items.sort();
        Ok(items)
    }
}

#[async_trait]
impl PipelineStep for ForEachStep {
    async fn submit(
        &self,
        ctx: &SubmitContext<'_>,
        depends_on: &[DependencyToken],
        job_name: &str,
    ) -> Result<DependencyToken> {
        let dir = ctx
            .files
            .path(&self.dir)
            .ok_or_else(|| PipelineError::UnresolvedReference {
                id: self.loop_id.clone(),
                reference: self.dir.clone(),
            })?;
        let items = self.items(dir)?;

        if items.is_empty() {
            warn!(
                "foreach {} matched no files in {}; passing dependencies through",
                job_name,
                dir.display()
            );
            return Ok(DependencyToken::join(depends_on.iter().cloned()));
        }

        info!("foreach {} expands over {} files", job_name, items.len());

        let mut finals = Vec::with_capacity(items.len());
        for (k, item) in items.iter().enumerate() {
            let mut paths = ctx.paths.clone();
            paths.insert(self.loop_id.clone(), item.clone());
            for (id, pattern, replace) in &self.related {
                paths.insert(id.clone(), derive_path(item, pattern, replace));
            }

            let mut incoming = depends_on.to_vec();
            for (j, step) in self.steps.iter().enumerate() {
                let name = format!("{}_{}_{}", job_name, k + 1, j + 1);
                let token = step.submit_with(ctx, &paths, &incoming, &name).await?;
                incoming = vec![token];
            }
            finals.extend(incoming);
        }

        Ok(DependencyToken::join(finals))
    }

    fn describe(&self) -> String {
        format!(
            "foreach {} in {} ({} steps)",
            self.loop_id,
            self.dir,
            self.steps.len()
        )
    }
}
