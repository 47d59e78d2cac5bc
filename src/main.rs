use anyhow::{Context, Result};
use batchline::cli::commands::{StatusAction, StatusCommand, SubmitCommand, ValidateCommand};
use batchline::cli::output::*;
use batchline::cli::{Cli, Command};
use batchline::core::PipelineLoader;
use batchline::execution::{ExecMode, Orchestrator, SubmissionEvent};
use batchline::persistence::{InMemoryStatus, StatusRecord};
use batchline::scheduler::{runner_for_mode, RunnerOptions};
use std::path::{Path, PathBuf};
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let result = match &cli.command {
        Command::Submit(cmd) => submit_pipeline(cmd).await,
        Command::Validate(cmd) => validate_pipeline(cmd),
        Command::Status(cmd) => manage_status(cmd).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        eprintln!("{} {:#}", CROSS, style(&e).red());
        std::process::exit(1);
    }

    Ok(())
}

fn default_status_db(output_dir: &Path) -> PathBuf {
    output_dir.join(".batchline").join("status.db")
}

async fn submit_pipeline(cmd: &SubmitCommand) -> Result<()> {
    let mut definition = PipelineLoader::load_file(&cmd.file, &cmd.args)
        .with_context(|| format!("Failed to load pipeline {}", cmd.file.display()))?;
    if let Some(log_dir) = &cmd.log_dir {
        definition = definition.with_log_dir(log_dir);
    }

    println!(
        "{} Loaded pipeline: {} ({} steps)",
        INFO,
        style(&definition.name).bold(),
        definition.step_count()
    );

    let mode = if cmd.dry_run {
        ExecMode::NoSubmit
    } else {
        let marker_dir = cmd
            .log_dir
            .clone()
            .unwrap_or_else(|| definition.output_dir().to_path_buf());
        ExecMode::detect(&marker_dir)
    };
    println!("{} Execution mode: {}", INFO, style(mode.label()).cyan());

    let options = RunnerOptions {
        qsub: cmd.qsub.clone(),
        qsub_timeout_secs: cmd.qsub_timeout,
        managed_db: cmd.managed_db.clone(),
    };
    let runner = runner_for_mode(mode, &options).await?;

    let status: Box<dyn StatusRecord> = if mode.submits_jobs() {
        let path = cmd
            .status_db
            .clone()
            .unwrap_or_else(|| default_status_db(definition.output_dir()));
        open_status(&path).await?
    } else {
        Box::new(InMemoryStatus::new())
    };

    let progress = create_progress_bar(definition.step_count());
    let bar = progress.clone();
    let mut orchestrator = Orchestrator::new();
    orchestrator.add_event_handler(move |event| {
        if let SubmissionEvent::StepSubmitted { .. } = event {
            bar.inc(1);
        }
        bar.println(format_submission_event(event));
    });

    let result = orchestrator
        .submit(&definition, runner.as_ref(), status.as_ref())
        .await;
    progress.finish_and_clear();

    let token = result.with_context(|| format!("Failed to submit {}", definition.name))?;
    println!(
        "\n{} {} submitted {} (final job: {}, logs: {})",
        CHECK,
        style(&definition.name).bold(),
        style("successfully").green(),
        style(&token).cyan(),
        style(definition.log_dir().display()).dim()
    );

    Ok(())
}

#[cfg(feature = "sqlite")]
async fn open_status(path: &Path) -> Result<Box<dyn StatusRecord>> {
    let store = batchline::persistence::SqliteStatusStore::open(path)
        .await
        .with_context(|| format!("Failed to open status record {}", path.display()))?;
    Ok(Box::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn open_status(path: &Path) -> Result<Box<dyn StatusRecord>> {
    println!(
        "{} Built without sqlite; status record {} is not persisted",
        WARN,
        path.display()
    );
    Ok(Box::new(InMemoryStatus::new()))
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    let definition = PipelineLoader::load_file(&cmd.file, &cmd.args)
        .with_context(|| format!("Failed to load pipeline {}", cmd.file.display()))?;

    if cmd.json {
        let files: Vec<_> = definition
            .files
            .iter()
            .map(|f| {
                serde_json::json!({
                    "id": f.id,
                    "kind": f.kind,
                    "path": f.path().map(|p| p.display().to_string()),
                    "rule": f.rule(),
                })
            })
            .collect();
        let steps: Vec<_> = definition.steps().iter().map(|s| s.describe()).collect();
        let report = serde_json::json!({
            "name": definition.name,
            "output_dir": definition.output_dir().display().to_string(),
            "files": files,
            "steps": steps,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} Pipeline {} is valid",
        CHECK,
        style(&definition.name).bold()
    );
    println!("\n{} Files:", INFO);
    for file in definition.files.iter() {
        println!("{}", format_file(file));
    }
    println!("\n{} Steps:", INFO);
    for (i, step) in definition.steps().iter().enumerate() {
        println!("  {}. {}", i + 1, step.describe());
    }

    Ok(())
}

#[cfg(feature = "sqlite")]
async fn manage_status(cmd: &StatusCommand) -> Result<()> {
    use batchline::persistence::SqliteStatusStore;

    match &cmd.action {
        StatusAction::Init { db } => {
            SqliteStatusStore::initialize(db).await?;
            println!("{} Initialized {}", CHECK, style(db.display()).cyan());
        }
        StatusAction::Show { db, json } => {
            let store = SqliteStatusStore::open(db).await?;
            let snapshot = store.snapshot().await?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                let started = if snapshot.started {
                    style("submitted").yellow().to_string()
                } else {
                    style("not submitted").green().to_string()
                };
                println!("{} {}: {}", INFO, style(db.display()).cyan(), started);
                println!("  schema version: {}", snapshot.schema_version);
                if let Some(updated_at) = snapshot.updated_at {
                    println!("  updated: {}", updated_at.format("%Y-%m-%d %H:%M:%S"));
                }
            }
        }
        StatusAction::Reset { db } => {
            let store = SqliteStatusStore::open(db).await?;
            store.set_started(false).await?;
            println!("{} Reset {}", WARN, style(db.display()).cyan());
        }
    }
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
async fn manage_status(_cmd: &StatusCommand) -> Result<()> {
    anyhow::bail!("status commands need the sqlite feature")
}
