//! CLI output formatting

use crate::core::{FileEntity, SubmissionState};
use crate::execution::SubmissionEvent;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Progress bar over the pipeline's steps
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let template = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}");
    if let Ok(template) = template {
        progress.set_style(template.progress_chars("#>-"));
    }
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

pub fn format_state(state: SubmissionState) -> String {
    match state {
        SubmissionState::NotStarted => style("NOT STARTED").dim().to_string(),
        SubmissionState::Submitting => style("SUBMITTING").yellow().to_string(),
        SubmissionState::Submitted => style("SUBMITTED").green().to_string(),
        SubmissionState::Failed => style("FAILED").red().to_string(),
    }
}

/// Format a submission event for display
pub fn format_submission_event(event: &SubmissionEvent) -> String {
    match event {
        SubmissionEvent::SubmissionStarted {
            submission_id,
            pipeline_name,
            steps,
        } => format!(
            "{} Submitting {} ({} steps, {})",
            ROCKET,
            style(pipeline_name).bold(),
            steps,
            style(&submission_id.to_string()[..8]).dim()
        ),
        SubmissionEvent::StepSubmitted {
            job_name,
            description,
            token,
            ..
        } => format!(
            "{} {} {} → {}",
            CHECK,
            style(job_name).cyan(),
            style(description).dim(),
            style(token).green()
        ),
        SubmissionEvent::StepFailed { job_name, error, .. } => {
            format!("{} {}: {}", CROSS, style(job_name).red(), style(error).dim())
        }
        SubmissionEvent::SubmissionFinished {
            submission_id,
            state,
        } => format!(
            "{} Submission ({}) {}",
            INFO,
            style(&submission_id.to_string()[..8]).dim(),
            format_state(*state)
        ),
    }
}

/// One line of the file listing
pub fn format_file(file: &FileEntity) -> String {
    let path = match file.path() {
        Some(path) => style(path.display().to_string()).green().to_string(),
        None => style("<unresolved>").red().to_string(),
    };
    format!(
        "  {:<16} {:<12} {} {}",
        style(&file.id).cyan(),
        format!("{:?}", file.kind),
        path,
        style(format!("({})", file.rule())).dim()
    )
}
