//! CLI command definitions

use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Submit a pipeline
#[derive(Debug, Args, Clone)]
pub struct SubmitCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Positional arguments referenced by `positional:` file declarations
    #[arg(value_name = "ARGS")]
    pub args: Vec<String>,

    /// Write batch scripts but do not contact a scheduler
    #[arg(long)]
    pub dry_run: bool,

    /// Log directory (default: <output_dir>/logs/<timestamp>)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Status record database (default: <output_dir>/.batchline/status.db)
    #[arg(long)]
    pub status_db: Option<PathBuf>,

    /// qsub executable used in standard batch mode
    #[arg(long, default_value = "qsub")]
    pub qsub: String,

    /// Seconds to wait for each qsub call
    #[arg(long, default_value_t = 60)]
    pub qsub_timeout: u64,

    /// Managed queue database used in managed batch mode
    #[arg(long)]
    pub managed_db: Option<PathBuf>,
}

/// Validate a pipeline
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Positional arguments referenced by `positional:` file declarations
    #[arg(value_name = "ARGS")]
    pub args: Vec<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Manage a status record
#[derive(Debug, Args, Clone)]
pub struct StatusCommand {
    #[command(subcommand)]
    pub action: StatusAction,
}

#[derive(Debug, Subcommand, Clone)]
pub enum StatusAction {
    /// Create a fresh status record
    Init {
        #[arg(long)]
        db: PathBuf,
    },

    /// Show the status record
    Show {
        #[arg(long)]
        db: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Clear the started flag so the pipeline can be submitted again
    Reset {
        #[arg(long)]
        db: PathBuf,
    },
}
