//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{StatusCommand, SubmitCommand, ValidateCommand};
use std::ffi::OsString;

/// Submit declarative pipelines to a cluster batch scheduler
#[derive(Debug, Parser, Clone)]
#[command(name = "batchline")]
#[command(version)]
#[command(about = "Submit declarative pipelines as chains of dependent batch jobs", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Resolve a pipeline and submit its steps
    Submit(SubmitCommand),

    /// Load and resolve a pipeline without submitting it
    Validate(ValidateCommand),

    /// Inspect or change a pipeline status record
    Status(StatusCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
