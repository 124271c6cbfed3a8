//! Core CLI types - Cli, Command, and argument structs

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::types::OutputFormat;

/// Esparcir: SPLADE sparse retrieval training
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "esparcir")]
#[command(author = "PAIML")]
#[command(version)]
#[command(
    about = "SPLADE sparse retrieval training with top-K sparsification, contextual pooling and margin distillation"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Validate a configuration file
    Validate(ValidateArgs),

    /// Display information about a configuration
    Info(InfoArgs),

    /// Run one training step on a seeded synthetic batch
    Step(StepArgs),
}

/// Arguments for the validate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Show detailed validation report
    #[arg(short, long)]
    pub detailed: bool,
}

/// Arguments for the info command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct InfoArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Output format (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the step command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct StepArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Output format for the metrics record (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Record timing spans and print the trace report
    #[arg(long)]
    pub trace: bool,

    /// Override the data seed
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Parse CLI arguments from a string slice (for testing)
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}

/// Apply command-line overrides to a SpladeSpec
pub fn apply_overrides(spec: &mut crate::config::SpladeSpec, args: &StepArgs) {
    if let Some(seed) = args.seed {
        spec.data.seed = seed;
    }
}
