//! Esparcir CLI
//!
//! Entry point for validating SPLADE configurations and running training steps.
//!
//! # Usage
//!
//! ```bash
//! # Validate config
//! esparcir validate splade.yaml --detailed
//!
//! # Show config info
//! esparcir info splade.yaml --format yaml
//!
//! # One seeded training step with a timing report
//! esparcir step splade.yaml --trace
//! ```

use clap::Parser;
use esparcir::cli::{run_command, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
