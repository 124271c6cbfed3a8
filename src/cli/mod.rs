//! CLI module for esparcir
//!
//! Command handlers and console logging for the `esparcir` binary.

mod commands;
mod logging;

pub use commands::run_command;
pub use logging::LogLevel;

// Re-export Cli from config for convenience
pub use crate::config::Cli;
