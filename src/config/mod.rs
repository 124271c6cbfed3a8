//! Declarative YAML configuration
//!
//! This module provides:
//! - [`SpladeSpec`] schema: model variant and sizes, loss weights, synthetic data
//! - [`load_config`] / [`parse_config`]: serde_yaml parsing followed by validation
//! - [`validate_config`] with a dedicated [`ValidationError`]
//! - The clap-derived [`Cli`] used by the `esparcir` binary
//!
//! # Example
//!
//! ```yaml
//! model:
//!   variant: sparse_embed
//!   vocab_size: 30522
//!   hidden_size: 64
//!   top_k: 64
//!   embedding_dim: 128
//!
//! loss:
//!   lambda_doc: 0.001
//!   lambda_query: 0.001
//!   temperature: 1.0
//!   mse_weight: 1.0
//!
//! data:
//!   batch_size: 8
//!   num_negatives: 2
//!   seq_len: 32
//!   seed: 42
//! ```

mod cli;
mod loader;
mod schema;
mod validate;

pub use cli::{
    apply_overrides, parse_args, Cli, Command, InfoArgs, OutputFormat, StepArgs, ValidateArgs,
};
pub use loader::{load_config, parse_config};
pub use schema::{DataSpec, LossSpec, ModelSpec, ModelVariant, SpladeSpec};
pub use validate::{validate_config, ValidationError};
