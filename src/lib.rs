//! # Esparcir: SPLADE Sparse Retrieval Training
//!
//! Esparcir turns per-token masked-language-model logits into sparse,
//! vocabulary-sized relevance vectors and trains them with a composite
//! ranking objective.
//!
//! ## Architecture
//!
//! - `autograd`: Tape-based automatic differentiation over flat `f32` tensors
//! - `splade`: Activation, top-K sparsification, contextual pooling, scoring, model variants
//! - `train`: Contrastive, FLOPS and anti-collapse losses, metrics, the training step
//! - `distill`: Margin-MSE distillation against teacher scores
//! - `serve`: Sentence-encoder adapter producing sparse embeddings in inference mode
//! - `config`: Declarative YAML configuration and CLI arguments
//! - `trace`: Timing spans for each pipeline stage
//!
//! ## Example
//!
//! ```
//! use esparcir::autograd::Context;
//! use esparcir::splade::{AttentionMask, LookupBackbone, SpladeModel, TokenBatch};
//!
//! let model = SpladeModel::new(LookupBackbone::new(100, 8)?, Some(4))?;
//! let batch = TokenBatch::new(vec![5, 17, 42, 0], AttentionMask::from_lengths(&[3], 4)?)?;
//!
//! let out = model.forward(&batch, &Context::inference())?;
//! assert_eq!(out.activations.shape(), &[1, 100]);
//! assert!(out.activations.data().iter().all(|&v| v >= 0.0));
//! # Ok::<(), esparcir::Error>(())
//! ```

pub mod autograd;
pub mod cli;
pub mod config;
pub mod distill;
pub mod error;
pub mod serve;
pub mod splade;
pub mod trace;
pub mod train;

pub use autograd::Tensor;
pub use error::{Error, Result};
