//! Sparse retrieval training
//!
//! This module provides:
//! - Loss terms (contrastive, FLOPS, anti-collapse) and the composite [`SpladeLoss`]
//! - The per-step metrics record [`StepMetrics`]
//! - [`train_step`]: joint query/document forward pass, loss and backward
//!
//! # Example
//!
//! ```
//! use esparcir::autograd::Context;
//! use esparcir::splade::{AttentionMask, LookupBackbone, SpladeModel, TokenBatch};
//! use esparcir::train::{train_step, LossCoefficients, SpladeLoss, TrainBatch};
//!
//! let model = SpladeModel::new(LookupBackbone::new(64, 8)?, Some(16))?;
//! let loss = SpladeLoss::new(LossCoefficients::default())?;
//!
//! let queries = TokenBatch::new(vec![1, 2, 3, 0], AttentionMask::from_lengths(&[3], 4)?)?;
//! let docs = TokenBatch::new(
//!     vec![4, 5, 6, 7, 8, 9, 0, 0],
//!     AttentionMask::from_lengths(&[4, 2], 4)?,
//! )?;
//! let batch = TrainBatch::new(queries, docs, 2)?;
//!
//! let metrics = train_step(&model, &batch, &loss, None, &Context::new())?;
//! assert!(metrics.loss.is_finite());
//! # Ok::<(), esparcir::Error>(())
//! ```

mod loss;
mod metrics;
mod step;

pub use loss::{
    AntiCollapseLoss, ContrastiveLoss, FlopsLoss, LossCoefficients, LossOutput,
    RepresentationRegularizer, SpladeLoss,
};
pub use metrics::{SparsityStats, StepMetrics};
pub use step::{train_step, TrainBatch};
