//! Loss functions for sparse retrieval training
//!
//! - [`ContrastiveLoss`] - In-batch ranking cross-entropy, positive at index 0
//! - [`FlopsLoss`] - L1 sparsity regularization with query/document weights
//! - [`AntiCollapseLoss`] - Penalty against all-zero representations
//! - [`SpladeLoss`] - The composite objective, including margin-MSE distillation

mod anti_collapse;
mod composite;
mod contrastive;
mod flops;
mod traits;

pub use anti_collapse::AntiCollapseLoss;
pub use composite::{LossCoefficients, LossOutput, SpladeLoss};
pub use contrastive::ContrastiveLoss;
pub use flops::FlopsLoss;
pub use traits::RepresentationRegularizer;
