//! Loss function traits

use crate::Tensor;

/// Penalty on query and document representations
///
/// `query` is `[B, V]`, `docs` is `[B, M, V]`. Implementations return a
/// scalar tensor wired into the autograd graph.
pub trait RepresentationRegularizer {
    /// Compute the penalty
    fn forward(&self, query: &Tensor, docs: &Tensor) -> Tensor;

    /// Name of the regularizer
    fn name(&self) -> &str;
}
