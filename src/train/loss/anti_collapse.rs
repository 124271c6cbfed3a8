//! Anti-collapse penalty

use super::RepresentationRegularizer;
use crate::autograd::{abs, add, add_scalar, log1p, reciprocal, scale, sum};
use crate::Tensor;

/// Penalty that diverges as total representation mass approaches zero
///
/// L = w · (log1p(1 / (Σ|query| + ε)) + log1p(1 / (Σ|docs| + ε)))
///
/// Counteracts the sparsity regularizer driving every representation to the
/// zero vector. ε keeps the term finite for all-zero input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AntiCollapseLoss {
    /// Overall weight w
    pub weight: f32,
    /// Denominator guard ε
    pub epsilon: f32,
}

impl AntiCollapseLoss {
    pub fn new(weight: f32, epsilon: f32) -> Self {
        Self { weight, epsilon }
    }

    fn side(&self, x: &Tensor) -> Tensor {
        log1p(&reciprocal(&add_scalar(&sum(&abs(x)), self.epsilon)))
    }
}

impl Default for AntiCollapseLoss {
    fn default() -> Self {
        Self { weight: 0.1, epsilon: 1e-4 }
    }
}

impl RepresentationRegularizer for AntiCollapseLoss {
    fn forward(&self, query: &Tensor, docs: &Tensor) -> Tensor {
        scale(&add(&self.side(query), &self.side(docs)), self.weight)
    }

    fn name(&self) -> &str {
        "AntiCollapse"
    }
}
