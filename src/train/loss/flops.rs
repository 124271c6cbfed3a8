//! FLOPS sparsity regularization

use super::RepresentationRegularizer;
use crate::autograd::{abs, add, mean, scale};
use crate::Tensor;

/// L1 penalty approximating the retrieval cost of sparse representations
///
/// L = λ_doc · mean_rows(‖doc‖₁) + λ_query · mean_rows(‖query‖₁)
///
/// Query and document sides have separate coefficients because their useful
/// sparsity levels differ.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlopsLoss {
    /// Document-side coefficient
    pub lambda_doc: f32,
    /// Query-side coefficient
    pub lambda_query: f32,
}

impl FlopsLoss {
    pub fn new(lambda_doc: f32, lambda_query: f32) -> Self {
        Self { lambda_doc, lambda_query }
    }
}

/// Mean L1 norm of the rows of a tensor whose last axis is the vocabulary
fn mean_row_l1(x: &Tensor) -> Tensor {
    let width = x.shape().last().copied().unwrap_or(0).max(1);
    scale(&mean(&abs(x)), width as f32)
}

impl RepresentationRegularizer for FlopsLoss {
    fn forward(&self, query: &Tensor, docs: &Tensor) -> Tensor {
        add(
            &scale(&mean_row_l1(docs), self.lambda_doc),
            &scale(&mean_row_l1(query), self.lambda_query),
        )
    }

    fn name(&self) -> &str {
        "FLOPS"
    }
}
