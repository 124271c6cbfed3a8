//! In-batch contrastive ranking loss

use crate::autograd::cross_entropy_rows;
use crate::error::{dims, Error, Result};
use crate::Tensor;

/// Cross-entropy over candidate scores with the positive at index 0
///
/// L = -(1/B) Σ_b log softmax(scores[b])[0]
///
/// # Example
///
/// ```
/// use esparcir::train::ContrastiveLoss;
/// use esparcir::Tensor;
///
/// let scores = Tensor::from_shape_vec(&[1, 3], vec![5.0, 1.0, 0.0], true).unwrap();
/// let loss = ContrastiveLoss.forward(&scores).unwrap();
/// assert!(loss.item() > 0.0 && loss.item() < 0.1);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ContrastiveLoss;

impl ContrastiveLoss {
    /// Compute the loss for scores `[B, M]`, `M >= 2`
    pub fn forward(&self, scores: &Tensor) -> Result<Tensor> {
        let [batch, group] = dims::<2>("contrastive", scores.shape())?;
        if group < 2 {
            return Err(Error::shape("contrastive", &[batch, 2], &[batch, group]));
        }
        Ok(cross_entropy_rows(scores, &vec![0; batch], group))
    }

    pub fn name(&self) -> &str {
        "Contrastive"
    }
}
