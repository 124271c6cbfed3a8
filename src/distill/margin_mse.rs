//! Margin-MSE distillation loss

use crate::autograd::{gather, mse, sub, Tensor};
use crate::error::{dims, ensure_shape, Error, Result};

/// Margin-MSE distillation loss
///
/// Distills relative ranking structure rather than absolute scores: for every
/// row the positive (index 0) is compared against each negative.
///
/// # Formula
///
/// ```text
/// m_s[b, j] = s[b, 0] - s[b, j]      j = 1..M
/// m_t[b, j] = t[b, 0] - t[b, j]
/// L = mean((m_s - m_t)²)             over B·(M-1) margins
/// ```
///
/// # Example
///
/// ```
/// use esparcir::distill::MarginMseLoss;
/// use esparcir::Tensor;
///
/// let student = Tensor::from_shape_vec(&[1, 3], vec![3.0, 1.0, 0.0], true).unwrap();
/// let teacher = Tensor::from_shape_vec(&[1, 3], vec![5.0, 3.0, 2.0], false).unwrap();
///
/// // Identical margins: no distillation signal
/// let loss = MarginMseLoss.forward(&student, &teacher).unwrap();
/// assert_eq!(loss.item(), 0.0);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MarginMseLoss;

impl MarginMseLoss {
    /// Compute the loss for student and teacher scores `[B, M]`, `M >= 2`
    pub fn forward(&self, student_scores: &Tensor, teacher_scores: &Tensor) -> Result<Tensor> {
        let [batch, group] = dims::<2>("margin_mse", student_scores.shape())?;
        ensure_shape("margin_mse", student_scores.shape(), teacher_scores.shape())?;
        if group < 2 {
            return Err(Error::shape("margin_mse", &[batch, 2], &[batch, group]));
        }

        let student = margins(student_scores, batch, group);
        let teacher = margins(teacher_scores, batch, group);
        Ok(mse(&student, &teacher))
    }

    pub fn name(&self) -> &str {
        "MarginMSE"
    }
}

/// Positive-minus-negative margins `[B, M-1]`
fn margins(scores: &Tensor, batch: usize, group: usize) -> Tensor {
    let negatives = group - 1;
    let pos_index = (0..batch).flat_map(|b| std::iter::repeat_n(b * group, negatives)).collect();
    let neg_index = (0..batch).flat_map(|b| (1..group).map(move |j| b * group + j)).collect();
    let pos = gather(scores, pos_index, vec![batch, negatives]);
    let neg = gather(scores, neg_index, vec![batch, negatives]);
    sub(&pos, &neg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::backward;
    use approx::assert_abs_diff_eq;

    fn scores(batch: usize, group: usize, data: Vec<f32>, rg: bool) -> Tensor {
        Tensor::from_shape_vec(&[batch, group], data, rg).unwrap()
    }

    #[test]
    fn test_zero_when_margins_match() {
        let s = scores(2, 3, vec![1.0, 0.5, -1.0, 4.0, 4.0, 2.0], false);
        // Same margins, shifted by a per-row constant
        let t = scores(2, 3, vec![11.0, 10.5, 9.0, -1.0, -1.0, -3.0], false);
        assert_abs_diff_eq!(MarginMseLoss.forward(&s, &t).unwrap().item(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_hand_computed_value() {
        // student margins: [1, 2]; teacher margins: [0, 4] -> mean(1, 4) = 2.5
        let s = scores(1, 3, vec![3.0, 2.0, 1.0], false);
        let t = scores(1, 3, vec![4.0, 4.0, 0.0], false);
        assert_abs_diff_eq!(MarginMseLoss.forward(&s, &t).unwrap().item(), 2.5);
    }

    #[test]
    fn test_gradient_pushes_student_margins_toward_teacher() {
        let s = scores(1, 2, vec![1.0, 0.0], true);
        let t = scores(1, 2, vec![3.0, 0.0], false);
        let mut loss = MarginMseLoss.forward(&s, &t).unwrap();
        backward(&mut loss, None);
        let grad = s.grad().unwrap();
        // d/ds0 (s0 - s1 - 3)² = 2 * (1 - 3) = -4
        assert_abs_diff_eq!(grad[0], -4.0);
        assert_abs_diff_eq!(grad[1], 4.0);
    }

    #[test]
    fn test_rejects_single_candidate() {
        let s = scores(2, 1, vec![1.0, 2.0], false);
        assert!(MarginMseLoss.forward(&s, &s).is_err());
    }

    #[test]
    fn test_rejects_shape_mismatch() {
        let s = scores(1, 3, vec![0.0; 3], false);
        let t = scores(1, 2, vec![0.0; 2], false);
        assert!(matches!(
            MarginMseLoss.forward(&s, &t),
            Err(Error::ShapeMismatch { op: "margin_mse", .. })
        ));
    }
}
