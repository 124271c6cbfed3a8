//! Loss primitives with fused backward passes: row-wise cross-entropy and MSE

use crate::autograd::{BackwardOp, GradCell, Tensor};
use ndarray::Array1;
use std::rc::Rc;

/// Mean cross-entropy of `[rows, classes]` logits against one target class per row
///
/// L = -(1/rows) Σ_r log softmax(logits[r])[target[r]]
pub fn cross_entropy_rows(logits: &Tensor, targets: &[usize], classes: usize) -> Tensor {
    let rows = targets.len();
    assert_eq!(logits.len(), rows * classes, "cross_entropy_rows: size mismatch");
    assert!(rows > 0, "cross_entropy_rows: empty batch");

    let src = logits.data().as_slice().expect("tensor data must be contiguous");
    let mut probs = Vec::with_capacity(rows * classes);
    let mut loss = 0.0f32;

    for (r, &target) in targets.iter().enumerate() {
        assert!(target < classes, "cross_entropy_rows: target {target} >= {classes}");
        let row = &src[r * classes..(r + 1) * classes];
        let max_val = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let sum_exp: f32 = row.iter().map(|&x| (x - max_val).exp()).sum();
        let log_sum_exp = max_val + sum_exp.ln();
        // log-sum-exp form avoids log(0) for confident rows
        loss += log_sum_exp - row[target];
        probs.extend(row.iter().map(|&x| (x - log_sum_exp).exp()));
    }
    loss /= rows as f32;

    let requires_grad = logits.requires_grad();
    let mut result = Tensor::new(Array1::from(vec![loss]), requires_grad);

    if requires_grad {
        // ∂L/∂logits = (softmax - onehot) / rows
        let mut grad = Array1::from(probs);
        for (r, &target) in targets.iter().enumerate() {
            grad[r * classes + target] -= 1.0;
        }
        grad /= rows as f32;

        let backward_op = Rc::new(FixedGradBackward {
            input: logits.clone(),
            local_grad: grad,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

/// Mean squared error between two tensors of equal length
///
/// L = mean((pred - target)²); gradients flow to both sides if tracked.
pub fn mse(pred: &Tensor, target: &Tensor) -> Tensor {
    assert_eq!(pred.len(), target.len(), "Predictions and targets must have same length");

    let diff = pred.data() - target.data();
    let n = pred.len().max(1) as f32;
    let value = if pred.is_empty() { 0.0 } else { (&diff * &diff).sum() / n };

    let requires_grad = pred.requires_grad() || target.requires_grad();
    let mut result = Tensor::new(Array1::from(vec![value]), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(MseBackward {
            pred: pred.clone(),
            target: target.clone(),
            // d(MSE)/d(pred) = 2 * (pred - target) / n
            local_grad: diff * (2.0 / n),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

/// Scalar-output op whose input gradient is a precomputed local gradient
struct FixedGradBackward {
    input: Tensor,
    local_grad: Array1<f32>,
    result_grad: GradCell,
}

impl BackwardOp for FixedGradBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.input.requires_grad() {
                self.input.accumulate_grad(&self.local_grad * grad[0]);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.input.clone()]
    }
}

struct MseBackward {
    pred: Tensor,
    target: Tensor,
    local_grad: Array1<f32>,
    result_grad: GradCell,
}

impl BackwardOp for MseBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.pred.requires_grad() {
                self.pred.accumulate_grad(&self.local_grad * grad[0]);
            }
            if self.target.requires_grad() {
                self.target.accumulate_grad(&self.local_grad * -grad[0]);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.pred.clone(), self.target.clone()]
    }
}
