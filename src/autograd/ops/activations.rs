//! Element-wise and row-wise nonlinearities: relu, log1p, reciprocal and row softmax

use crate::autograd::{BackwardOp, GradCell, Tensor};
use ndarray::{Array1, Axis};
use std::rc::Rc;

/// ReLU activation
pub fn relu(a: &Tensor) -> Tensor {
    let data = a.data().mapv(|x| x.max(0.0));
    let requires_grad = a.requires_grad();

    let mut result = Tensor::with_shape(data, a.shape().to_vec(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(ReluBackward {
            a: a.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct ReluBackward {
    a: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for ReluBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂L/∂a = ∂L/∂out * (a > 0)
                let grad_a = grad * &self.a.data().mapv(|x| if x > 0.0 { 1.0 } else { 0.0 });
                self.a.accumulate_grad(grad_a);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// log(1 + x), element-wise
///
/// Defined for x > -1; callers feed non-negative inputs.
pub fn log1p(a: &Tensor) -> Tensor {
    let data = a.data().mapv(f32::ln_1p);
    let requires_grad = a.requires_grad();

    let mut result = Tensor::with_shape(data, a.shape().to_vec(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(Log1pBackward {
            a: a.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct Log1pBackward {
    a: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for Log1pBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂log(1+x)/∂x = 1 / (1 + x)
                let grad_a = grad / &self.a.data().mapv(|x| 1.0 + x);
                self.a.accumulate_grad(grad_a);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// 1 / x, element-wise
pub fn reciprocal(a: &Tensor) -> Tensor {
    let data = a.data().mapv(f32::recip);
    let requires_grad = a.requires_grad();

    let mut result = Tensor::with_shape(data, a.shape().to_vec(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(ReciprocalBackward {
            a: a.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct ReciprocalBackward {
    a: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for ReciprocalBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂(1/x)/∂x = -1 / x²
                let grad_a = grad * &self.a.data().mapv(|x| -1.0 / (x * x));
                self.a.accumulate_grad(grad_a);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// Softmax over consecutive rows of `row_len` elements (last axis)
pub fn softmax_rows(a: &Tensor, row_len: usize) -> Tensor {
    assert!(
        row_len > 0 && a.len() % row_len == 0,
        "softmax_rows: {} elements not divisible by row length {row_len}",
        a.len()
    );
    let rows = a.len() / row_len;

    let mut data = a.data().clone();
    {
        let mut view = data.view_mut().into_shape_with_order((rows, row_len)).expect("contiguous rows");
        for mut row in view.rows_mut() {
            // Subtract max for numerical stability
            let max_val = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            row.mapv_inplace(|x| (x - max_val).exp());
            let sum_exp = row.sum();
            row.mapv_inplace(|x| x / sum_exp);
        }
    }

    let requires_grad = a.requires_grad();
    let mut result = Tensor::with_shape(data, a.shape().to_vec(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(SoftmaxBackward {
            a: a.clone(),
            output: result.data().clone(),
            rows,
            row_len,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct SoftmaxBackward {
    a: Tensor,
    output: Array1<f32>,
    rows: usize,
    row_len: usize,
    result_grad: GradCell,
}

impl BackwardOp for SoftmaxBackward {
    fn backward(&self) {
        if let Some(grad_output) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂L/∂x = y ⊙ (∂L/∂y - (y · ∂L/∂y)), per row
                let shape = (self.rows, self.row_len);
                let y = self.output.view().into_shape_with_order(shape).expect("contiguous rows");
                let g = grad_output.view().into_shape_with_order(shape).expect("contiguous rows");
                let dots = (&y * &g).sum_axis(Axis(1)).insert_axis(Axis(1));
                let grad_a = &y * &(&g - &dots);
                self.a.accumulate_grad(Array1::from_iter(grad_a.iter().copied()));
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}
