//! Basic autograd operations: add, sub, mul, scale, sum, abs and broadcasts

use crate::autograd::{BackwardOp, GradCell, Tensor};
use ndarray::{Array1, Axis};
use std::rc::Rc;

/// Add two tensors
pub fn add(a: &Tensor, b: &Tensor) -> Tensor {
    assert_eq!(a.len(), b.len(), "add: length mismatch");
    let data = a.data() + b.data();
    let requires_grad = a.requires_grad() || b.requires_grad();

    let mut result = Tensor::with_shape(data, a.shape().to_vec(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(AddBackward {
            a: a.clone(),
            b: b.clone(),
            negate_b: false,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

/// Subtract two tensors (a - b)
pub fn sub(a: &Tensor, b: &Tensor) -> Tensor {
    assert_eq!(a.len(), b.len(), "sub: length mismatch");
    let data = a.data() - b.data();
    let requires_grad = a.requires_grad() || b.requires_grad();

    let mut result = Tensor::with_shape(data, a.shape().to_vec(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(AddBackward {
            a: a.clone(),
            b: b.clone(),
            negate_b: true,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct AddBackward {
    a: Tensor,
    b: Tensor,
    negate_b: bool,
    result_grad: GradCell,
}

impl BackwardOp for AddBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad.clone());
            }
            if self.b.requires_grad() {
                let grad_b = if self.negate_b { -grad } else { grad.clone() };
                self.b.accumulate_grad(grad_b);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone(), self.b.clone()]
    }
}

/// Multiply two tensors element-wise
pub fn mul(a: &Tensor, b: &Tensor) -> Tensor {
    assert_eq!(a.len(), b.len(), "mul: length mismatch");
    let data = a.data() * b.data();
    let requires_grad = a.requires_grad() || b.requires_grad();

    let mut result = Tensor::with_shape(data, a.shape().to_vec(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(MulBackward {
            a: a.clone(),
            b: b.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct MulBackward {
    a: Tensor,
    b: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for MulBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂L/∂a = ∂L/∂out * b
                self.a.accumulate_grad(grad * self.b.data());
            }
            if self.b.requires_grad() {
                // ∂L/∂b = ∂L/∂out * a
                self.b.accumulate_grad(grad * self.a.data());
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone(), self.b.clone()]
    }
}

/// Scale tensor by a scalar
pub fn scale(a: &Tensor, factor: f32) -> Tensor {
    let data = a.data() * factor;
    let requires_grad = a.requires_grad();

    let mut result = Tensor::with_shape(data, a.shape().to_vec(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(ScaleBackward {
            a: a.clone(),
            factor,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct ScaleBackward {
    a: Tensor,
    factor: f32,
    result_grad: GradCell,
}

impl BackwardOp for ScaleBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad * self.factor);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// Add a constant to every element
pub fn add_scalar(a: &Tensor, value: f32) -> Tensor {
    let data = a.data() + value;
    let requires_grad = a.requires_grad();

    let mut result = Tensor::with_shape(data, a.shape().to_vec(), requires_grad);

    if requires_grad {
        // Gradient passes through unchanged: reuse scale by 1.
        let backward_op = Rc::new(ScaleBackward {
            a: a.clone(),
            factor: 1.0,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

/// Sum all elements
pub fn sum(a: &Tensor) -> Tensor {
    let data = Array1::from(vec![a.data().sum()]);
    let requires_grad = a.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(SumBackward {
            a: a.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct SumBackward {
    a: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for SumBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂L/∂a = ∂L/∂sum * 1 (broadcast)
                self.a.accumulate_grad(Array1::from_elem(self.a.len(), grad[0]));
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// Mean of all elements (0 for an empty tensor)
pub fn mean(a: &Tensor) -> Tensor {
    let n = a.len().max(1) as f32;
    scale(&sum(a), 1.0 / n)
}

/// Element-wise absolute value
///
/// The subgradient at 0 is 0.
pub fn abs(a: &Tensor) -> Tensor {
    let data = a.data().mapv(f32::abs);
    let requires_grad = a.requires_grad();

    let mut result = Tensor::with_shape(data, a.shape().to_vec(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(AbsBackward {
            a: a.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct AbsBackward {
    a: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for AbsBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                let sign = self.a.data().mapv(|x| {
                    if x > 0.0 {
                        1.0
                    } else if x < 0.0 {
                        -1.0
                    } else {
                        0.0
                    }
                });
                self.a.accumulate_grad(grad * &sign);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// Add a bias vector to every row of a `[rows, n]` tensor
pub fn add_bias(a: &Tensor, bias: &Tensor) -> Tensor {
    let n = bias.len();
    assert!(n > 0 && a.len() % n == 0, "add_bias: {} elements not divisible by {n}", a.len());
    let rows = a.len() / n;

    let mut data = a.data().clone();
    for mut row in data.view_mut().into_shape_with_order((rows, n)).expect("contiguous rows").rows_mut() {
        row += bias.data();
    }

    let requires_grad = a.requires_grad() || bias.requires_grad();
    let mut result = Tensor::with_shape(data, a.shape().to_vec(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(AddBiasBackward {
            a: a.clone(),
            bias: bias.clone(),
            rows,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct AddBiasBackward {
    a: Tensor,
    bias: Tensor,
    rows: usize,
    result_grad: GradCell,
}

impl BackwardOp for AddBiasBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad.clone());
            }
            if self.bias.requires_grad() {
                let n = self.bias.len();
                let grad_2d = grad.view().into_shape_with_order((self.rows, n)).expect("contiguous rows");
                self.bias.accumulate_grad(grad_2d.sum_axis(Axis(0)));
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone(), self.bias.clone()]
    }
}

/// Multiply each row of a `[rows, width]` tensor by a constant
///
/// Used to apply attention masks: padded rows get factor 0.
pub fn mul_rows(a: &Tensor, row_factors: &[f32]) -> Tensor {
    let rows = row_factors.len();
    assert!(rows > 0 && a.len() % rows == 0, "mul_rows: {} elements not divisible by {rows}", a.len());
    let width = a.len() / rows;

    let factors = expand_rows(row_factors, width);
    let data = a.data() * &factors;
    let requires_grad = a.requires_grad();

    let mut result = Tensor::with_shape(data, a.shape().to_vec(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(MulRowsBackward {
            a: a.clone(),
            factors,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

fn expand_rows(row_factors: &[f32], width: usize) -> Array1<f32> {
    row_factors.iter().flat_map(|&f| std::iter::repeat_n(f, width)).collect()
}

struct MulRowsBackward {
    a: Tensor,
    factors: Array1<f32>,
    result_grad: GradCell,
}

impl BackwardOp for MulRowsBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad * &self.factors);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}
