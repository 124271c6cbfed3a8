//! Reductions and index selection: max pooling over a middle axis, gather, batched dot

use crate::autograd::{BackwardOp, GradCell, Tensor};
use ndarray::Array1;
use std::rc::Rc;

/// Max over the middle axis of a `[outer, steps, width]` tensor
///
/// Returns `[outer, width]`. The gradient flows to the first position that
/// attains the maximum.
pub fn max_rows(a: &Tensor, outer: usize, steps: usize, width: usize) -> Tensor {
    assert_eq!(a.len(), outer * steps * width, "max_rows: size mismatch");
    assert!(steps > 0, "max_rows: empty reduction axis");

    let src = a.data().as_slice().expect("tensor data must be contiguous");
    let mut data = vec![f32::NEG_INFINITY; outer * width];
    let mut argmax = vec![0usize; outer * width];

    for o in 0..outer {
        let out_row = &mut data[o * width..(o + 1) * width];
        let arg_row = &mut argmax[o * width..(o + 1) * width];
        for t in 0..steps {
            let base = (o * steps + t) * width;
            let in_row = &src[base..base + width];
            for v in 0..width {
                // Strict comparison keeps the first arg-max.
                if in_row[v] > out_row[v] || t == 0 {
                    out_row[v] = in_row[v];
                    arg_row[v] = base + v;
                }
            }
        }
    }

    let requires_grad = a.requires_grad();
    let mut result = Tensor::with_shape(Array1::from(data), vec![outer, width], requires_grad);

    if requires_grad {
        let backward_op = Rc::new(ScatterBackward {
            a: a.clone(),
            index: argmax,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

/// Select elements by flat index: `out[i] = a[index[i]]`
///
/// Indices may repeat; the backward pass scatter-adds.
///
/// # Panics
///
/// Panics if `shape` does not cover `index.len()` or an index is out of range.
pub fn gather(a: &Tensor, index: Vec<usize>, shape: Vec<usize>) -> Tensor {
    assert_eq!(shape.iter().product::<usize>(), index.len(), "gather: shape/index mismatch");
    let src = a.data();
    let data: Array1<f32> = index
        .iter()
        .map(|&i| {
            assert!(i < src.len(), "gather: index {i} out of range {}", src.len());
            src[i]
        })
        .collect();

    let requires_grad = a.requires_grad();
    let mut result = Tensor::with_shape(data, shape, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(ScatterBackward {
            a: a.clone(),
            index,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

/// Backward of any op whose output element `i` is input element `index[i]`
struct ScatterBackward {
    a: Tensor,
    index: Vec<usize>,
    result_grad: GradCell,
}

impl BackwardOp for ScatterBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                let mut grad_a = Array1::zeros(self.a.len());
                for (&i, &g) in self.index.iter().zip(grad.iter()) {
                    grad_a[i] += g;
                }
                self.a.accumulate_grad(grad_a);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// Inner products of one row against a group of rows
///
/// `q` is `[batch, dim]`, `d` is `[batch, group, dim]`; returns `[batch, group]`
/// with `out[b, m] = Σ_v q[b, v] · d[b, m, v]`.
pub fn batched_dot(q: &Tensor, d: &Tensor, batch: usize, group: usize, dim: usize) -> Tensor {
    assert_eq!(q.len(), batch * dim, "batched_dot: query size mismatch");
    assert_eq!(d.len(), batch * group * dim, "batched_dot: candidate size mismatch");

    let qs = q.data().as_slice().expect("tensor data must be contiguous");
    let ds = d.data().as_slice().expect("tensor data must be contiguous");
    let mut data = Vec::with_capacity(batch * group);
    for b in 0..batch {
        let q_row = &qs[b * dim..(b + 1) * dim];
        for m in 0..group {
            let base = (b * group + m) * dim;
            let d_row = &ds[base..base + dim];
            data.push(q_row.iter().zip(d_row).map(|(x, y)| x * y).sum());
        }
    }

    let requires_grad = q.requires_grad() || d.requires_grad();
    let mut result = Tensor::with_shape(Array1::from(data), vec![batch, group], requires_grad);

    if requires_grad {
        let backward_op = Rc::new(BatchedDotBackward {
            q: q.clone(),
            d: d.clone(),
            batch,
            group,
            dim,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct BatchedDotBackward {
    q: Tensor,
    d: Tensor,
    batch: usize,
    group: usize,
    dim: usize,
    result_grad: GradCell,
}

impl BackwardOp for BatchedDotBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            let (batch, group, dim) = (self.batch, self.group, self.dim);
            let qs = self.q.data().as_slice().expect("tensor data must be contiguous");
            let ds = self.d.data().as_slice().expect("tensor data must be contiguous");

            if self.q.requires_grad() {
                // ∂L/∂q[b] = Σ_m g[b, m] · d[b, m]
                let mut grad_q = Array1::zeros(batch * dim);
                for b in 0..batch {
                    for m in 0..group {
                        let g = grad[b * group + m];
                        let base = (b * group + m) * dim;
                        for v in 0..dim {
                            grad_q[b * dim + v] += g * ds[base + v];
                        }
                    }
                }
                self.q.accumulate_grad(grad_q);
            }

            if self.d.requires_grad() {
                // ∂L/∂d[b, m] = g[b, m] · q[b]
                let mut grad_d = Array1::zeros(batch * group * dim);
                for b in 0..batch {
                    for m in 0..group {
                        let g = grad[b * group + m];
                        let base = (b * group + m) * dim;
                        for v in 0..dim {
                            grad_d[base + v] = g * qs[b * dim + v];
                        }
                    }
                }
                self.d.accumulate_grad(grad_d);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.q.clone(), self.d.clone()]
    }
}
