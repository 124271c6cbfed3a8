//! Matrix multiplication autograd operations
//!
//! CPU GEMM through ndarray; each kernel call records a `gemm` trace span.

use crate::autograd::{BackwardOp, GradCell, Tensor};
use crate::trace::{TraceStep, TRACER};
use ndarray::{Array1, ArrayView2};
use std::rc::Rc;

/// Transpose a row-major matrix (rows x cols) to (cols x rows)
/// Uses cache-efficient blocked transpose for large matrices
#[inline]
pub fn transpose(data: &[f32], rows: usize, cols: usize) -> Vec<f32> {
    let started = TRACER.start();
    let mut transposed = vec![0.0f32; rows * cols];

    const BLOCK_SIZE: usize = 32;
    if rows >= BLOCK_SIZE && cols >= BLOCK_SIZE {
        transpose_blocked(data, &mut transposed, rows, cols, BLOCK_SIZE);
    } else {
        transpose_simple(data, &mut transposed, rows, cols);
    }

    TRACER.finish(TraceStep::Transpose, started, || format!("{rows}x{cols}"));
    transposed
}

/// Blocked transpose for cache efficiency on large matrices.
#[inline]
fn transpose_blocked(src: &[f32], dst: &mut [f32], rows: usize, cols: usize, block: usize) {
    for r_block in (0..rows).step_by(block) {
        for c_block in (0..cols).step_by(block) {
            let r_end = (r_block + block).min(rows);
            let c_end = (c_block + block).min(cols);
            for r in r_block..r_end {
                for c in c_block..c_end {
                    dst[c * rows + r] = src[r * cols + c];
                }
            }
        }
    }
}

/// Simple transpose for small matrices.
#[inline]
fn transpose_simple(src: &[f32], dst: &mut [f32], rows: usize, cols: usize) {
    for r in 0..rows {
        for c in 0..cols {
            dst[c * rows + r] = src[r * cols + c];
        }
    }
}

/// Compute C = A @ B for row-major slices (A: m×k, B: k×n)
pub fn matmul_compute(a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Vec<f32> {
    let started = TRACER.start();
    let a_view = ArrayView2::from_shape((m, k), a).expect("matrix A size mismatch");
    let b_view = ArrayView2::from_shape((k, n), b).expect("matrix B size mismatch");
    let c = a_view.dot(&b_view);
    TRACER.finish(TraceStep::Matmul, started, || format!("{m}x{k}x{n}"));
    c.into_iter().collect()
}

/// Matrix multiplication
///
/// Computes C = A @ B where:
/// - A is m×k (flattened to length m*k)
/// - B is k×n (flattened to length k*n)
/// - C is m×n (flattened to length m*n)
pub fn matmul(a: &Tensor, b: &Tensor, m: usize, k: usize, n: usize) -> Tensor {
    batched_matmul(a, b, 1, m, k, n).reshape(&[m, n]).expect("matmul output covers m*n")
}

/// Batched matrix multiplication
///
/// A is `[batch, m, k]`, B is `[batch, k, n]`; returns `[batch, m, n]`.
pub fn batched_matmul(a: &Tensor, b: &Tensor, batch: usize, m: usize, k: usize, n: usize) -> Tensor {
    assert_eq!(a.len(), batch * m * k, "Matrix A size mismatch");
    assert_eq!(b.len(), batch * k * n, "Matrix B size mismatch");

    let a_slice = a.data().as_slice().expect("matrix A must be contiguous");
    let b_slice = b.data().as_slice().expect("matrix B must be contiguous");
    let mut result_data = Vec::with_capacity(batch * m * n);
    for i in 0..batch {
        result_data.extend(matmul_compute(
            &a_slice[i * m * k..(i + 1) * m * k],
            &b_slice[i * k * n..(i + 1) * k * n],
            m,
            k,
            n,
        ));
    }

    let requires_grad = a.requires_grad() || b.requires_grad();
    let mut result =
        Tensor::with_shape(Array1::from(result_data), vec![batch, m, n], requires_grad);

    if requires_grad {
        let backward_op = Rc::new(MatmulBackward {
            a: a.clone(),
            b: b.clone(),
            batch,
            m,
            k,
            n,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct MatmulBackward {
    a: Tensor,
    b: Tensor,
    batch: usize,
    m: usize,
    k: usize,
    n: usize,
    result_grad: GradCell,
}

impl BackwardOp for MatmulBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            let (m, k, n) = (self.m, self.k, self.n);
            let grad_slice = grad.as_slice().expect("gradient must be contiguous");
            let a_slice = self.a.data().as_slice().expect("matrix A must be contiguous");
            let b_slice = self.b.data().as_slice().expect("matrix B must be contiguous");

            let mut grad_a = Vec::with_capacity(self.batch * m * k);
            let mut grad_b = Vec::with_capacity(self.batch * k * n);
            for i in 0..self.batch {
                let g = &grad_slice[i * m * n..(i + 1) * m * n];
                if self.a.requires_grad() {
                    // ∂L/∂A = ∂L/∂C @ B^T
                    let b_t = transpose(&b_slice[i * k * n..(i + 1) * k * n], k, n);
                    grad_a.extend(matmul_compute(g, &b_t, m, n, k));
                }
                if self.b.requires_grad() {
                    // ∂L/∂B = A^T @ ∂L/∂C
                    let a_t = transpose(&a_slice[i * m * k..(i + 1) * m * k], m, k);
                    grad_b.extend(matmul_compute(&a_t, g, k, m, n));
                }
            }

            if self.a.requires_grad() {
                self.a.accumulate_grad(Array1::from(grad_a));
            }
            if self.b.requires_grad() {
                self.b.accumulate_grad(Array1::from(grad_b));
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone(), self.b.clone()]
    }
}
