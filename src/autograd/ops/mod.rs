//! Autograd operations with backward passes
//!
//! This module provides differentiable operations for automatic differentiation.

mod activations;
mod basic;
mod loss;
mod matmul;
mod reduce;

// Re-export all public operations
pub use activations::{log1p, reciprocal, relu, softmax_rows};
pub use basic::{abs, add, add_bias, add_scalar, mean, mul, mul_rows, scale, sub, sum};
pub use loss::{cross_entropy_rows, mse};
pub use matmul::{batched_matmul, matmul, matmul_compute, transpose};
pub use reduce::{batched_dot, gather, max_rows};
