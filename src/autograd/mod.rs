//! Tape-based autograd engine
//!
//! Provides automatic differentiation using a computational graph with gradient tape.
//! Tensors store flat row-major data with an explicit shape; every op records a
//! [`BackwardOp`] and [`backward`] replays the graph in reverse topological order.
//!
//! ```
//! use esparcir::autograd::{backward, mul, sum, Tensor};
//!
//! let x = Tensor::from_vec(vec![1.0, 2.0], true);
//! let mut y = sum(&mul(&x, &x));
//! backward(&mut y, None);
//! assert_eq!(x.grad().unwrap().to_vec(), vec![2.0, 4.0]);
//! ```

mod backward;
mod context;
mod ops;
mod tensor;

#[cfg(test)]
mod tests;

pub use backward::{backward, BackwardOp};
pub use context::{Context, Device};
pub use ops::*;
pub use tensor::{GradCell, Tensor};
