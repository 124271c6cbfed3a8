//! Tensor type with gradient tracking

use super::BackwardOp;
use crate::error::{Error, Result};
use ndarray::Array1;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared gradient storage of a graph node
pub type GradCell = Rc<RefCell<Option<Array1<f32>>>>;

/// Tensor with flat row-major storage and optional gradient tracking
///
/// Clones share the gradient cell and backward op, so a clone is the same
/// graph node. Data is reference counted and copied on write.
#[derive(Clone)]
pub struct Tensor {
    data: Rc<Array1<f32>>,
    shape: Vec<usize>,
    grad: GradCell,
    backward_op: Option<Rc<dyn BackwardOp>>,
    requires_grad: bool,
}

impl Tensor {
    /// Create a 1-D tensor from an array
    pub fn new(data: Array1<f32>, requires_grad: bool) -> Self {
        let shape = vec![data.len()];
        Self::with_shape(data, shape, requires_grad)
    }

    /// Create a tensor with an explicit shape
    ///
    /// # Panics
    ///
    /// Panics if the shape does not cover exactly `data.len()` elements.
    /// Use [`Tensor::from_shape_vec`] for caller-supplied shapes.
    pub fn with_shape(data: Array1<f32>, shape: Vec<usize>, requires_grad: bool) -> Self {
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "shape {shape:?} does not match {} elements",
            data.len()
        );
        Self {
            data: Rc::new(data),
            shape,
            grad: Rc::new(RefCell::new(None)),
            backward_op: None,
            requires_grad,
        }
    }

    /// Create a 1-D tensor from a vector
    pub fn from_vec(data: Vec<f32>, requires_grad: bool) -> Self {
        Self::new(Array1::from(data), requires_grad)
    }

    /// Create a tensor from a vector and a shape, checking element counts
    pub fn from_shape_vec(shape: &[usize], data: Vec<f32>, requires_grad: bool) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(Error::shape("Tensor::from_shape_vec", &[expected], &[data.len()]));
        }
        Ok(Self::with_shape(Array1::from(data), shape.to_vec(), requires_grad))
    }

    /// Zero-filled 1-D tensor
    pub fn zeros(len: usize, requires_grad: bool) -> Self {
        Self::new(Array1::zeros(len), requires_grad)
    }

    /// One-filled 1-D tensor
    pub fn ones(len: usize, requires_grad: bool) -> Self {
        Self::new(Array1::ones(len), requires_grad)
    }

    /// Scalar constant (no gradient)
    pub fn scalar(value: f32) -> Self {
        Self::with_shape(Array1::from(vec![value]), vec![1], false)
    }

    /// Tensor data
    pub fn data(&self) -> &Array1<f32> {
        &self.data
    }

    /// Mutable tensor data (copies if the storage is shared)
    pub fn data_mut(&mut self) -> &mut Array1<f32> {
        Rc::make_mut(&mut self.data)
    }

    /// Tensor shape (row-major)
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the tensor has no elements
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// First element, for scalar results
    pub fn item(&self) -> f32 {
        self.data[0]
    }

    /// View the same graph node under another shape
    pub fn reshape(&self, shape: &[usize]) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != self.len() {
            return Err(Error::shape("Tensor::reshape", &[self.len()], &[expected]));
        }
        let mut view = self.clone();
        view.shape = shape.to_vec();
        Ok(view)
    }

    /// Copy of this tensor cut off from the graph
    pub fn detach(&self) -> Self {
        Self {
            data: Rc::clone(&self.data),
            shape: self.shape.clone(),
            grad: Rc::new(RefCell::new(None)),
            backward_op: None,
            requires_grad: false,
        }
    }

    /// Whether gradients are tracked
    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// Enable or disable gradient tracking
    pub fn set_requires_grad(&mut self, requires_grad: bool) {
        self.requires_grad = requires_grad;
    }

    /// Current gradient, if any
    pub fn grad(&self) -> Option<Array1<f32>> {
        self.grad.borrow().clone()
    }

    /// Shared gradient cell (used by backward ops)
    pub fn grad_cell(&self) -> GradCell {
        Rc::clone(&self.grad)
    }

    /// Overwrite the gradient
    pub fn set_grad(&self, grad: Array1<f32>) {
        *self.grad.borrow_mut() = Some(grad);
    }

    /// Add to the gradient
    pub fn accumulate_grad(&self, grad: Array1<f32>) {
        let mut cell = self.grad.borrow_mut();
        match cell.as_mut() {
            Some(existing) => *existing += &grad,
            None => *cell = Some(grad),
        }
    }

    /// Clear the gradient
    pub fn zero_grad(&self) {
        *self.grad.borrow_mut() = None;
    }

    /// Backward op that produced this tensor
    pub fn backward_op(&self) -> Option<Rc<dyn BackwardOp>> {
        self.backward_op.clone()
    }

    /// Attach the backward op that produced this tensor
    pub fn set_backward_op(&mut self, op: Rc<dyn BackwardOp>) {
        self.backward_op = Some(op);
    }

    /// Identity of the graph node (stable across clones)
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.grad) as *const () as usize
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("requires_grad", &self.requires_grad)
            .field("has_grad", &self.grad.borrow().is_some())
            .field("has_backward_op", &self.backward_op.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_shape_vec_checks_len() {
        assert!(Tensor::from_shape_vec(&[2, 3], vec![0.0; 6], false).is_ok());
        let err = Tensor::from_shape_vec(&[2, 3], vec![0.0; 5], false).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_reshape_shares_node() {
        let t = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], true);
        let r = t.reshape(&[2, 2]).expect("valid reshape");
        assert_eq!(r.shape(), &[2, 2]);
        assert_eq!(r.id(), t.id());
        r.accumulate_grad(Array1::ones(4));
        assert_eq!(t.grad().expect("shared grad")[0], 1.0);
        assert!(t.reshape(&[3]).is_err());
    }

    #[test]
    fn test_detach_drops_graph() {
        let t = Tensor::from_vec(vec![1.0], true);
        let d = t.detach();
        assert!(!d.requires_grad());
        assert_ne!(d.id(), t.id());
        assert_eq!(d.item(), 1.0);
    }

    #[test]
    fn test_data_mut_copy_on_write() {
        let a = Tensor::from_vec(vec![1.0, 2.0], false);
        let mut b = a.clone();
        b.data_mut()[0] = 9.0;
        assert_eq!(a.data()[0], 1.0);
        assert_eq!(b.data()[0], 9.0);
    }

    #[test]
    fn test_zero_grad() {
        let t = Tensor::zeros(3, true);
        t.set_grad(Array1::ones(3));
        t.zero_grad();
        assert!(t.grad().is_none());
    }
}
