//! Backward pass scheduling
//!
//! Each [`BackwardOp`] only moves its own gradient to its inputs. The engine
//! visits nodes in reverse topological order, so a node consumed by several
//! ops (e.g. a representation shared by the ranking loss and a regularizer)
//! runs once with the sum of all incoming gradients.

use super::Tensor;
use crate::trace::{TraceStep, TRACER};
use ndarray::Array1;
use std::collections::HashSet;

/// Gradient propagation for one graph node
pub trait BackwardOp {
    /// Propagate the node's accumulated gradient to its inputs
    fn backward(&self);

    /// Input tensors of the op (graph edges)
    fn inputs(&self) -> Vec<Tensor>;
}

/// Perform backward pass on a tensor
///
/// Seeds the gradient with `grad_output`, or ones when `None` (scalar loss).
pub fn backward(tensor: &mut Tensor, grad_output: Option<Array1<f32>>) {
    let started = TRACER.start();
    let seed = grad_output.unwrap_or_else(|| Array1::ones(tensor.len()));
    tensor.set_grad(seed);

    let order = topological_order(tensor);
    for node in order.iter().rev() {
        if let Some(op) = node.backward_op() {
            op.backward();
        }
    }
    TRACER.finish(TraceStep::Backward, started, || format!("{} nodes", order.len()));
}

/// Post-order (inputs before consumers) list of nodes reachable from `root`
fn topological_order(root: &Tensor) -> Vec<Tensor> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    // Iterative DFS; the bool marks "inputs already pushed".
    let mut stack = vec![(root.clone(), false)];

    while let Some((node, expanded)) = stack.pop() {
        if expanded {
            order.push(node);
            continue;
        }
        if !visited.insert(node.id()) {
            continue;
        }
        let inputs = node.backward_op().map(|op| op.inputs()).unwrap_or_default();
        stack.push((node, true));
        for input in inputs {
            if input.requires_grad() && !visited.contains(&input.id()) {
                stack.push((input, false));
            }
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::{add, mul, sum};

    #[test]
    fn test_shared_node_gradient_counted_once_per_use() {
        // y = sum(x * x + x) => dy/dx = 2x + 1
        let x = Tensor::from_vec(vec![1.0, 2.0, 3.0], true);
        let sq = mul(&x, &x);
        let mut y = sum(&add(&sq, &x));
        backward(&mut y, None);

        let grad = x.grad().expect("gradient should be available");
        assert_eq!(grad.to_vec(), vec![3.0, 5.0, 7.0]);
    }

    #[test]
    fn test_diamond_graph() {
        // a -> (b = 2a, c = 3a) -> d = b + c => dd/da = 5
        let a = Tensor::from_vec(vec![1.0], true);
        let b = crate::autograd::scale(&a, 2.0);
        let c = crate::autograd::scale(&a, 3.0);
        let mut d = add(&b, &c);
        backward(&mut d, None);
        assert_eq!(a.grad().expect("gradient should be available")[0], 5.0);
    }
}
