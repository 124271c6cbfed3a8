//! Contextual embeddings for selected vocabulary terms
//!
//! Each selected term attends over the sequence with its own logit column as
//! attention scores; the pooled hidden state is projected to `embedding_dim`.

use crate::autograd::{add_bias, batched_matmul, gather, matmul, relu, softmax_rows, Tensor};
use crate::error::{dims, ensure_shape, Error, Result};
use crate::trace::{TraceStep, TRACER};
use ndarray::Array2;

/// Attention pooling plus a learned `hidden_size -> embedding_dim` projection
pub struct ContextualAggregator {
    /// Projection weight (hidden_size x embedding_dim)
    pub weight: Tensor,
    /// Projection bias (embedding_dim)
    pub bias: Tensor,
    hidden_size: usize,
    embedding_dim: usize,
}

impl ContextualAggregator {
    /// Create an aggregator with deterministic initial weights
    pub fn new(hidden_size: usize, embedding_dim: usize) -> Result<Self> {
        if hidden_size == 0 || embedding_dim == 0 {
            return Err(Error::InvalidConfiguration(format!(
                "hidden_size ({hidden_size}) and embedding_dim ({embedding_dim}) must be > 0"
            )));
        }
        let scale = (1.0 / hidden_size as f32).sqrt();
        let weight = Tensor::with_shape(
            (0..hidden_size * embedding_dim)
                .map(|i| (i as f32 * 0.173).sin() * scale)
                .collect(),
            vec![hidden_size, embedding_dim],
            true,
        );
        let bias = Tensor::with_shape(
            ndarray::Array1::zeros(embedding_dim),
            vec![embedding_dim],
            true,
        );
        Ok(Self { weight, bias, hidden_size, embedding_dim })
    }

    /// Create from existing projection parameters
    pub fn from_params(weight: Tensor, bias: Tensor) -> Result<Self> {
        let [hidden_size, embedding_dim] = dims::<2>("ContextualAggregator", weight.shape())?;
        ensure_shape("ContextualAggregator", &[embedding_dim], bias.shape())?;
        Ok(Self { weight, bias, hidden_size, embedding_dim })
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    /// Trainable parameters
    pub fn parameters(&self) -> Vec<Tensor> {
        vec![self.weight.clone(), self.bias.clone()]
    }

    /// Dense embedding per selected term
    ///
    /// * `indices` - selected vocabulary indices `[B, K]`
    /// * `logits` - MLM logits `[B, T, V]`
    /// * `hidden_states` - last-layer hidden states `[B, T, H]`
    ///
    /// Returns `[B, K, embedding_dim]`. The softmax runs over all T positions,
    /// padded ones included.
    pub fn aggregate_context(
        &self,
        indices: &Array2<usize>,
        logits: &Tensor,
        hidden_states: &Tensor,
    ) -> Result<Tensor> {
        let [batch, seq_len, vocab] = dims::<3>("aggregate_context", logits.shape())?;
        let (index_rows, k) = indices.dim();
        ensure_shape("aggregate_context", &[batch], &[index_rows])?;
        ensure_shape(
            "aggregate_context",
            &[batch, seq_len, self.hidden_size],
            hidden_states.shape(),
        )?;
        if let Some(&bad) = indices.iter().find(|&&v| v >= vocab) {
            return Err(Error::shape("aggregate_context", &[vocab], &[bad]));
        }
        if k == 0 {
            return Tensor::from_shape_vec(&[batch, 0, self.embedding_dim], Vec::new(), false);
        }

        let started = TRACER.start();
        // selected[b, j, t] = logits[b, t, indices[b, j]]
        let flat = (0..batch)
            .flat_map(|b| {
                (0..k).flat_map(move |j| (0..seq_len).map(move |t| (b, j, t)))
            })
            .map(|(b, j, t)| (b * seq_len + t) * vocab + indices[[b, j]])
            .collect();
        let selected = gather(logits, flat, vec![batch, k, seq_len]);
        let weights = softmax_rows(&selected, seq_len);
        let pooled = batched_matmul(&weights, hidden_states, batch, k, seq_len, self.hidden_size);

        let projected = matmul(&pooled, &self.weight, batch * k, self.hidden_size, self.embedding_dim);
        let embeddings = relu(&add_bias(&projected, &self.bias))
            .reshape(&[batch, k, self.embedding_dim])?;
        TRACER.finish(TraceStep::ContextPool, started, || format!("{batch}x{k}x{seq_len}"));

        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::{backward, sum};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn identity_aggregator(dim: usize) -> ContextualAggregator {
        let mut eye = vec![0.0; dim * dim];
        for i in 0..dim {
            eye[i * dim + i] = 1.0;
        }
        ContextualAggregator::from_params(
            Tensor::from_shape_vec(&[dim, dim], eye, false).unwrap(),
            Tensor::from_shape_vec(&[dim], vec![0.0; dim], false).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_zero_dims() {
        assert!(ContextualAggregator::new(0, 8).is_err());
        assert!(ContextualAggregator::new(8, 0).is_err());
        let agg = ContextualAggregator::new(4, 8).unwrap();
        assert_eq!(agg.weight.shape(), &[4, 8]);
        assert_eq!(agg.parameters().len(), 2);
    }

    #[test]
    fn test_pools_hidden_states_by_term_logits() {
        // B=1, T=2, V=2, H=2
        // Term 0 has equal logits at both positions; term 1 strongly prefers t=1.
        let logits = Tensor::from_shape_vec(&[1, 2, 2], vec![0.0, -20.0, 0.0, 20.0], false).unwrap();
        let hidden = Tensor::from_shape_vec(&[1, 2, 2], vec![1.0, 0.0, 0.0, 3.0], false).unwrap();
        let agg = identity_aggregator(2);

        let out = agg.aggregate_context(&array![[0, 1]], &logits, &hidden).unwrap();
        assert_eq!(out.shape(), &[1, 2, 2]);
        // Uniform weights: mean of the two hidden states
        assert_abs_diff_eq!(out.data()[0], 0.5, epsilon = 1e-5);
        assert_abs_diff_eq!(out.data()[1], 1.5, epsilon = 1e-5);
        // Peaked weights: the hidden state at t=1
        assert_abs_diff_eq!(out.data()[2], 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(out.data()[3], 3.0, epsilon = 1e-5);
    }

    #[test]
    fn test_projection_output_is_non_negative() {
        let logits = Tensor::from_shape_vec(&[2, 3, 5], (0..30).map(|i| (i as f32).cos()).collect(), false)
            .unwrap();
        let hidden = Tensor::from_shape_vec(&[2, 3, 4], (0..24).map(|i| (i as f32).sin()).collect(), false)
            .unwrap();
        let agg = ContextualAggregator::new(4, 6).unwrap();
        let out = agg.aggregate_context(&array![[4, 1], [0, 2]], &logits, &hidden).unwrap();
        assert_eq!(out.shape(), &[2, 2, 6]);
        assert!(out.data().iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_rejects_out_of_range_index() {
        let logits = Tensor::from_shape_vec(&[1, 2, 3], vec![0.0; 6], false).unwrap();
        let hidden = Tensor::from_shape_vec(&[1, 2, 2], vec![0.0; 4], false).unwrap();
        let agg = identity_aggregator(2);
        assert!(agg.aggregate_context(&array![[3]], &logits, &hidden).is_err());
    }

    #[test]
    fn test_rejects_hidden_size_mismatch() {
        let logits = Tensor::from_shape_vec(&[1, 2, 3], vec![0.0; 6], false).unwrap();
        let hidden = Tensor::from_shape_vec(&[1, 2, 3], vec![0.0; 6], false).unwrap();
        let agg = identity_aggregator(2);
        let err = agg.aggregate_context(&array![[0]], &logits, &hidden).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_gradients_reach_projection_and_hidden_states() {
        let logits =
            Tensor::from_shape_vec(&[1, 2, 3], vec![0.5, 0.1, -0.3, 0.2, 0.9, 0.4], true).unwrap();
        let hidden = Tensor::from_shape_vec(&[1, 2, 2], vec![0.3, 0.7, 0.2, 0.5], true).unwrap();
        let agg = ContextualAggregator::new(2, 3).unwrap();

        let out = agg.aggregate_context(&array![[1, 2]], &logits, &hidden).unwrap();
        let mut total = sum(&out);
        backward(&mut total, None);

        assert!(agg.weight.grad().is_some());
        assert!(agg.bias.grad().is_some());
        assert!(hidden.grad().is_some());
        // Unselected vocabulary column receives no gradient
        let logit_grad = logits.grad().unwrap();
        assert_eq!(logit_grad[0], 0.0);
        assert_eq!(logit_grad[3], 0.0);
    }
}
