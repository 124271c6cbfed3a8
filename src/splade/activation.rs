//! Sparse activation: per-token MLM logits to one vocabulary vector per sequence

use super::AttentionMask;
use crate::autograd::{log1p, max_rows, mul_rows, relu, Tensor};
use crate::error::{dims, ensure_shape, Result};
use crate::trace::{Survivors, TraceStep, TRACER};

/// Convert logits `[B, T, V]` into sparse activations `[B, V]`
///
/// `a[b, v] = max_t mask[b, t] * log(1 + relu(logits[b, t, v]))`
///
/// Every output coordinate is non-negative. Padded positions contribute 0,
/// so a fully padded sequence maps to the zero vector.
pub fn compute_activation(logits: &Tensor, mask: &AttentionMask) -> Result<Tensor> {
    let [batch, seq_len, vocab] = dims::<3>("compute_activation", logits.shape())?;
    ensure_shape(
        "compute_activation",
        &[mask.batch_size(), mask.seq_len()],
        &[batch, seq_len],
    )?;

    let started = TRACER.start();
    let compressed = log1p(&relu(logits));
    let masked = mul_rows(&compressed, &mask.factors());
    let pooled = max_rows(&masked, batch, seq_len, vocab);
    TRACER.finish_sparse(
        TraceStep::Activation,
        started,
        || format!("{batch}x{seq_len}x{vocab}"),
        || Survivors::count(batch, pooled.data().as_slice().expect("tensor data must be contiguous")),
    );

    Ok(pooled)
}
