//! Query/document scoring

use crate::autograd::{batched_dot, scale, Tensor};
use crate::error::{dims, ensure_shape, Error, Result};
use crate::trace::{TraceStep, TRACER};

/// Temperature-scaled inner products of a query against its candidates
///
/// `query` is `[B, V]`, `docs` is `[B, M, V]` with the positive at index 0.
/// Returns `scores[b, m] = <query[b], docs[b, m]> / temperature`.
pub fn score(query: &Tensor, docs: &Tensor, temperature: f32) -> Result<Tensor> {
    if !(temperature.is_finite() && temperature > 0.0) {
        return Err(Error::InvalidConfiguration(format!(
            "temperature must be positive, got {temperature}"
        )));
    }
    let [batch, vocab] = dims::<2>("score", query.shape())?;
    let [doc_batch, group, doc_vocab] = dims::<3>("score", docs.shape())?;
    ensure_shape("score", &[batch, group, vocab], &[doc_batch, group, doc_vocab])?;

    let started = TRACER.start();
    let scores = scale(&batched_dot(query, docs, batch, group, vocab), 1.0 / temperature);
    TRACER.finish(TraceStep::Score, started, || format!("{batch}x{group}x{vocab}"));

    Ok(scores)
}
