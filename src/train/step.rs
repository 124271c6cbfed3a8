//! Training step: one joint forward pass, composite loss, backward

use super::{SpladeLoss, StepMetrics};
use crate::autograd::{backward, gather, Context, Tensor};
use crate::error::{ensure_shape, Error, Result};
use crate::splade::{score, MaskedLmBackbone, SpladeModel, TokenBatch};

/// Queries with one positive and `M - 1` negative documents each
#[derive(Debug, Clone)]
pub struct TrainBatch {
    /// Queries `[B, T]`
    pub queries: TokenBatch,
    /// Documents flattened query-major `[B * M, T]`, positive first per query
    pub docs: TokenBatch,
    docs_per_query: usize,
}

impl TrainBatch {
    /// Pair queries with their documents
    ///
    /// `docs` must hold `docs_per_query` rows per query and share the query
    /// sequence length.
    pub fn new(queries: TokenBatch, docs: TokenBatch, docs_per_query: usize) -> Result<Self> {
        if docs_per_query < 2 {
            return Err(Error::InvalidConfiguration(format!(
                "need a positive and at least one negative per query, got {docs_per_query} documents"
            )));
        }
        ensure_shape(
            "TrainBatch::new",
            &[queries.batch_size() * docs_per_query, queries.seq_len()],
            &[docs.batch_size(), docs.seq_len()],
        )?;
        Ok(Self { queries, docs, docs_per_query })
    }

    pub fn batch_size(&self) -> usize {
        self.queries.batch_size()
    }

    /// M: one positive plus the negatives
    pub fn docs_per_query(&self) -> usize {
        self.docs_per_query
    }
}

/// Run one training step and return its metrics
///
/// Queries and documents go through the model in a single forward pass, the
/// representations are split back, scored and fed to the composite loss.
/// Gradients accumulate on the model parameters; optimizer stepping and
/// zeroing gradients are left to the caller.
pub fn train_step<B: MaskedLmBackbone>(
    model: &SpladeModel<B>,
    batch: &TrainBatch,
    loss_fn: &SpladeLoss,
    teacher_scores: Option<&Tensor>,
    ctx: &Context,
) -> Result<StepMetrics> {
    let (b, m) = (batch.batch_size(), batch.docs_per_query());
    let vocab = model.vocab_size();

    let combined = batch.queries.concat(&batch.docs)?;
    let reps = model.forward(&combined, ctx)?.activations;

    // Rows [0, B) are queries, rows [B, B + B*M) documents
    let query = gather(&reps, (0..b * vocab).collect(), vec![b, vocab]);
    let docs = gather(&reps, (b * vocab..(b + b * m) * vocab).collect(), vec![b, m, vocab]);

    let scores = score(&query, &docs, loss_fn.temperature())?;
    let mut out = loss_fn.compute_loss(&scores, teacher_scores, &query, &docs)?;

    if ctx.is_training() {
        backward(&mut out.total, None);
    }

    Ok(out.metrics)
}
