//! Masked-language-model backbones
//!
//! The transformer itself is an external collaborator; the pipeline only needs
//! per-token vocabulary logits and, for contextual embeddings, the last-layer
//! hidden states.

use super::TokenBatch;
use crate::autograd::{add_bias, gather, matmul, Context, Tensor};
use crate::error::{dims, ensure_shape, Error, Result};
use crate::trace::{TraceStep, TRACER};

/// Output of a backbone forward pass
#[derive(Debug, Clone)]
pub struct BackboneOutput {
    /// MLM logits `[B, T, V]`
    pub logits: Tensor,
    /// Last-layer hidden states `[B, T, H]`, when requested
    pub hidden_states: Option<Tensor>,
}

/// A model producing per-token vocabulary logits
pub trait MaskedLmBackbone {
    /// Vocabulary size V
    fn vocab_size(&self) -> usize;

    /// Hidden size H of the last layer
    fn hidden_size(&self) -> usize;

    /// Run the model on a tokenized batch
    fn forward(
        &self,
        batch: &TokenBatch,
        output_hidden_states: bool,
        ctx: &Context,
    ) -> Result<BackboneOutput>;

    /// Trainable parameters
    fn parameters(&self) -> Vec<Tensor>;
}

/// Embedding lookup followed by a linear MLM head
///
/// A minimal backbone with the same interface as a transformer, used to drive
/// the pipeline end to end without external weights.
pub struct LookupBackbone {
    /// Token embeddings (vocab_size x hidden_size)
    pub embedding: Tensor,
    /// MLM head weight (hidden_size x vocab_size)
    pub head_weight: Tensor,
    /// MLM head bias (vocab_size)
    pub head_bias: Tensor,
    vocab_size: usize,
    hidden_size: usize,
}

impl LookupBackbone {
    /// Create a backbone with deterministic initial weights
    pub fn new(vocab_size: usize, hidden_size: usize) -> Result<Self> {
        if vocab_size == 0 || hidden_size == 0 {
            return Err(Error::InvalidConfiguration(format!(
                "vocab_size ({vocab_size}) and hidden_size ({hidden_size}) must be > 0"
            )));
        }
        let scale = (1.0 / hidden_size as f32).sqrt();
        let embedding = Tensor::with_shape(
            (0..vocab_size * hidden_size).map(|i| (i as f32 * 0.111).sin() * scale).collect(),
            vec![vocab_size, hidden_size],
            true,
        );
        let head_weight = Tensor::with_shape(
            (0..hidden_size * vocab_size).map(|i| (i as f32 * 0.037).cos() * scale).collect(),
            vec![hidden_size, vocab_size],
            true,
        );
        let head_bias = Tensor::with_shape(ndarray::Array1::zeros(vocab_size), vec![vocab_size], true);
        Ok(Self { embedding, head_weight, head_bias, vocab_size, hidden_size })
    }

    /// Create from existing parameters
    pub fn from_params(embedding: Tensor, head_weight: Tensor, head_bias: Tensor) -> Result<Self> {
        let [vocab_size, hidden_size] = dims::<2>("LookupBackbone", embedding.shape())?;
        ensure_shape("LookupBackbone", &[hidden_size, vocab_size], head_weight.shape())?;
        ensure_shape("LookupBackbone", &[vocab_size], head_bias.shape())?;
        Ok(Self { embedding, head_weight, head_bias, vocab_size, hidden_size })
    }
}

impl MaskedLmBackbone for LookupBackbone {
    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    fn forward(
        &self,
        batch: &TokenBatch,
        output_hidden_states: bool,
        ctx: &Context,
    ) -> Result<BackboneOutput> {
        let (b, t) = (batch.batch_size(), batch.seq_len());
        let (v, h) = (self.vocab_size, self.hidden_size);
        if let Some(&bad) = batch.input_ids().iter().find(|&&id| id as usize >= v) {
            return Err(Error::shape("LookupBackbone::forward", &[v], &[bad as usize]));
        }

        // Inference runs on detached parameters so no graph is recorded
        let detach = |p: &Tensor| if ctx.is_training() { p.clone() } else { p.detach() };
        let (embedding, head_weight, head_bias) =
            (detach(&self.embedding), detach(&self.head_weight), detach(&self.head_bias));

        let started = TRACER.start();
        let index = batch
            .input_ids()
            .iter()
            .flat_map(|&id| (0..h).map(move |j| id as usize * h + j))
            .collect();
        let hidden = gather(&embedding, index, vec![b, t, h]);
        let logits = add_bias(&matmul(&hidden, &head_weight, b * t, h, v), &head_bias)
            .reshape(&[b, t, v])?;
        TRACER.finish(TraceStep::Forward, started, || format!("{b}x{t}x{v}"));

        Ok(BackboneOutput { logits, hidden_states: output_hidden_states.then_some(hidden) })
    }

    fn parameters(&self) -> Vec<Tensor> {
        vec![self.embedding.clone(), self.head_weight.clone(), self.head_bias.clone()]
    }
}
