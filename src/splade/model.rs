//! SPLADE model variants over a masked-language-model backbone

use super::{
    compute_activation, select_top_k, top_k_indices, ContextualAggregator, MaskedLmBackbone,
    TokenBatch, TopK, TopKMode,
};
use crate::autograd::{Context, Tensor};
use crate::error::{Error, Result};
use ndarray::Array2;

/// Output of [`SpladeModel::forward`]
#[derive(Debug, Clone)]
pub struct SpladeOutput {
    /// Sparse representations `[B, V]`
    pub activations: Tensor,
    /// MLM logits `[B, T, V]`, returned by the variant without top-K masking
    pub logits: Option<Tensor>,
}

/// Sparse lexical model: activation followed by optional threshold top-K
pub struct SpladeModel<B: MaskedLmBackbone> {
    backbone: B,
    top_k: Option<TopK>,
}

impl<B: MaskedLmBackbone> SpladeModel<B> {
    /// Create a model; `top_k: None` disables top-K masking
    pub fn new(backbone: B, top_k: Option<usize>) -> Result<Self> {
        let top_k = top_k.map(|k| TopK::new(k, backbone.vocab_size())).transpose()?;
        Ok(Self { backbone, top_k })
    }

    pub fn backbone(&self) -> &B {
        &self.backbone
    }

    pub fn top_k(&self) -> Option<TopK> {
        self.top_k
    }

    pub fn vocab_size(&self) -> usize {
        self.backbone.vocab_size()
    }

    /// Trainable parameters
    pub fn parameters(&self) -> Vec<Tensor> {
        self.backbone.parameters()
    }

    /// Encode a batch into `[B, V]` sparse representations
    pub fn forward(&self, batch: &TokenBatch, ctx: &Context) -> Result<SpladeOutput> {
        let out = self.backbone.forward(batch, false, ctx)?;
        let activations = compute_activation(&out.logits, batch.attention_mask())?;

        match &self.top_k {
            Some(top_k) => {
                let masked = select_top_k(&activations, top_k, TopKMode::Threshold)?;
                Ok(SpladeOutput { activations: masked.values().clone(), logits: None })
            }
            None => Ok(SpladeOutput { activations, logits: Some(out.logits) }),
        }
    }
}

/// Output of [`SparseEmbedModel::forward`]
#[derive(Debug, Clone)]
pub struct SparseEmbedOutput {
    /// Full sparse activations `[B, V]` (no top-K masking)
    pub sparse_activations: Tensor,
    /// Selected vocabulary indices `[B, K]`, best first
    pub top_indices: Array2<usize>,
    /// Activation values at the selected indices `[B, K]`
    pub top_values: Tensor,
    /// Contextual embedding per selected term `[B, K, embedding_dim]`
    pub embeddings: Tensor,
}

/// Sparse activations plus a dense contextual embedding per top-K term
pub struct SparseEmbedModel<B: MaskedLmBackbone> {
    backbone: B,
    top_k: TopK,
    aggregator: ContextualAggregator,
}

impl<B: MaskedLmBackbone> SparseEmbedModel<B> {
    /// Create a model with a fresh projection to `embedding_dim`
    pub fn new(backbone: B, top_k: usize, embedding_dim: usize) -> Result<Self> {
        let top_k = TopK::new(top_k, backbone.vocab_size())?;
        let aggregator = ContextualAggregator::new(backbone.hidden_size(), embedding_dim)?;
        Ok(Self { backbone, top_k, aggregator })
    }

    pub fn backbone(&self) -> &B {
        &self.backbone
    }

    pub fn aggregator(&self) -> &ContextualAggregator {
        &self.aggregator
    }

    pub fn top_k(&self) -> TopK {
        self.top_k
    }

    /// Trainable parameters (backbone and projection)
    pub fn parameters(&self) -> Vec<Tensor> {
        let mut params = self.backbone.parameters();
        params.extend(self.aggregator.parameters());
        params
    }

    pub fn forward(&self, batch: &TokenBatch, ctx: &Context) -> Result<SparseEmbedOutput> {
        let out = self.backbone.forward(batch, true, ctx)?;
        let hidden_states = out.hidden_states.ok_or_else(|| {
            Error::InvalidConfiguration("backbone did not return hidden states".into())
        })?;
        let sparse_activations = compute_activation(&out.logits, batch.attention_mask())?;

        let (indices, values) = top_k_indices(&sparse_activations, &self.top_k)?;
        let embeddings = self.aggregator.aggregate_context(&indices, &out.logits, &hidden_states)?;
        let embeddings = if ctx.is_training() { embeddings } else { embeddings.detach() };

        Ok(SparseEmbedOutput { sparse_activations, top_indices: indices, top_values: values, embeddings })
    }
}
