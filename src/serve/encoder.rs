//! Sentence-embedding interface over a SPLADE model

use crate::autograd::Context;
use crate::error::{Error, Result};
use crate::splade::{MaskedLmBackbone, SpladeModel, TokenBatch};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Text to token ids
pub trait Tokenizer {
    /// Tokenize `texts`, truncating and padding every row to exactly `max_length`
    fn tokenize(&self, texts: &[&str], max_length: usize) -> Result<TokenBatch>;
}

/// Nonzero coordinates of one sparse embedding, ascending by index
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<usize>,
    pub values: Vec<f32>,
}

impl SparseVector {
    /// Collect the nonzero entries of a dense row
    pub fn from_dense(row: &[f32]) -> Self {
        let (indices, values) = row
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v != 0.0)
            .map(|(i, &v)| (i, v))
            .unzip();
        Self { indices, values }
    }

    /// Number of nonzero coordinates
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Inner product with another sparse vector
    pub fn dot(&self, other: &Self) -> f32 {
        let (mut i, mut j, mut acc) = (0, 0, 0.0);
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    acc += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        acc
    }
}

/// Encodes raw text with a [`SpladeModel`] in inference mode
pub struct SparseSentenceEncoder<B: MaskedLmBackbone, T: Tokenizer> {
    model: SpladeModel<B>,
    tokenizer: T,
    max_length: usize,
    ctx: Context,
}

impl<B: MaskedLmBackbone, T: Tokenizer> SparseSentenceEncoder<B, T> {
    /// Wrap a model and tokenizer; `max_length` bounds every tokenized text
    pub fn new(model: SpladeModel<B>, tokenizer: T, max_length: usize) -> Result<Self> {
        if max_length == 0 {
            return Err(Error::InvalidConfiguration("max_length must be > 0".into()));
        }
        Ok(Self { model, tokenizer, max_length, ctx: Context::inference() })
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn model(&self) -> &SpladeModel<B> {
        &self.model
    }

    /// Tokenize with padding and truncation to `max_length`
    pub fn tokenize(&self, texts: &[&str]) -> Result<TokenBatch> {
        let batch = self.tokenizer.tokenize(texts, self.max_length)?;
        if batch.seq_len() != self.max_length || batch.batch_size() != texts.len() {
            return Err(Error::shape(
                "SparseSentenceEncoder::tokenize",
                &[texts.len(), self.max_length],
                &[batch.batch_size(), batch.seq_len()],
            ));
        }
        Ok(batch)
    }

    /// Dense `[N, V]` sparse embeddings
    pub fn encode(&self, texts: &[&str]) -> Result<Array2<f32>> {
        let vocab = self.model.vocab_size();
        if texts.is_empty() {
            return Ok(Array2::zeros((0, vocab)));
        }
        let batch = self.tokenize(texts)?;
        let reps = self.model.forward(&batch, &self.ctx)?.activations;
        Array2::from_shape_vec((texts.len(), vocab), reps.data().to_vec())
            .map_err(|_| Error::shape("SparseSentenceEncoder::encode", &[texts.len(), vocab], reps.shape()))
    }

    /// Nonzero coordinates per text
    pub fn encode_sparse(&self, texts: &[&str]) -> Result<Vec<SparseVector>> {
        let dense = self.encode(texts)?;
        Ok(dense
            .rows()
            .into_iter()
            .map(|row| SparseVector::from_dense(&row.to_vec()))
            .collect())
    }
}
