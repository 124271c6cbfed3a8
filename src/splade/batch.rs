//! Tokenized batch types
//!
//! Token ids and attention masks are produced by an external tokenizer and
//! stored row-major as `[batch, seq_len]`.

use crate::error::{Error, Result};

/// Non-padding marker per token position, `[batch, seq_len]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttentionMask {
    values: Vec<bool>,
    batch_size: usize,
    seq_len: usize,
}

impl AttentionMask {
    /// Create a mask from row-major values
    pub fn new(batch_size: usize, seq_len: usize, values: Vec<bool>) -> Result<Self> {
        if seq_len == 0 || values.len() != batch_size * seq_len {
            return Err(Error::shape(
                "AttentionMask::new",
                &[batch_size, seq_len],
                &[values.len()],
            ));
        }
        Ok(Self { values, batch_size, seq_len })
    }

    /// Mask from 0/1 integers, as returned by most tokenizers
    pub fn from_ints(batch_size: usize, seq_len: usize, values: &[u8]) -> Result<Self> {
        Self::new(batch_size, seq_len, values.iter().map(|&v| v != 0).collect())
    }

    /// Mask with the first `lengths[b]` positions of each row set
    pub fn from_lengths(lengths: &[usize], seq_len: usize) -> Result<Self> {
        let values = lengths
            .iter()
            .flat_map(|&len| (0..seq_len).map(move |t| t < len))
            .collect();
        Self::new(lengths.len(), seq_len, values)
    }

    /// Mask with every position set
    pub fn all(batch_size: usize, seq_len: usize) -> Result<Self> {
        Self::new(batch_size, seq_len, vec![true; batch_size * seq_len])
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    /// Whether position `t` of row `b` is a real token
    pub fn is_set(&self, b: usize, t: usize) -> bool {
        self.values[b * self.seq_len + t]
    }

    /// Number of real tokens in row `b`
    pub fn row_len(&self, b: usize) -> usize {
        self.values[b * self.seq_len..(b + 1) * self.seq_len]
            .iter()
            .filter(|&&v| v)
            .count()
    }

    /// One multiplicative factor (0.0 or 1.0) per position, row-major
    pub fn factors(&self) -> Vec<f32> {
        self.values.iter().map(|&v| if v { 1.0 } else { 0.0 }).collect()
    }

    /// Stack two masks along the batch axis
    pub fn concat(&self, other: &Self) -> Result<Self> {
        if self.seq_len != other.seq_len {
            return Err(Error::shape(
                "AttentionMask::concat",
                &[other.batch_size, self.seq_len],
                &[other.batch_size, other.seq_len],
            ));
        }
        let mut values = self.values.clone();
        values.extend_from_slice(&other.values);
        Self::new(self.batch_size + other.batch_size, self.seq_len, values)
    }
}

/// Token ids with their attention mask
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBatch {
    input_ids: Vec<u32>,
    attention_mask: AttentionMask,
}

impl TokenBatch {
    /// Pair token ids with a mask of the same `[batch, seq_len]` layout
    pub fn new(input_ids: Vec<u32>, attention_mask: AttentionMask) -> Result<Self> {
        let expected = attention_mask.batch_size() * attention_mask.seq_len();
        if input_ids.len() != expected {
            return Err(Error::shape(
                "TokenBatch::new",
                &[attention_mask.batch_size(), attention_mask.seq_len()],
                &[input_ids.len()],
            ));
        }
        Ok(Self { input_ids, attention_mask })
    }

    pub fn input_ids(&self) -> &[u32] {
        &self.input_ids
    }

    pub fn attention_mask(&self) -> &AttentionMask {
        &self.attention_mask
    }

    pub fn batch_size(&self) -> usize {
        self.attention_mask.batch_size()
    }

    pub fn seq_len(&self) -> usize {
        self.attention_mask.seq_len()
    }

    /// Stack two batches along the batch axis
    ///
    /// Both batches must share `seq_len`.
    pub fn concat(&self, other: &Self) -> Result<Self> {
        let attention_mask = self.attention_mask.concat(&other.attention_mask)?;
        let mut input_ids = self.input_ids.clone();
        input_ids.extend_from_slice(&other.input_ids);
        Self::new(input_ids, attention_mask)
    }
}
