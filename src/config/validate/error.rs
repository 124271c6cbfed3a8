//! Validation error types
//!
//! Defines all validation error variants for SPLADE training configurations.

/// Validation error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid vocabulary size: {0} (must be > 0)")]
    InvalidVocabSize(usize),

    #[error("Invalid hidden size: {0} (must be > 0)")]
    InvalidHiddenSize(usize),

    #[error("Invalid top_k: {top_k} (must be in 1..={vocab_size})")]
    InvalidTopK { top_k: usize, vocab_size: usize },

    #[error("Invalid embedding dimension: {0} (must be > 0)")]
    InvalidEmbeddingDim(usize),

    #[error("Invalid max length: {0} (must be > 0)")]
    InvalidMaxLength(usize),

    #[error("Invalid {name}: {value} (must be a finite number >= 0.0)")]
    InvalidWeight { name: &'static str, value: f32 },

    #[error("Invalid temperature: {0} (must be a finite number > 0.0)")]
    InvalidTemperature(f32),

    #[error("Invalid batch size: {0} (must be > 0)")]
    InvalidBatchSize(usize),

    #[error("Invalid number of negatives: {0} (must be > 0)")]
    InvalidNumNegatives(usize),

    #[error("Invalid sequence length: {seq_len} (must be in 1..={max_length})")]
    InvalidSeqLen { seq_len: usize, max_length: usize },
}

impl From<ValidationError> for crate::Error {
    fn from(err: ValidationError) -> Self {
        Self::InvalidConfiguration(err.to_string())
    }
}
