//! Configuration validation logic
//!
//! Validates SPLADE configurations before any model is built.

use super::error::ValidationError;
use crate::config::schema::SpladeSpec;

/// Validate a training configuration
///
/// Checks:
/// - Model dimensions are positive and `top_k` fits the vocabulary
/// - Loss weights are finite and non-negative, temperature is positive
/// - Data sizes are positive and sequences fit `max_length`
pub fn validate_config(spec: &SpladeSpec) -> Result<(), ValidationError> {
    let model = &spec.model;

    if model.vocab_size == 0 {
        return Err(ValidationError::InvalidVocabSize(model.vocab_size));
    }

    if model.hidden_size == 0 {
        return Err(ValidationError::InvalidHiddenSize(model.hidden_size));
    }

    // Validate top_k against the vocabulary
    if model.top_k == 0 || model.top_k > model.vocab_size {
        return Err(ValidationError::InvalidTopK {
            top_k: model.top_k,
            vocab_size: model.vocab_size,
        });
    }

    if model.embedding_dim == 0 {
        return Err(ValidationError::InvalidEmbeddingDim(model.embedding_dim));
    }

    if model.max_length == 0 {
        return Err(ValidationError::InvalidMaxLength(model.max_length));
    }

    // Validate loss weights
    let weights = [
        ("lambda_doc", spec.loss.lambda_doc),
        ("lambda_query", spec.loss.lambda_query),
        ("mse_weight", spec.loss.mse_weight),
    ];
    for (name, value) in weights {
        if !value.is_finite() || value < 0.0 {
            return Err(ValidationError::InvalidWeight { name, value });
        }
    }

    if !spec.loss.temperature.is_finite() || spec.loss.temperature <= 0.0 {
        return Err(ValidationError::InvalidTemperature(spec.loss.temperature));
    }

    // Validate data sizes
    if spec.data.batch_size == 0 {
        return Err(ValidationError::InvalidBatchSize(spec.data.batch_size));
    }

    if spec.data.num_negatives == 0 {
        return Err(ValidationError::InvalidNumNegatives(spec.data.num_negatives));
    }

    if spec.data.seq_len == 0 || spec.data.seq_len > model.max_length {
        return Err(ValidationError::InvalidSeqLen {
            seq_len: spec.data.seq_len,
            max_length: model.max_length,
        });
    }

    Ok(())
}
