//! Crate-wide error type
//!
//! Structural problems (shape mismatches, invalid configuration) are errors.
//! Degenerate numeric input (all-zero representations, fully padded
//! sequences) is not: those cases produce documented sentinel values.

use thiserror::Error;

/// Result alias for esparcir operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the sparse retrieval pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Input tensors have incompatible batch, sequence or vocabulary dimensions
    #[error("Shape mismatch in {op}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        op: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// A tensor has the wrong number of axes, or an empty axis where one is required
    #[error("Rank mismatch in {op}: expected rank {expected}, got shape {actual:?}")]
    RankMismatch {
        op: &'static str,
        expected: usize,
        actual: Vec<usize>,
    },

    /// A configuration value was rejected before any forward pass
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A configuration file could not be read or parsed
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// IO failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a shape mismatch error
    pub fn shape(op: &'static str, expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch { op, expected: expected.to_vec(), actual: actual.to_vec() }
    }

    /// Whether the caller can fix this by changing configuration
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::InvalidConfiguration(_) | Self::ConfigError(_))
    }
}

/// Fail with [`Error::ShapeMismatch`] unless `actual == expected`
pub(crate) fn ensure_shape(op: &'static str, expected: &[usize], actual: &[usize]) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::shape(op, expected, actual))
    }
}

/// Dimensions of a rank-`N` tensor with no empty axis
pub(crate) fn dims<const N: usize>(op: &'static str, shape: &[usize]) -> Result<[usize; N]> {
    match <[usize; N]>::try_from(shape) {
        Ok(dims) if dims.iter().all(|&d| d > 0) => Ok(dims),
        _ => Err(Error::RankMismatch { op, expected: N, actual: shape.to_vec() }),
    }
}
