//! YAML schema definitions for declarative SPLADE training configuration

use crate::train::LossCoefficients;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which SPLADE model variant to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariant {
    /// Activation followed by threshold top-K masking
    #[default]
    Splade,
    /// Activation only; logits are returned alongside
    NoTopK,
    /// Top-K selection plus contextual embeddings
    SparseEmbed,
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Splade => write!(f, "splade"),
            Self::NoTopK => write!(f, "no_top_k"),
            Self::SparseEmbed => write!(f, "sparse_embed"),
        }
    }
}

/// Complete training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpladeSpec {
    /// Model configuration
    pub model: ModelSpec,

    /// Loss configuration
    #[serde(default)]
    pub loss: LossSpec,

    /// Data configuration
    #[serde(default)]
    pub data: DataSpec,
}

/// Model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    #[serde(default)]
    pub variant: ModelVariant,

    /// Vocabulary size of the MLM head
    pub vocab_size: usize,

    /// Hidden size of the backbone's last layer
    #[serde(default = "default_hidden_size")]
    pub hidden_size: usize,

    /// Coordinates kept per representation
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Output dimension of contextual embeddings
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,

    /// Tokenization bound used by the serving adapter
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

fn default_hidden_size() -> usize {
    64
}

fn default_top_k() -> usize {
    64
}

fn default_embedding_dim() -> usize {
    128
}

fn default_max_length() -> usize {
    256
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            variant: ModelVariant::default(),
            vocab_size: 30522,
            hidden_size: default_hidden_size(),
            top_k: default_top_k(),
            embedding_dim: default_embedding_dim(),
            max_length: default_max_length(),
        }
    }
}

/// Loss configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossSpec {
    #[serde(default = "default_lambda")]
    pub lambda_doc: f32,

    #[serde(default = "default_lambda")]
    pub lambda_query: f32,

    #[serde(default = "default_one")]
    pub temperature: f32,

    #[serde(default = "default_one")]
    pub mse_weight: f32,
}

fn default_lambda() -> f32 {
    1e-3
}

fn default_one() -> f32 {
    1.0
}

impl Default for LossSpec {
    fn default() -> Self {
        Self {
            lambda_doc: default_lambda(),
            lambda_query: default_lambda(),
            temperature: default_one(),
            mse_weight: default_one(),
        }
    }
}

impl From<LossSpec> for LossCoefficients {
    fn from(spec: LossSpec) -> Self {
        Self {
            lambda_doc: spec.lambda_doc,
            lambda_query: spec.lambda_query,
            temperature: spec.temperature,
            mse_weight: spec.mse_weight,
        }
    }
}

/// Data configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataSpec {
    /// Queries per step
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Negatives per query (documents per query = negatives + 1)
    #[serde(default = "default_num_negatives")]
    pub num_negatives: usize,

    /// Tokens per sequence
    #[serde(default = "default_seq_len")]
    pub seq_len: usize,

    /// Seed for synthetic batches
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_batch_size() -> usize {
    8
}

fn default_num_negatives() -> usize {
    2
}

fn default_seq_len() -> usize {
    32
}

fn default_seed() -> u64 {
    42
}

impl Default for DataSpec {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            num_negatives: default_num_negatives(),
            seq_len: default_seq_len(),
            seed: default_seed(),
        }
    }
}

impl DataSpec {
    /// Documents per query: one positive plus the negatives
    pub fn docs_per_query(&self) -> usize {
        self.num_negatives + 1
    }
}
