//! Sparse lexical representations (SPLADE)
//!
//! Dense per-token MLM logits become one vocabulary-sized, mostly-zero vector
//! per sequence:
//!
//! ```text
//! TokenBatch ─► backbone ─► logits [B,T,V] ─► compute_activation ─► [B,V]
//!                                   │                                  │
//!                                   │                        select_top_k (optional)
//!                                   ▼                                  │
//!                      aggregate_context [B,K,E]  ◄── indices ─────────┘
//! ```
//!
//! Query and document vectors are compared with [`score`].

mod activation;
mod backbone;
mod batch;
mod context;
mod model;
mod scoring;
mod topk;

pub use activation::compute_activation;
pub use backbone::{BackboneOutput, LookupBackbone, MaskedLmBackbone};
pub use batch::{AttentionMask, TokenBatch};
pub use context::ContextualAggregator;
pub use model::{SparseEmbedModel, SparseEmbedOutput, SpladeModel, SpladeOutput};
pub use scoring::score;
pub use topk::{select_top_k, top_k_indices, Sparsified, TopK, TopKMode};
