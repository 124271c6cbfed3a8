//! Serving adapter: raw text in, sparse sentence embeddings out
//!
//! Tokenization is an external collaborator behind the [`Tokenizer`] trait.

mod encoder;

pub use encoder::{SparseSentenceEncoder, SparseVector, Tokenizer};
