//! Top-K sparsification of activation vectors
//!
//! Two modes share one ranking rule: larger value first, lower vocabulary
//! index first among equal values.
//!
//! - [`TopKMode::Threshold`] keeps the `[B, V]` layout and zeroes every entry
//!   strictly below the row's K-th largest value. Entries equal to the
//!   threshold survive, so a row can keep more than K nonzeros under ties.
//! - [`TopKMode::Indices`] returns the K selected `(index, value)` pairs per row.

use crate::autograd::{gather, mul, Tensor};
use crate::error::{dims, Error, Result};
use crate::trace::{Survivors, TraceStep, TRACER};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::Instant;

/// Validated number of coordinates to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopK {
    k: usize,
}

impl TopK {
    /// Validate `k` against the vocabulary size
    ///
    /// Fails with [`Error::InvalidConfiguration`] if `k == 0` or `k > vocab_size`.
    pub fn new(k: usize, vocab_size: usize) -> Result<Self> {
        if k == 0 {
            return Err(Error::InvalidConfiguration("top_k must be > 0".into()));
        }
        if k > vocab_size {
            return Err(Error::InvalidConfiguration(format!(
                "top_k ({k}) exceeds vocabulary size ({vocab_size})"
            )));
        }
        Ok(Self { k })
    }

    pub fn k(&self) -> usize {
        self.k
    }
}

/// How the top-K coordinates are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopKMode {
    /// Same dimensionality, sub-threshold entries zeroed
    #[default]
    Threshold,
    /// Index/value pairs
    Indices,
}

/// Result of [`select_top_k`]
#[derive(Debug, Clone)]
pub enum Sparsified {
    /// `[B, V]` activations with sub-threshold entries zeroed
    Masked(Tensor),
    /// Per-row vocabulary indices `[B, K]` (descending by value) and their values
    Selected { indices: Array2<usize>, values: Tensor },
}

impl Sparsified {
    /// The differentiable part of the result
    pub fn values(&self) -> &Tensor {
        match self {
            Self::Masked(values) | Self::Selected { values, .. } => values,
        }
    }

    /// Selected indices, if produced in [`TopKMode::Indices`]
    pub fn indices(&self) -> Option<&Array2<usize>> {
        match self {
            Self::Masked(_) => None,
            Self::Selected { indices, .. } => Some(indices),
        }
    }
}

/// Keep the K largest coordinates of each row of `[B, V]` activations
pub fn select_top_k(activations: &Tensor, top_k: &TopK, mode: TopKMode) -> Result<Sparsified> {
    let started = TRACER.start();
    let rows = ranked_rows(activations, top_k)?;
    let result = match mode {
        TopKMode::Threshold => Sparsified::Masked(threshold_mask(activations, &rows, top_k.k())),
        TopKMode::Indices => {
            let (indices, values) = gather_selected(activations, &rows);
            Sparsified::Selected { indices, values }
        }
    };
    trace_survivors(started, activations, top_k, result.values());
    Ok(result)
}

/// Top-K index/value pairs of `[B, V]` activations, best first per row
pub fn top_k_indices(activations: &Tensor, top_k: &TopK) -> Result<(Array2<usize>, Tensor)> {
    let started = TRACER.start();
    let rows = ranked_rows(activations, top_k)?;
    let (indices, values) = gather_selected(activations, &rows);
    trace_survivors(started, activations, top_k, &values);
    Ok((indices, values))
}

/// Record how many of the V coordinates per row are still non-zero
fn trace_survivors(started: Option<Instant>, activations: &Tensor, top_k: &TopK, kept: &Tensor) {
    let (batch, vocab) = (activations.shape()[0], activations.shape()[1]);
    TRACER.finish_sparse(
        TraceStep::TopK,
        started,
        || format!("{batch}x{vocab} k={}", top_k.k()),
        || Survivors {
            rows: batch,
            width: vocab,
            non_zero: kept.data().iter().filter(|&&x| x != 0.0).count(),
        },
    );
}

/// The K best vocabulary indices of every row
fn ranked_rows(activations: &Tensor, top_k: &TopK) -> Result<Vec<Vec<usize>>> {
    let [batch, vocab] = dims::<2>("select_top_k", activations.shape())?;
    let k = top_k.k();
    if k > vocab {
        return Err(Error::InvalidConfiguration(format!(
            "top_k ({k}) exceeds vocabulary size ({vocab})"
        )));
    }

    let data = activations.data().as_slice().expect("tensor data must be contiguous");
    Ok(data.chunks(vocab).take(batch).map(|row| rank_row(row, k)).collect())
}

fn threshold_mask(activations: &Tensor, rows: &[Vec<usize>], k: usize) -> Tensor {
    let data = activations.data().as_slice().expect("tensor data must be contiguous");
    let vocab = activations.shape()[1];
    let mut keep = Array1::<f32>::zeros(data.len());
    for (b, (row, ranked)) in data.chunks(vocab).zip(rows).enumerate() {
        let threshold = row[ranked[k - 1]];
        for (v, &x) in row.iter().enumerate() {
            if x >= threshold {
                keep[b * vocab + v] = 1.0;
            }
        }
    }
    let keep = Tensor::with_shape(keep, activations.shape().to_vec(), false);
    mul(activations, &keep)
}

fn gather_selected(activations: &Tensor, rows: &[Vec<usize>]) -> (Array2<usize>, Tensor) {
    let vocab = activations.shape()[1];
    let (batch, k) = (rows.len(), rows.first().map_or(0, Vec::len));
    let indices = Array2::from_shape_fn((batch, k), |(b, j)| rows[b][j]);
    let flat = rows
        .iter()
        .enumerate()
        .flat_map(|(b, ranked)| ranked.iter().map(move |&v| b * vocab + v))
        .collect();
    (indices, gather(activations, flat, vec![batch, k]))
}

/// Indices of the `k` largest entries, best first
fn rank_row(row: &[f32], k: usize) -> Vec<usize> {
    let by_rank = |&a: &usize, &b: &usize| -> Ordering {
        row[b].total_cmp(&row[a]).then(a.cmp(&b))
    };
    let mut order: Vec<usize> = (0..row.len()).collect();
    if k < order.len() {
        order.select_nth_unstable_by(k - 1, by_rank);
        order.truncate(k);
    }
    order.sort_unstable_by(by_rank);
    order
}
