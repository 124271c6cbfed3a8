//! Per-step metrics record

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sparsity statistics of one side (queries or documents)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SparsityStats {
    /// Fraction of exactly-zero coordinates, in [0, 1]
    pub sparsity: f64,
    /// Smallest nonzero absolute value; 0 when every coordinate is zero
    pub min_non_zero: f64,
    /// Number of nonzero coordinates
    pub non_zero_count: usize,
}

impl SparsityStats {
    /// Statistics over a flat slice of representation values
    ///
    /// An empty or all-zero slice yields `min_non_zero = 0`; an empty slice
    /// counts as fully sparse.
    pub fn from_values(values: &[f32]) -> Self {
        let non_zero: Vec<f32> = values.iter().copied().filter(|&v| v != 0.0).map(f32::abs).collect();
        let sparsity = if values.is_empty() {
            1.0
        } else {
            (values.len() - non_zero.len()) as f64 / values.len() as f64
        };
        let min_non_zero = non_zero.iter().copied().reduce(f32::min).unwrap_or(0.0);
        Self { sparsity, min_non_zero: f64::from(min_non_zero), non_zero_count: non_zero.len() }
    }
}

/// Loss terms and representation diagnostics of one training step
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StepMetrics {
    /// Total loss
    pub loss: f64,
    /// Contrastive ranking term
    pub contrastive_loss: f64,
    /// Margin-MSE distillation term, before `mse_weight`
    pub margin_mse_loss: f64,
    /// FLOPS regularization term (coefficients applied)
    pub flops_loss: f64,
    /// Anti-collapse term
    pub anti_collapse_loss: f64,
    pub query_sparsity: f64,
    pub doc_sparsity: f64,
    pub query_min_non_zero: f64,
    pub doc_min_non_zero: f64,
    pub query_non_zero_count: usize,
    pub doc_non_zero_count: usize,
}

impl StepMetrics {
    /// Fill the representation diagnostics from per-side statistics
    pub fn with_sparsity(mut self, query: SparsityStats, docs: SparsityStats) -> Self {
        self.query_sparsity = query.sparsity;
        self.doc_sparsity = docs.sparsity;
        self.query_min_non_zero = query.min_non_zero;
        self.doc_min_non_zero = docs.min_non_zero;
        self.query_non_zero_count = query.non_zero_count;
        self.doc_non_zero_count = docs.non_zero_count;
        self
    }

    /// Metric name to value
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        [
            ("loss", self.loss),
            ("contrastive_loss", self.contrastive_loss),
            ("margin_mse_loss", self.margin_mse_loss),
            ("flops_loss", self.flops_loss),
            ("anti_collapse_loss", self.anti_collapse_loss),
            ("query_sparsity", self.query_sparsity),
            ("doc_sparsity", self.doc_sparsity),
            ("query_min_non_zero", self.query_min_non_zero),
            ("doc_min_non_zero", self.doc_min_non_zero),
            ("query_non_zero_count", self.query_non_zero_count as f64),
            ("doc_non_zero_count", self.doc_non_zero_count as f64),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    /// Whether every loss term is finite
    pub fn is_finite(&self) -> bool {
        [
            self.loss,
            self.contrastive_loss,
            self.margin_mse_loss,
            self.flops_loss,
            self.anti_collapse_loss,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}
