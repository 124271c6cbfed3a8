//! Pipeline tracing
//!
//! When enabled, every stage of a training step records its wall time and the
//! shape it ran on. The sparsifying stages (activation and top-K) also record
//! how many vocabulary coordinates survived, so the report shows where the
//! representation actually becomes sparse.
//!
//! ```
//! use esparcir::trace::{Survivors, TraceStep, Tracer};
//!
//! let tracer = Tracer::new();
//! tracer.enable();
//! let started = tracer.start();
//! tracer.finish_sparse(TraceStep::TopK, started, || "1x4 k=2".into(), || {
//!     Survivors::count(1, &[0.0, 0.9, 0.0, 0.7])
//! });
//! assert_eq!(tracer.summary()[&TraceStep::TopK].survivors.unwrap().non_zero, 2);
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TraceStep {
    /// Backbone embedding lookup and MLM head
    Forward,
    /// log1p(relu) with masked max-pooling
    Activation,
    /// Top-K threshold masking or selection
    TopK,
    /// Attention pooling of hidden states for selected terms
    ContextPool,
    /// Query/document inner products
    Score,
    /// Composite loss evaluation
    Loss,
    /// Gradient propagation
    Backward,
    /// Dense GEMM kernel
    Matmul,
    /// Row-major transpose feeding a GEMM backward
    Transpose,
}

impl TraceStep {
    /// Column label used by the report
    pub fn label(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Activation => "activation",
            Self::TopK => "top-k",
            Self::ContextPool => "context-pool",
            Self::Score => "score",
            Self::Loss => "loss",
            Self::Backward => "backward",
            Self::Matmul => "gemm",
            Self::Transpose => "transpose",
        }
    }
}

/// Non-zero coordinates left after a sparsifying stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Survivors {
    /// Representation rows (sequences)
    pub rows: usize,
    /// Coordinates per row
    pub width: usize,
    /// Non-zero coordinates across all rows
    pub non_zero: usize,
}

impl Survivors {
    /// Count the non-zero entries of `rows` equally wide rows
    pub fn count(rows: usize, values: &[f32]) -> Self {
        let width = if rows == 0 { 0 } else { values.len() / rows };
        Self { rows, width, non_zero: values.iter().filter(|&&x| x != 0.0).count() }
    }

    /// Mean non-zero coordinates per row
    pub fn per_row(&self) -> f64 {
        if self.rows == 0 {
            0.0
        } else {
            self.non_zero as f64 / self.rows as f64
        }
    }

    /// Fraction of coordinates that are non-zero
    pub fn density(&self) -> f64 {
        let total = self.rows * self.width;
        if total == 0 {
            0.0
        } else {
            self.non_zero as f64 / total as f64
        }
    }

    fn absorb(&mut self, other: Self) {
        self.rows += other.rows;
        self.width = self.width.max(other.width);
        self.non_zero += other.non_zero;
    }
}

#[derive(Debug, Clone)]
struct Span {
    step: TraceStep,
    elapsed: Duration,
    shape: String,
    survivors: Option<Survivors>,
}

/// Aggregate of every span recorded for one stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageSummary {
    pub calls: usize,
    pub elapsed: Duration,
    /// Shape of the most recent call
    pub shape: String,
    /// Survivor counts summed over calls, for sparsifying stages
    pub survivors: Option<Survivors>,
}

/// Collector of per-stage spans
///
/// Disabled tracers never read the clock and never evaluate the shape or
/// survivor closures.
#[derive(Debug)]
pub struct Tracer {
    enabled: AtomicBool,
    spans: Mutex<Vec<Span>>,
}

impl Tracer {
    pub const fn new() -> Self {
        Self { enabled: AtomicBool::new(false), spans: Mutex::new(Vec::new()) }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Start timing a stage; `None` while tracing is off
    pub fn start(&self) -> Option<Instant> {
        self.is_enabled().then(Instant::now)
    }

    /// Close a span opened with [`Tracer::start`]
    pub fn finish(&self, step: TraceStep, started: Option<Instant>, shape: impl FnOnce() -> String) {
        if let Some(started) = started {
            self.push(Span { step, elapsed: started.elapsed(), shape: shape(), survivors: None });
        }
    }

    /// Close a span of a sparsifying stage together with its survivor count
    pub fn finish_sparse(
        &self,
        step: TraceStep,
        started: Option<Instant>,
        shape: impl FnOnce() -> String,
        survivors: impl FnOnce() -> Survivors,
    ) {
        if let Some(started) = started {
            let elapsed = started.elapsed();
            self.push(Span { step, elapsed, shape: shape(), survivors: Some(survivors()) });
        }
    }

    fn push(&self, span: Span) {
        self.spans.lock().unwrap_or_else(PoisonError::into_inner).push(span);
    }

    /// Drop every recorded span
    pub fn clear(&self) {
        self.spans.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Per-stage aggregates, in pipeline order
    pub fn summary(&self) -> BTreeMap<TraceStep, StageSummary> {
        let spans = self.spans.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stages: BTreeMap<TraceStep, StageSummary> = BTreeMap::new();
        for span in spans.iter() {
            let stage = stages.entry(span.step).or_default();
            stage.calls += 1;
            stage.elapsed += span.elapsed;
            stage.shape.clone_from(&span.shape);
            if let Some(survivors) = span.survivors {
                stage.survivors.get_or_insert_with(Survivors::default).absorb(survivors);
            }
        }
        stages
    }

    /// Timing table followed by the sparsity left after each sparsifying stage
    pub fn report(&self) -> String {
        let stages = self.summary();
        if stages.is_empty() {
            return "esparcir trace: no spans recorded".to_string();
        }

        let total: Duration = stages.values().map(|s| s.elapsed).sum();
        let mut lines = vec![
            format!(
                "esparcir trace: {total:.2?} over {} spans",
                stages.values().map(|s| s.calls).sum::<usize>()
            ),
            format!("{:<13} {:>6} {:>12} {:>7}  {}", "stage", "calls", "time", "share", "last shape"),
        ];
        for (step, stage) in &stages {
            let share = if total.is_zero() {
                0.0
            } else {
                stage.elapsed.as_secs_f64() / total.as_secs_f64() * 100.0
            };
            lines.push(format!(
                "{:<13} {:>6} {:>12.2?} {:>6.1}%  {}",
                step.label(),
                stage.calls,
                stage.elapsed,
                share,
                stage.shape
            ));
        }

        let sparse: Vec<_> = stages
            .iter()
            .filter_map(|(step, stage)| stage.survivors.map(|s| (*step, s)))
            .collect();
        if !sparse.is_empty() {
            lines.push(String::new());
            lines.push("sparsity".to_string());
            for (step, s) in &sparse {
                lines.push(format!(
                    "{:<13} {:>10.1} of {} per row ({:.3}% dense)",
                    step.label(),
                    s.per_row(),
                    s.width,
                    s.density() * 100.0
                ));
            }
            let activated = stages.get(&TraceStep::Activation).and_then(|s| s.survivors);
            let kept = stages.get(&TraceStep::TopK).and_then(|s| s.survivors);
            if let (Some(activated), Some(kept)) = (activated, kept) {
                if activated.per_row() > 0.0 {
                    let pruned = (1.0 - kept.per_row() / activated.per_row()).max(0.0) * 100.0;
                    lines.push(format!("top-k pruned {pruned:.1}% of activated terms"));
                }
            }
        }

        lines.join("\n")
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide tracer shared by the pipeline stages
pub static TRACER: Tracer = Tracer::new();
