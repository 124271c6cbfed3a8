//! Composite SPLADE training objective

use super::{AntiCollapseLoss, ContrastiveLoss, FlopsLoss, RepresentationRegularizer};
use crate::autograd::{add, scale};
use crate::distill::MarginMseLoss;
use crate::error::{dims, ensure_shape, Error, Result};
use crate::train::{SparsityStats, StepMetrics};
use crate::trace::{TraceStep, TRACER};
use crate::Tensor;
use serde::{Deserialize, Serialize};

/// Weights of the loss terms and the score temperature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossCoefficients {
    /// FLOPS weight on document representations
    pub lambda_doc: f32,
    /// FLOPS weight on query representations
    pub lambda_query: f32,
    /// Divisor of raw inner-product scores
    pub temperature: f32,
    /// Weight of the margin-MSE distillation term
    pub mse_weight: f32,
}

impl Default for LossCoefficients {
    fn default() -> Self {
        Self { lambda_doc: 1e-3, lambda_query: 1e-3, temperature: 1.0, mse_weight: 1.0 }
    }
}

impl LossCoefficients {
    /// Reject negative weights and non-positive temperatures
    pub fn validate(&self) -> Result<()> {
        let weights = [
            ("lambda_doc", self.lambda_doc),
            ("lambda_query", self.lambda_query),
            ("mse_weight", self.mse_weight),
        ];
        for (name, value) in weights {
            if !(value.is_finite() && value >= 0.0) {
                return Err(Error::InvalidConfiguration(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if !(self.temperature.is_finite() && self.temperature > 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "temperature must be positive, got {}",
                self.temperature
            )));
        }
        Ok(())
    }
}

/// Scalar loss plus its metrics record
#[derive(Debug, Clone)]
pub struct LossOutput {
    /// Differentiable total loss (shape `[1]`)
    pub total: Tensor,
    pub metrics: StepMetrics,
}

/// Contrastive + FLOPS + anti-collapse + weighted margin-MSE
///
/// ```text
/// L = CE(scores, 0) + FLOPS(q, d) + AntiCollapse(q, d) + mse_weight · MarginMSE(scores, teacher)
/// ```
#[derive(Debug, Clone)]
pub struct SpladeLoss {
    coefficients: LossCoefficients,
    contrastive: ContrastiveLoss,
    flops: FlopsLoss,
    anti_collapse: AntiCollapseLoss,
    margin_mse: MarginMseLoss,
}

impl SpladeLoss {
    /// Build the objective from validated coefficients
    pub fn new(coefficients: LossCoefficients) -> Result<Self> {
        coefficients.validate()?;
        Ok(Self {
            coefficients,
            contrastive: ContrastiveLoss,
            flops: FlopsLoss::new(coefficients.lambda_doc, coefficients.lambda_query),
            anti_collapse: AntiCollapseLoss::default(),
            margin_mse: MarginMseLoss,
        })
    }

    /// Replace the anti-collapse term's constants
    pub fn with_anti_collapse(mut self, anti_collapse: AntiCollapseLoss) -> Self {
        self.anti_collapse = anti_collapse;
        self
    }

    pub fn coefficients(&self) -> &LossCoefficients {
        &self.coefficients
    }

    /// Score temperature
    pub fn temperature(&self) -> f32 {
        self.coefficients.temperature
    }

    /// Compute the total loss and metrics
    ///
    /// * `scores` - student scores `[B, M]`, positive at index 0, `M >= 2`
    /// * `teacher_scores` - teacher scores `[B, M]`; without them the margin-MSE term is 0
    /// * `query` - query representations `[B, V]`
    /// * `docs` - document representations `[B, M, V]`
    pub fn compute_loss(
        &self,
        scores: &Tensor,
        teacher_scores: Option<&Tensor>,
        query: &Tensor,
        docs: &Tensor,
    ) -> Result<LossOutput> {
        let [batch, group] = dims::<2>("compute_loss", scores.shape())?;
        let [_, vocab] = dims::<2>("compute_loss", query.shape())?;
        ensure_shape("compute_loss", &[batch, vocab], query.shape())?;
        ensure_shape("compute_loss", &[batch, group, vocab], docs.shape())?;
        if let Some(teacher) = teacher_scores {
            ensure_shape("compute_loss", &[batch, group], teacher.shape())?;
        }
        if group < 2 {
            return Err(Error::shape("compute_loss", &[batch, 2], &[batch, group]));
        }

        let started = TRACER.start();
        let contrastive = self.contrastive.forward(scores)?;
        let flops = self.flops.forward(query, docs);
        let anti_collapse = self.anti_collapse.forward(query, docs);
        let margin_mse = teacher_scores
            .map(|teacher| self.margin_mse.forward(scores, teacher))
            .transpose()?;

        let mut total = add(&add(&contrastive, &flops), &anti_collapse);
        if let Some(margin_mse) = &margin_mse {
            total = add(&total, &scale(margin_mse, self.coefficients.mse_weight));
        }
        TRACER.finish(TraceStep::Loss, started, || format!("{batch}x{group}x{vocab}"));

        let metrics = StepMetrics {
            loss: f64::from(total.item()),
            contrastive_loss: f64::from(contrastive.item()),
            margin_mse_loss: margin_mse.map_or(0.0, |m| f64::from(m.item())),
            flops_loss: f64::from(flops.item()),
            anti_collapse_loss: f64::from(anti_collapse.item()),
            ..Default::default()
        }
        .with_sparsity(stats(query), stats(docs));

        Ok(LossOutput { total, metrics })
    }
}

fn stats(x: &Tensor) -> SparsityStats {
    SparsityStats::from_values(x.data().as_slice().expect("tensor data must be contiguous"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::backward;
    use approx::assert_abs_diff_eq;

    fn t(shape: &[usize], data: Vec<f32>, rg: bool) -> Tensor {
        Tensor::from_shape_vec(shape, data, rg).unwrap()
    }

    fn loss() -> SpladeLoss {
        SpladeLoss::new(LossCoefficients {
            lambda_doc: 0.1,
            lambda_query: 0.2,
            temperature: 1.0,
            mse_weight: 0.5,
        })
        .unwrap()
    }

    #[test]
    fn test_rejects_invalid_coefficients() {
        let bad = [
            LossCoefficients { temperature: 0.0, ..Default::default() },
            LossCoefficients { lambda_doc: -1.0, ..Default::default() },
            LossCoefficients { mse_weight: f32::NAN, ..Default::default() },
        ];
        for coefficients in bad {
            assert!(matches!(SpladeLoss::new(coefficients), Err(Error::InvalidConfiguration(_))));
        }
    }

    #[test]
    fn test_total_is_sum_of_terms() {
        let q = t(&[1, 3], vec![1.0, 0.0, 2.0], false);
        let d = t(&[1, 2, 3], vec![1.0, 0.0, 1.0, 0.0, 3.0, 0.0], false);
        let scores = t(&[1, 2], vec![3.0, 0.0], false);
        let teacher = t(&[1, 2], vec![1.0, 0.0], false);
        let out = loss().compute_loss(&scores, Some(&teacher), &q, &d).unwrap();
        let m = out.metrics;

        assert_abs_diff_eq!(m.margin_mse_loss, 4.0, epsilon = 1e-6);
        // FLOPS: 0.1 * mean(2, 3) + 0.2 * 3
        assert_abs_diff_eq!(m.flops_loss, 0.85, epsilon = 1e-6);
        assert_abs_diff_eq!(
            m.loss,
            m.contrastive_loss + m.flops_loss + m.anti_collapse_loss + 0.5 * m.margin_mse_loss,
            epsilon = 1e-5
        );
        assert_abs_diff_eq!(m.query_sparsity, 1.0 / 3.0, epsilon = 1e-9);
        assert_eq!(m.doc_non_zero_count, 3);
        assert_abs_diff_eq!(m.doc_min_non_zero, 1.0);
    }

    #[test]
    fn test_without_teacher_margin_term_is_zero() {
        let q = t(&[1, 2], vec![1.0, 1.0], false);
        let d = t(&[1, 2, 2], vec![1.0, 0.0, 0.0, 1.0], false);
        let scores = t(&[1, 2], vec![1.0, 1.0], false);
        let out = loss().compute_loss(&scores, None, &q, &d).unwrap();
        assert_eq!(out.metrics.margin_mse_loss, 0.0);
    }

    #[test]
    fn test_all_zero_representations_use_sentinels() {
        let q = t(&[2, 3], vec![0.0; 6], false);
        let d = t(&[2, 2, 3], vec![0.0; 12], false);
        let scores = t(&[2, 2], vec![0.0; 4], false);
        let out = loss().compute_loss(&scores, Some(&scores), &q, &d).unwrap();
        assert!(out.metrics.is_finite());
        assert_eq!(out.metrics.query_min_non_zero, 0.0);
        assert_eq!(out.metrics.doc_min_non_zero, 0.0);
        assert_eq!(out.metrics.query_non_zero_count, 0);
        assert_eq!(out.metrics.doc_sparsity, 1.0);
    }

    #[test]
    fn test_rejects_mismatched_shapes() {
        let q = t(&[1, 3], vec![0.0; 3], false);
        let d = t(&[1, 2, 4], vec![0.0; 8], false);
        let scores = t(&[1, 2], vec![0.0; 2], false);
        assert!(matches!(
            loss().compute_loss(&scores, None, &q, &d),
            Err(Error::ShapeMismatch { op: "compute_loss", .. })
        ));

        let d = t(&[1, 2, 3], vec![0.0; 6], false);
        let teacher = t(&[1, 3], vec![0.0; 3], false);
        assert!(loss().compute_loss(&scores, Some(&teacher), &q, &d).is_err());
    }

    #[test]
    fn test_rejects_single_candidate_before_any_term() {
        let q = t(&[2, 3], vec![1.0; 6], false);
        let d = t(&[2, 1, 3], vec![1.0; 6], false);
        let scores = t(&[2, 1], vec![0.5, 0.5], false);
        assert!(matches!(
            loss().compute_loss(&scores, Some(&scores), &q, &d),
            Err(Error::ShapeMismatch { op: "compute_loss", .. })
        ));
    }

    #[test]
    fn test_shared_representation_receives_all_gradient_paths() {
        let q = t(&[1, 2], vec![0.5, 1.0], true);
        let d = t(&[1, 2, 2], vec![1.0, 0.0, 0.0, 1.0], true);
        let scores = crate::splade::score(&q, &d, 1.0).unwrap();
        let mut out = loss().compute_loss(&scores, None, &q, &d).unwrap();
        backward(&mut out.total, None);

        // Contrastive pushes q toward the positive (dim 0) and away from the negative (dim 1);
        // FLOPS and anti-collapse add λ_q·sign(q) - dAC on top.
        let grad = q.grad().unwrap();
        assert!(grad[0] < grad[1]);
        assert!(d.grad().is_some());
    }
}
