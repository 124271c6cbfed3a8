//! End-to-end tests of the sparse retrieval pipeline
//!
//! Exercises the public entry points together: activation, top-K, scoring,
//! the composite loss and the training step.

use esparcir::autograd::{backward, Context};
use esparcir::splade::{
    compute_activation, score, select_top_k, AttentionMask, LookupBackbone, SparseEmbedModel,
    SpladeModel, TokenBatch, TopK, TopKMode,
};
use esparcir::train::{
    train_step, AntiCollapseLoss, FlopsLoss, LossCoefficients, RepresentationRegularizer,
    SpladeLoss, TrainBatch,
};
use esparcir::{Error, Tensor};
use proptest::prelude::*;

fn tensor(shape: &[usize], data: Vec<f32>) -> Tensor {
    Tensor::from_shape_vec(shape, data, false).expect("shape covers data")
}

/// `rows` right-padded sequences with deterministic ids below `vocab`
fn tokens(lengths: &[usize], seq_len: usize, vocab: u32) -> TokenBatch {
    let mut ids = Vec::new();
    for (row, &len) in lengths.iter().enumerate() {
        for t in 0..seq_len {
            let id = if t < len { 1 + (row as u32 * 7919 + t as u32 * 104_729) % (vocab - 1) } else { 0 };
            ids.push(id);
        }
    }
    let mask = AttentionMask::from_lengths(lengths, seq_len).expect("lengths fit seq_len");
    TokenBatch::new(ids, mask).expect("ids cover the mask")
}

// =============================================================================
// Full-vocabulary scenario
// =============================================================================

#[test]
fn test_full_vocabulary_training_step() {
    const VOCAB: usize = 30522;
    let model = SpladeModel::new(LookupBackbone::new(VOCAB, 8).unwrap(), Some(64)).unwrap();
    let batch = TrainBatch::new(
        tokens(&[4, 3], 4, VOCAB as u32),
        tokens(&[4, 2, 3, 4, 1, 2], 4, VOCAB as u32),
        3,
    )
    .unwrap();
    let teacher = tensor(&[2, 3], vec![2.0, 0.5, 0.1, 1.5, 1.0, -0.5]);
    let loss = SpladeLoss::new(LossCoefficients::default()).unwrap();

    let metrics = train_step(&model, &batch, &loss, Some(&teacher), &Context::new()).unwrap();

    assert!(metrics.is_finite());
    assert!(metrics.loss > 0.0);
    assert!((0.0..=1.0).contains(&metrics.query_sparsity));
    assert!((0.0..=1.0).contains(&metrics.doc_sparsity));
    assert!(model.parameters().iter().any(|p| p.grad().is_some()));
}

#[test]
fn test_full_vocabulary_score_shape() {
    const VOCAB: usize = 30522;
    let model = SpladeModel::new(LookupBackbone::new(VOCAB, 8).unwrap(), Some(64)).unwrap();
    let ctx = Context::inference();
    let query = model.forward(&tokens(&[3, 4], 4, VOCAB as u32), &ctx).unwrap().activations;
    let docs = model.forward(&tokens(&[4, 4, 2, 3, 1, 4], 4, VOCAB as u32), &ctx).unwrap().activations;

    let docs = docs.reshape(&[2, 3, VOCAB]).unwrap();
    let scores = score(&query, &docs, 1.0).unwrap();
    assert_eq!(scores.shape(), &[2, 3]);
    assert!(scores.data().iter().all(|s| s.is_finite()));
}

// =============================================================================
// Loss properties
// =============================================================================

#[test]
fn test_loss_invariant_to_permuted_negatives() {
    let loss = SpladeLoss::new(LossCoefficients { lambda_doc: 0.01, lambda_query: 0.02, ..Default::default() })
        .unwrap();
    let query = tensor(&[1, 4], vec![0.5, 0.0, 1.0, 0.0]);
    let docs = tensor(&[1, 3, 4], vec![1.0, 0.0, 2.0, 0.0, 0.0, 3.0, 0.0, 0.0, 0.5, 0.5, 0.0, 1.0]);
    let scores = tensor(&[1, 3], vec![2.5, 0.0, 0.25]);
    let teacher = tensor(&[1, 3], vec![3.0, 1.0, 0.5]);

    // Swap negatives 1 and 2 on every input
    let docs_p = tensor(&[1, 3, 4], vec![1.0, 0.0, 2.0, 0.0, 0.5, 0.5, 0.0, 1.0, 0.0, 3.0, 0.0, 0.0]);
    let scores_p = tensor(&[1, 3], vec![2.5, 0.25, 0.0]);
    let teacher_p = tensor(&[1, 3], vec![3.0, 0.5, 1.0]);

    let a = loss.compute_loss(&scores, Some(&teacher), &query, &docs).unwrap();
    let b = loss.compute_loss(&scores_p, Some(&teacher_p), &query, &docs_p).unwrap();
    assert!((a.total.item() - b.total.item()).abs() < 1e-5);
    assert_eq!(a.metrics.doc_non_zero_count, b.metrics.doc_non_zero_count);
}

#[test]
fn test_margin_term_vanishes_for_matching_margins() {
    let loss = SpladeLoss::new(LossCoefficients::default()).unwrap();
    let query = tensor(&[1, 2], vec![1.0, 0.0]);
    let docs = tensor(&[1, 2, 2], vec![1.0, 0.0, 0.0, 1.0]);
    let scores = tensor(&[1, 2], vec![1.0, 0.0]);
    // Same margin, shifted by a constant
    let teacher = tensor(&[1, 2], vec![11.0, 10.0]);
    let out = loss.compute_loss(&scores, Some(&teacher), &query, &docs).unwrap();
    assert!(out.metrics.margin_mse_loss.abs() < 1e-9);
}

#[test]
fn test_anti_collapse_grows_as_mass_vanishes() {
    let term = |mass: f32| {
        let x = tensor(&[1, 2], vec![mass / 2.0, mass / 2.0]);
        AntiCollapseLoss::default().forward(&x, &x).item()
    };
    assert!(term(1e-6) >= 10.0 * term(1.0));
    assert!(term(0.0).is_finite());
}

#[test]
fn test_flops_scales_linearly_with_magnitude() {
    let flops = FlopsLoss::new(0.5, 0.25);
    let query = tensor(&[1, 3], vec![0.0, 0.0, 0.0]);
    let small = tensor(&[1, 1, 3], vec![0.0, 2.0, 0.0]);
    let large = tensor(&[1, 1, 3], vec![0.0, 6.0, 0.0]);

    // 0.5 * |2| and 0.5 * |6|
    assert!((flops.forward(&query, &small).item() - 1.0).abs() < 1e-6);
    assert!((flops.forward(&query, &large).item() - 3.0).abs() < 1e-6);
}

#[test]
fn test_all_zero_representations_use_sentinels() {
    let loss = SpladeLoss::new(LossCoefficients::default()).unwrap();
    let query = tensor(&[1, 3], vec![0.0; 3]);
    let docs = tensor(&[1, 2, 3], vec![0.0; 6]);
    let scores = tensor(&[1, 2], vec![0.0, 0.0]);

    let out = loss.compute_loss(&scores, None, &query, &docs).unwrap();
    assert!(out.metrics.is_finite());
    assert_eq!(out.metrics.query_min_non_zero, 0.0);
    assert_eq!(out.metrics.doc_min_non_zero, 0.0);
    assert_eq!(out.metrics.query_sparsity, 1.0);
    assert_eq!(out.metrics.doc_non_zero_count, 0);
}

// =============================================================================
// Error taxonomy
// =============================================================================

#[test]
fn test_configuration_errors_fail_before_forward() {
    let backbone = || LookupBackbone::new(16, 4).unwrap();
    assert!(matches!(SpladeModel::new(backbone(), Some(0)), Err(Error::InvalidConfiguration(_))));
    assert!(matches!(SpladeModel::new(backbone(), Some(17)), Err(Error::InvalidConfiguration(_))));
    assert!(matches!(SparseEmbedModel::new(backbone(), 4, 0), Err(Error::InvalidConfiguration(_))));
    assert!(matches!(
        SpladeLoss::new(LossCoefficients { temperature: 0.0, ..Default::default() }),
        Err(Error::InvalidConfiguration(_))
    ));
}

#[test]
fn test_shape_errors_propagate() {
    let logits = tensor(&[1, 2, 3], vec![0.0; 6]);
    let mask = AttentionMask::all(1, 3).unwrap();
    assert!(matches!(compute_activation(&logits, &mask), Err(Error::ShapeMismatch { .. })));

    let query = tensor(&[2, 3], vec![0.0; 6]);
    let docs = tensor(&[2, 2, 4], vec![0.0; 16]);
    assert!(score(&query, &docs, 1.0).is_err());
}

// =============================================================================
// Sparse embeddings and gradients
// =============================================================================

#[test]
fn test_sparse_embed_gradients_reach_projection() {
    let model = SparseEmbedModel::new(LookupBackbone::new(40, 6).unwrap(), 5, 3).unwrap();
    let out = model.forward(&tokens(&[3, 2], 4, 40), &Context::new()).unwrap();
    assert_eq!(out.embeddings.shape(), &[2, 5, 3]);

    let mut total = esparcir::autograd::sum(&out.embeddings);
    backward(&mut total, None);
    assert!(model.aggregator().parameters().iter().all(|p| p.grad().is_some()));
}

// =============================================================================
// Property tests
// =============================================================================

fn logits_and_lengths() -> impl Strategy<Value = (Vec<f32>, Vec<usize>)> {
    // B = 2, T = 4, V = 6
    (proptest::collection::vec(-5.0f32..5.0, 48), proptest::collection::vec(0usize..=4, 2))
}

/// M candidates, student and teacher scores, query `[1, 4]`, docs `[1, M, 4]`
/// and a shuffled order of the negatives `1..M`
#[allow(clippy::type_complexity)]
fn candidate_group() -> impl Strategy<Value = (usize, Vec<f32>, Vec<f32>, Vec<f32>, Vec<f32>, Vec<usize>)> {
    (3usize..=6).prop_flat_map(|m| {
        (
            Just(m),
            proptest::collection::vec(-4.0f32..4.0, m),
            proptest::collection::vec(-4.0f32..4.0, m),
            proptest::collection::vec(0.0f32..2.0, 4),
            proptest::collection::vec(0.0f32..2.0, m * 4),
            Just((1..m).collect::<Vec<usize>>()).prop_shuffle(),
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_loss_invariant_to_negative_order(
        (m, scores, teacher, query, docs, negatives) in candidate_group()
    ) {
        let loss = SpladeLoss::new(LossCoefficients { lambda_doc: 0.05, lambda_query: 0.02, ..Default::default() })
            .unwrap();
        let order: Vec<usize> = std::iter::once(0).chain(negatives).collect();
        let permute = |v: &[f32], width: usize| -> Vec<f32> {
            order.iter().flat_map(|&j| v[j * width..(j + 1) * width].to_vec()).collect()
        };

        let query = tensor(&[1, 4], query);
        let a = loss
            .compute_loss(
                &tensor(&[1, m], scores.clone()),
                Some(&tensor(&[1, m], teacher.clone())),
                &query,
                &tensor(&[1, m, 4], docs.clone()),
            )
            .unwrap();
        let b = loss
            .compute_loss(
                &tensor(&[1, m], permute(&scores, 1)),
                Some(&tensor(&[1, m], permute(&teacher, 1))),
                &query,
                &tensor(&[1, m, 4], permute(&docs, 4)),
            )
            .unwrap();

        let (ta, tb) = (a.total.item(), b.total.item());
        prop_assert!((ta - tb).abs() <= 1e-4 * (1.0 + ta.abs()), "total {} vs {}", ta, tb);
        let (ma, mb) = (a.metrics.to_map(), b.metrics.to_map());
        prop_assert_eq!(ma.len(), mb.len());
        for (name, x) in &ma {
            let y = mb[name];
            prop_assert!((x - y).abs() <= 1e-4 * (1.0 + x.abs()), "{}: {} vs {}", name, x, y);
        }
    }

    #[test]
    fn prop_activation_non_negative_and_padding_zero((logits, lengths) in logits_and_lengths()) {
        let logits = tensor(&[2, 4, 6], logits);
        let mask = AttentionMask::from_lengths(&lengths, 4).unwrap();
        let acts = compute_activation(&logits, &mask).unwrap();
        prop_assert!(acts.data().iter().all(|&v| v >= 0.0));
        for (b, &len) in lengths.iter().enumerate() {
            if len == 0 {
                prop_assert!(acts.data().iter().skip(b * 6).take(6).all(|&v| v == 0.0));
            }
        }
    }

    #[test]
    fn prop_threshold_keeps_at_least_k(values in proptest::collection::vec(0.0f32..3.0, 12), k in 1usize..=6) {
        let acts = tensor(&[2, 6], values);
        let top_k = TopK::new(k, 6).unwrap();
        let masked = select_top_k(&acts, &top_k, TopKMode::Threshold).unwrap();
        let out = masked.values().data();
        for b in 0..2 {
            let row = &acts.data().as_slice().unwrap()[b * 6..(b + 1) * 6];
            let mut sorted = row.to_vec();
            sorted.sort_by(|x, y| y.total_cmp(x));
            let threshold = sorted[k - 1];
            let kept = (0..6).filter(|&v| out[b * 6 + v] == row[v] && row[v] >= threshold).count();
            prop_assert!(kept >= k);
        }
    }
}
