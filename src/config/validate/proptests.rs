//! Property-based tests for configuration validation

use super::error::ValidationError;
use super::validator::validate_config;
use crate::config::schema::*;
use proptest::prelude::*;

fn arb_valid_spec() -> impl Strategy<Value = SpladeSpec> {
    (
        1usize..50_000,    // vocab_size
        1usize..512,       // max_length
        0.0f32..1.0,       // lambda_doc
        1e-3f32..10.0,     // temperature
        1usize..64,        // batch_size
    )
        .prop_flat_map(|(vocab_size, max_length, lambda_doc, temperature, batch_size)| {
            (1..=vocab_size, 1..=max_length).prop_map(move |(top_k, seq_len)| SpladeSpec {
                model: ModelSpec { vocab_size, top_k, max_length, ..Default::default() },
                loss: LossSpec { lambda_doc, temperature, ..Default::default() },
                data: DataSpec { batch_size, seq_len, ..Default::default() },
            })
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_valid_spec_passes(spec in arb_valid_spec()) {
        prop_assert!(validate_config(&spec).is_ok());
    }

    #[test]
    fn prop_top_k_above_vocab_fails(spec in arb_valid_spec(), extra in 1usize..100) {
        let mut spec = spec;
        spec.model.top_k = spec.model.vocab_size + extra;
        prop_assert!(
            matches!(validate_config(&spec), Err(ValidationError::InvalidTopK { .. })),
            "top_k above the vocabulary must be rejected"
        );
    }

    #[test]
    fn prop_non_positive_temperature_fails(spec in arb_valid_spec(), t in -10.0f32..=0.0) {
        let mut spec = spec;
        spec.loss.temperature = t;
        prop_assert!(
            matches!(validate_config(&spec), Err(ValidationError::InvalidTemperature(_))),
            "temperature must be positive"
        );
    }

    #[test]
    fn prop_yaml_roundtrip_preserves_validity(spec in arb_valid_spec()) {
        let yaml = serde_yaml::to_string(&spec).unwrap();
        let parsed: SpladeSpec = serde_yaml::from_str(&yaml).unwrap();
        prop_assert_eq!(&parsed.model, &spec.model);
        prop_assert!(validate_config(&parsed).is_ok());
    }
}
