//! Validate command implementation

use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{load_config, SpladeSpec, ValidateArgs};

/// Format model information as a string
pub fn format_model_info(spec: &SpladeSpec) -> String {
    let model = &spec.model;
    let mut lines = vec![
        format!("  Variant: {}", model.variant),
        format!("  Vocabulary size: {}", model.vocab_size),
        format!("  Hidden size: {}", model.hidden_size),
    ];
    match model.variant {
        crate::config::ModelVariant::Splade => {
            lines.push(format!("  Top-K: {} (threshold)", model.top_k));
        }
        crate::config::ModelVariant::NoTopK => {}
        crate::config::ModelVariant::SparseEmbed => {
            lines.push(format!("  Top-K: {} (selection)", model.top_k));
            lines.push(format!("  Embedding dim: {}", model.embedding_dim));
        }
    }
    lines.push(format!("  Max length: {}", model.max_length));
    lines.join("\n")
}

/// Format loss weights as a string
pub fn format_loss_info(spec: &SpladeSpec) -> String {
    let loss = &spec.loss;
    [
        format!("  FLOPS lambda (doc): {}", loss.lambda_doc),
        format!("  FLOPS lambda (query): {}", loss.lambda_query),
        format!("  Temperature: {}", loss.temperature),
        format!("  Margin-MSE weight: {}", loss.mse_weight),
    ]
    .join("\n")
}

/// Format data configuration as a string
pub fn format_data_info(spec: &SpladeSpec) -> String {
    let data = &spec.data;
    [
        format!("  Batch size: {}", data.batch_size),
        format!(
            "  Documents per query: {} (1 positive + {} negatives)",
            data.docs_per_query(),
            data.num_negatives
        ),
        format!("  Sequence length: {}", data.seq_len),
        format!("  Seed: {}", data.seed),
    ]
    .join("\n")
}

/// Print detailed configuration summary
pub fn print_detailed_summary(spec: &SpladeSpec) {
    println!();
    println!("Configuration Summary:");
    println!("{}", format_model_info(spec));
    println!();
    println!("{}", format_loss_info(spec));
    println!();
    println!("{}", format_data_info(spec));
}

pub fn run_validate(args: ValidateArgs, level: LogLevel) -> Result<(), String> {
    log(
        level,
        LogLevel::Normal,
        &format!("Validating config: {}", args.config.display()),
    );

    let spec = load_config(&args.config).map_err(|e| format!("Validation failed: {e}"))?;

    log(level, LogLevel::Normal, "Configuration is valid");

    if args.detailed && level != LogLevel::Quiet {
        print_detailed_summary(&spec);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DataSpec, LossSpec, ModelSpec, ModelVariant};

    fn make_test_spec(variant: ModelVariant) -> SpladeSpec {
        SpladeSpec {
            model: ModelSpec { variant, vocab_size: 5000, top_k: 32, ..Default::default() },
            loss: LossSpec { lambda_doc: 0.002, ..Default::default() },
            data: DataSpec { num_negatives: 3, ..Default::default() },
        }
    }

    #[test]
    fn test_format_model_info_sparse_embed() {
        let info = format_model_info(&make_test_spec(ModelVariant::SparseEmbed));
        assert!(info.contains("sparse_embed"));
        assert!(info.contains("5000"));
        assert!(info.contains("Top-K: 32 (selection)"));
        assert!(info.contains("Embedding dim: 128"));
    }

    #[test]
    fn test_format_model_info_no_top_k() {
        let info = format_model_info(&make_test_spec(ModelVariant::NoTopK));
        assert!(!info.contains("Top-K"));
        assert!(!info.contains("Embedding dim"));
    }

    #[test]
    fn test_format_loss_info() {
        let info = format_loss_info(&make_test_spec(ModelVariant::Splade));
        assert!(info.contains("0.002"));
        assert!(info.contains("Temperature: 1"));
    }

    #[test]
    fn test_format_data_info() {
        let info = format_data_info(&make_test_spec(ModelVariant::Splade));
        assert!(info.contains("Documents per query: 4 (1 positive + 3 negatives)"));
        assert!(info.contains("Seed: 42"));
    }
}
