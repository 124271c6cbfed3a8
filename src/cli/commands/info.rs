//! Info command implementation

use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{load_config, InfoArgs, ModelVariant, OutputFormat};

pub fn run_info(args: InfoArgs, level: LogLevel) -> Result<(), String> {
    let spec = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;

    match args.format {
        OutputFormat::Text => {
            log(level, LogLevel::Normal, "Configuration Info:");
            println!();
            println!("Variant: {}", spec.model.variant);
            println!(
                "Backbone: vocab={} hidden={}",
                spec.model.vocab_size, spec.model.hidden_size
            );
            if spec.model.variant != ModelVariant::NoTopK {
                println!("Top-K: {}", spec.model.top_k);
            }
            if spec.model.variant == ModelVariant::SparseEmbed {
                println!("Embedding dim: {}", spec.model.embedding_dim);
            }
            println!(
                "Loss: lambda_doc={} lambda_query={} temperature={} mse_weight={}",
                spec.loss.lambda_doc,
                spec.loss.lambda_query,
                spec.loss.temperature,
                spec.loss.mse_weight
            );
            println!(
                "Batch: {} queries x {} documents, seq_len={}",
                spec.data.batch_size,
                spec.data.docs_per_query(),
                spec.data.seq_len
            );
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&spec)
                .map_err(|e| format!("JSON serialization error: {e}"))?;
            println!("{json}");
        }
        OutputFormat::Yaml => {
            let yaml = serde_yaml::to_string(&spec)
                .map_err(|e| format!("YAML serialization error: {e}"))?;
            println!("{yaml}");
        }
    }

    Ok(())
}
