//! Step command implementation
//!
//! Builds a [`LookupBackbone`] from the configuration, draws a seeded synthetic
//! batch and runs one training step (or, for `sparse_embed`, one encoding pass).

use crate::autograd::{Context, Tensor};
use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{apply_overrides, load_config, ModelVariant, OutputFormat, SpladeSpec, StepArgs};
use crate::error::Result;
use crate::splade::{AttentionMask, LookupBackbone, SparseEmbedModel, SpladeModel, TokenBatch};
use crate::trace::TRACER;
use crate::train::{train_step, SparsityStats, SpladeLoss, TrainBatch};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

/// Token id used for padding positions
const PAD_ID: u32 = 0;

/// Draw `rows` sequences of random length in `1..=seq_len`, right-padded
fn random_tokens(rng: &mut StdRng, rows: usize, seq_len: usize, vocab_size: usize) -> Result<TokenBatch> {
    let lengths: Vec<usize> = (0..rows).map(|_| rng.random_range(1..=seq_len)).collect();
    let mut input_ids = Vec::with_capacity(rows * seq_len);
    for &len in &lengths {
        input_ids.extend((0..len).map(|_| rng.random_range(1..vocab_size.max(2)) as u32));
        input_ids.extend(std::iter::repeat_n(PAD_ID, seq_len - len));
    }
    TokenBatch::new(input_ids, AttentionMask::from_lengths(&lengths, seq_len)?)
}

/// A seeded synthetic training batch with teacher scores `[B, M]`
///
/// Teacher scores rank the positive (column 0) above every negative.
pub fn synthetic_batch(spec: &SpladeSpec) -> Result<(TrainBatch, Tensor)> {
    let mut rng = StdRng::seed_from_u64(spec.data.seed);
    let batch = spec.data.batch_size;
    let group = spec.data.docs_per_query();
    let (seq_len, vocab) = (spec.data.seq_len, spec.model.vocab_size);

    let queries = random_tokens(&mut rng, batch, seq_len, vocab)?;
    let docs = random_tokens(&mut rng, batch * group, seq_len, vocab)?;

    let teacher: Vec<f32> = (0..batch * group)
        .map(|i| {
            let noise: f32 = rng.random();
            if i % group == 0 {
                1.0 + noise
            } else {
                noise
            }
        })
        .collect();
    let teacher = Tensor::from_shape_vec(&[batch, group], teacher, false)?;

    Ok((TrainBatch::new(queries, docs, group)?, teacher))
}

/// Run the configured variant once and collect its metrics record
pub fn run_once(spec: &SpladeSpec) -> Result<BTreeMap<String, f64>> {
    let model_spec = &spec.model;
    let backbone = LookupBackbone::new(model_spec.vocab_size, model_spec.hidden_size)?;
    let (batch, teacher) = synthetic_batch(spec)?;

    match model_spec.variant {
        ModelVariant::Splade | ModelVariant::NoTopK => {
            let top_k = (model_spec.variant == ModelVariant::Splade).then_some(model_spec.top_k);
            let model = SpladeModel::new(backbone, top_k)?;
            let loss = SpladeLoss::new(spec.loss.into())?;
            let metrics = train_step(&model, &batch, &loss, Some(&teacher), &Context::new())?;
            Ok(metrics.to_map())
        }
        ModelVariant::SparseEmbed => {
            let model =
                SparseEmbedModel::new(backbone, model_spec.top_k, model_spec.embedding_dim)?;
            let out = model.forward(&batch.queries, &Context::inference())?;
            let stats = SparsityStats::from_values(&out.sparse_activations.data().to_vec());
            let norm = out.embeddings.data().mapv(|x| x * x).sum().sqrt();

            let mut record = BTreeMap::new();
            record.insert("query_sparsity".to_string(), stats.sparsity);
            record.insert("query_min_non_zero".to_string(), stats.min_non_zero);
            record.insert("query_non_zero_count".to_string(), stats.non_zero_count as f64);
            record.insert("selected_terms".to_string(), out.top_indices.len() as f64);
            record.insert("embedding_norm".to_string(), f64::from(norm));
            Ok(record)
        }
    }
}

pub fn run_step(args: StepArgs, level: LogLevel) -> std::result::Result<(), String> {
    let mut spec = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;
    apply_overrides(&mut spec, &args);

    log(
        level,
        LogLevel::Normal,
        &format!(
            "Running one {} step: {} queries x {} documents (seed {})",
            spec.model.variant,
            spec.data.batch_size,
            spec.data.docs_per_query(),
            spec.data.seed
        ),
    );

    log(
        level,
        LogLevel::Verbose,
        &format!(
            "Backbone: vocab={} hidden={}; loss: lambda_doc={} lambda_query={} temperature={} mse_weight={}",
            spec.model.vocab_size,
            spec.model.hidden_size,
            spec.loss.lambda_doc,
            spec.loss.lambda_query,
            spec.loss.temperature,
            spec.loss.mse_weight
        ),
    );

    if args.trace {
        TRACER.clear();
        TRACER.enable();
    }
    let result = run_once(&spec);
    if args.trace {
        TRACER.disable();
    }
    let record = result.map_err(|e| format!("Step failed: {e}"))?;

    match args.format {
        OutputFormat::Text => {
            log(level, LogLevel::Normal, "Metrics:");
            for (name, value) in &record {
                println!("  {name}: {value:.6}");
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&record)
                .map_err(|e| format!("JSON serialization error: {e}"))?;
            println!("{json}");
        }
        OutputFormat::Yaml => {
            let yaml = serde_yaml::to_string(&record)
                .map_err(|e| format!("YAML serialization error: {e}"))?;
            println!("{yaml}");
        }
    }

    if args.trace {
        println!("{}", TRACER.report());
    }

    Ok(())
}
