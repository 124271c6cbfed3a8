//! CLI argument parsing
//!
//! # Usage
//!
//! ```bash
//! esparcir validate splade.yaml --detailed
//! esparcir info splade.yaml --format json
//! esparcir step splade.yaml --trace
//! esparcir step splade.yaml --format json --seed 7
//! ```

mod core;
mod types;

pub use core::{apply_overrides, parse_args, Cli, Command, InfoArgs, StepArgs, ValidateArgs};
pub use types::OutputFormat;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_validate_command() {
        let cli = parse_args(["esparcir", "validate", "config.yaml"]).unwrap();
        match cli.command {
            Command::Validate(args) => {
                assert_eq!(args.config, PathBuf::from("config.yaml"));
                assert!(!args.detailed);
            }
            _ => panic!("Expected Validate command"),
        }
    }

    #[test]
    fn test_parse_validate_detailed() {
        let cli = parse_args(["esparcir", "validate", "config.yaml", "--detailed"]).unwrap();
        match cli.command {
            Command::Validate(args) => assert!(args.detailed),
            _ => panic!("Expected Validate command"),
        }
    }

    #[test]
    fn test_parse_info_json_format() {
        let cli = parse_args(["esparcir", "info", "config.yaml", "--format", "json"]).unwrap();
        match cli.command {
            Command::Info(args) => assert_eq!(args.format, OutputFormat::Json),
            _ => panic!("Expected Info command"),
        }
    }

    #[test]
    fn test_parse_step_defaults() {
        let cli = parse_args(["esparcir", "step", "config.yaml"]).unwrap();
        match cli.command {
            Command::Step(args) => {
                assert_eq!(args.config, PathBuf::from("config.yaml"));
                assert_eq!(args.format, OutputFormat::Text);
                assert!(!args.trace);
                assert_eq!(args.seed, None);
            }
            _ => panic!("Expected Step command"),
        }
    }

    #[test]
    fn test_parse_step_with_options() {
        let cli = parse_args([
            "esparcir",
            "step",
            "config.yaml",
            "--format",
            "yaml",
            "--trace",
            "--seed",
            "7",
        ])
        .unwrap();
        match cli.command {
            Command::Step(args) => {
                assert_eq!(args.format, OutputFormat::Yaml);
                assert!(args.trace);
                assert_eq!(args.seed, Some(7));
            }
            _ => panic!("Expected Step command"),
        }
    }

    #[test]
    fn test_apply_overrides_seed() {
        let mut spec = crate::config::SpladeSpec {
            model: crate::config::ModelSpec::default(),
            loss: Default::default(),
            data: Default::default(),
        };
        let args = StepArgs {
            config: PathBuf::from("config.yaml"),
            format: OutputFormat::Text,
            trace: false,
            seed: Some(1234),
        };
        apply_overrides(&mut spec, &args);
        assert_eq!(spec.data.seed, 1234);
    }

    #[test]
    fn test_global_flags() {
        let cli = parse_args(["esparcir", "-v", "info", "config.yaml"]).unwrap();
        assert!(cli.verbose && !cli.quiet);

        let cli = parse_args(["esparcir", "--quiet", "step", "config.yaml"]).unwrap();
        assert!(!cli.verbose && cli.quiet);
    }

    #[test]
    fn test_missing_config_file() {
        assert!(parse_args(["esparcir", "step"]).is_err());
    }

    #[test]
    fn test_unknown_command() {
        assert!(parse_args(["esparcir", "train"]).is_err());
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(parse_args(["esparcir", "info", "config.yaml", "--format", "toml"]).is_err());
        assert!("JSON".parse::<OutputFormat>().is_ok());
    }
}
