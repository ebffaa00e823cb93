//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::{Cli, CliLogFormat, Command};
use crate::config::{PredictorConfig, MAX_TOP_N};
use crate::tracing_config::{TracingConfig, TracingFormat, TracingOutput};
use anyhow::{Context, Result};
use log::debug;

/// Convert CLI arguments to a `PredictorConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the predictor configuration
    ///
    /// Precedence: CLI flags, then `--config` (or the default config file
    /// when present), then built-in defaults.
    pub(crate) fn from_cli(cli: &Cli) -> Result<PredictorConfig> {
        let mut config = Self::base_config(cli)?;

        if let Some(path) = &cli.primary_model {
            config.primary_model.clone_from(path);
        }
        if cli.no_fallback {
            config.fallback_model = None;
        } else if let Some(path) = &cli.fallback_model {
            config.fallback_model = Some(path.clone());
        }
        if let Some(path) = &cli.labels {
            config.labels.clone_from(path);
        }
        if let Some(backend) = cli.backend {
            config.backend = backend.into();
        }
        if let Some(passes) = cli.tta_passes {
            config.tta_passes = passes;
        }
        if cli.tta_seed.is_some() {
            config.tta_seed = cli.tta_seed;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    fn base_config(cli: &Cli) -> Result<PredictorConfig> {
        if let Some(path) = &cli.config {
            return PredictorConfig::from_file(path)
                .with_context(|| format!("Failed to load config file {}", path.display()));
        }

        match PredictorConfig::default_path() {
            Some(path) if path.is_file() => {
                debug!("Using config file {}", path.display());
                PredictorConfig::from_file(&path)
                    .with_context(|| format!("Failed to load config file {}", path.display()))
            },
            _ => Ok(PredictorConfig::default()),
        }
    }

    /// Build the tracing configuration from `-v`, `--log-format` and `--log-file`
    ///
    /// Formats and outputs whose feature is not compiled in are rejected.
    pub(crate) fn tracing_config(cli: &Cli) -> Result<TracingConfig> {
        let format = match cli.log_format {
            CliLogFormat::Console => TracingFormat::Console,
            CliLogFormat::Compact => TracingFormat::Compact,
            #[cfg(feature = "tracing-json")]
            CliLogFormat::Json => TracingFormat::Json,
            #[cfg(not(feature = "tracing-json"))]
            CliLogFormat::Json => {
                anyhow::bail!("--log-format json requires building with --features tracing-json")
            },
        };

        let output = match &cli.log_file {
            None => TracingOutput::Console,
            #[cfg(feature = "tracing-files")]
            Some(path) => TracingOutput::File(path.clone()),
            #[cfg(not(feature = "tracing-files"))]
            Some(_) => {
                anyhow::bail!("--log-file requires building with --features tracing-files")
            },
        };

        Ok(TracingConfig::new()
            .with_verbosity(cli.verbose)
            .with_format(format)
            .with_output(output))
    }

    /// Validate argument combinations clap cannot express
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        let top_n = match &cli.command {
            Command::Predict { top_n, .. } | Command::Batch { top_n, .. } => Some(*top_n),
            Command::Health | Command::Info => None,
        };
        if let Some(top_n) = top_n {
            if top_n == 0 || top_n > MAX_TOP_N {
                anyhow::bail!("--top-n must be between 1 and {MAX_TOP_N}, got {top_n}");
            }
        }

        if let Command::Batch {
            pattern: Some(pattern),
            ..
        } = &cli.command
        {
            glob::Pattern::new(pattern)
                .with_context(|| format!("Invalid file pattern '{pattern}'"))?;
        }

        Ok(())
    }
}
