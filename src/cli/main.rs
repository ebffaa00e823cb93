//! Plant disease prediction CLI
//!
//! Every subcommand prints the same JSON envelope the request layer returns.

use super::config::CliConfigBuilder;
use crate::{
    api::{handle_health, handle_model_info, ApiResponse},
    config::{BackendType, BatchOptions, PredictOptions, MAX_BATCH_SIZE},
    error::CropDxError,
    inference::DefaultBackendFactory,
    processor::{BatchInput, Predictor},
    services::ImageIOService,
    session::SharedPredictor,
    tracing_config::{events, init_cli_tracing, spans},
    types::{BatchItemResult, BatchResponse, PredictionResponse},
    utils::PathValidator,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use instant::Instant;
use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Instrument;

/// Plant disease classification CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "cropdx")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// JSON config file [default: <config_dir>/cropdx/config.json if present]
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Primary (TTA-capable) model artifact
    #[arg(long, global = true, value_name = "PATH")]
    pub primary_model: Option<PathBuf>,

    /// Fallback model artifact
    #[arg(long, global = true, value_name = "PATH")]
    pub fallback_model: Option<PathBuf>,

    /// Disable the fallback model
    #[arg(long, global = true, conflicts_with = "fallback_model")]
    pub no_fallback: bool,

    /// Class label file, one label per line in model output order
    #[arg(long, global = true, value_name = "PATH")]
    pub labels: Option<PathBuf>,

    /// Inference backend
    #[arg(long, global = true, value_enum)]
    pub backend: Option<CliBackend>,

    /// Number of TTA passes (1-20)
    #[arg(long, global = true)]
    pub tta_passes: Option<usize>,

    /// Seed for reproducible TTA perturbations
    #[arg(long, global = true)]
    pub tta_seed: Option<u64>,

    /// Enable verbose logging (-v: INFO, -vv: DEBUG, -vvv: TRACE)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log output format (json requires the tracing-json feature)
    #[arg(long, global = true, value_enum, default_value_t = CliLogFormat::Console)]
    pub log_format: CliLogFormat,

    /// Write logs to this file instead of stderr (requires the tracing-files feature)
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Classify one image (use "-" to read from stdin)
    Predict {
        #[arg(value_name = "INPUT")]
        input: String,

        /// Filename reported for stdin input
        #[arg(long, default_value = "stdin.jpg")]
        filename: String,

        /// Run a single pass instead of test-time augmentation
        #[arg(long)]
        no_tta: bool,

        /// Number of ranked classes (1-10)
        #[arg(long, default_value_t = 5)]
        top_n: usize,

        /// Keep the base64 preview in the output
        #[arg(long)]
        include_preview: bool,
    },

    /// Classify up to 10 images; directories are expanded
    Batch {
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,

        /// Run test-time augmentation on every image
        #[arg(long)]
        tta: bool,

        /// Number of ranked classes per image (1-10)
        #[arg(long, default_value_t = 3)]
        top_n: usize,

        /// Scan directories recursively
        #[arg(short, long)]
        recursive: bool,

        /// Filename pattern for directory scans (e.g., "*.jpg")
        #[arg(long)]
        pattern: Option<String>,

        /// Keep the base64 thumbnails in the output
        #[arg(long)]
        include_preview: bool,
    },

    /// Report predictor availability
    Health,

    /// Describe the loaded model
    Info,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliBackend {
    Tract,
    Onnx,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliLogFormat {
    /// Colored human-readable output
    Console,
    /// Plain output without colors
    Compact,
    /// One JSON object per event
    Json,
}

impl From<CliBackend> for BackendType {
    fn from(backend: CliBackend) -> Self {
        match backend {
            CliBackend::Tract => Self::Tract,
            CliBackend::Onnx => Self::Onnx,
        }
    }
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    let tracing_config = CliConfigBuilder::tracing_config(&cli)?;
    let _tracing_guard = init_cli_tracing(tracing_config).context("Failed to initialize tracing")?;

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;

    let load_start = Instant::now();
    let loading_span = spans::model_loading(&config.primary_model, &config.backend.to_string());
    let shared = SharedPredictor::new(config, Arc::new(DefaultBackendFactory));
    let predictor = shared.get().instrument(loading_span).await;
    events::performance_metric("model_loading", load_start.elapsed().as_millis() as u64);

    let status = match cli.command {
        Command::Predict {
            input,
            filename,
            no_tta,
            top_n,
            include_preview,
        } => {
            let options = PredictOptions {
                use_tta: !no_tta,
                top_n,
                ..PredictOptions::default()
            };
            run_predict(predictor, &input, filename, options, include_preview).await?
        },
        Command::Batch {
            inputs,
            tta,
            top_n,
            recursive,
            pattern,
            include_preview,
        } => {
            let files = expand_inputs(&inputs, recursive, pattern.as_deref())?;
            let options = BatchOptions { use_tta: tta, top_n };
            run_batch(predictor, files, options, include_preview).await?
        },
        Command::Health => print_envelope(&handle_health(Some(predictor.as_ref())))?,
        Command::Info => print_envelope(&handle_model_info(&predictor))?,
    };

    if status >= 400 {
        anyhow::bail!("Request failed with status {status}");
    }
    Ok(())
}

async fn run_predict(
    predictor: Arc<Predictor>,
    input: &str,
    stdin_filename: String,
    options: PredictOptions,
    include_preview: bool,
) -> Result<u16> {
    let (bytes, filename) = if input == "-" {
        let bytes = ImageIOService::read_all(tokio::io::stdin())
            .await
            .context("Failed to read image from stdin")?;
        (bytes, stdin_filename)
    } else {
        ImageIOService::load_file(input).with_context(|| format!("Failed to read {input}"))?
    };

    let span = spans::prediction(Path::new(input), options.use_tta);
    let result = tokio::task::spawn_blocking(move || {
        let _entered = span.entered();
        predictor.predict_bytes(&bytes, &filename, &options)
    })
    .await
    .context("Prediction task failed")?;

    let mut response: ApiResponse<PredictionResponse> = result.into();
    if let (Some(data), false) = (response.data.as_mut(), include_preview) {
        data.original_image.clear();
    }
    if let Some(error) = &response.error {
        info!("Prediction failed: {error}");
    }
    print_envelope(&response)
}

async fn run_batch(
    predictor: Arc<Predictor>,
    files: Vec<PathBuf>,
    options: BatchOptions,
    include_preview: bool,
) -> Result<u16> {
    if files.len() > MAX_BATCH_SIZE {
        let error = CropDxError::BatchTooLarge {
            size: files.len(),
            max: MAX_BATCH_SIZE,
        };
        return print_envelope(&ApiResponse::<BatchResponse>::from_error(&error));
    }

    let items: Vec<BatchInput> = files
        .iter()
        .map(|path| {
            let display_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            match ImageIOService::load_file(path) {
                Ok((bytes, filename)) => BatchInput::new(filename, bytes),
                Err(e) => {
                    events::error_with_context(&e, &path.display().to_string());
                    BatchInput::rejected(display_name, e)
                },
            }
        })
        .collect();

    events::progress(&format!("Classifying {} images", items.len()));
    let progress = ProgressBar::new(items.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("#>-"),
    );

    let span = spans::batch_processing(items.len());
    let bar = progress.clone();
    let result = tokio::task::spawn_blocking(move || {
        let _entered = span.entered();
        predictor.predict_batch_with_progress(items, &options, |item| {
            bar.inc(1);
            if let BatchItemResult::Failure { filename, .. } = item {
                bar.set_message(format!("failed: {filename}"));
            }
        })
    })
    .await
    .context("Batch task failed")?;
    progress.finish_and_clear();

    let mut response: ApiResponse<BatchResponse> = result.into();
    if let (Some(data), false) = (response.data.as_mut(), include_preview) {
        for item in &mut data.results {
            if let BatchItemResult::Success { prediction, .. } = item {
                prediction.original_image.clear();
            }
        }
    }
    print_envelope(&response)
}

fn print_envelope<T: Serialize>(response: &ApiResponse<T>) -> Result<u16> {
    let json = serde_json::to_string_pretty(response).context("Failed to serialize response")?;
    println!("{json}");
    Ok(response.status)
}

/// Expand directories into their image files; plain paths pass through unchanged
fn expand_inputs(inputs: &[PathBuf], recursive: bool, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found = find_image_files(input, recursive, pattern)
                .with_context(|| format!("Failed to scan {}", input.display()))?;
            found.sort();
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

/// Find image files in a directory
fn find_image_files(dir: &Path, recursive: bool, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let max_depth = if recursive { usize::MAX } else { 1 };

    for entry in walkdir::WalkDir::new(dir).max_depth(max_depth) {
        let entry = entry?;
        if entry.file_type().is_file() && is_image_file(entry.path()) && matches_pattern(entry.path(), pattern) {
            files.push(entry.path().to_path_buf());
        }
    }

    Ok(files)
}

fn is_image_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(PathValidator::is_allowed_filename)
}

/// Check if file matches the given pattern
fn matches_pattern(path: &Path, pattern: Option<&str>) -> bool {
    match pattern {
        Some(pat) => path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|filename| {
                glob::Pattern::new(pat)
                    .map(|p| p.matches(filename))
                    .unwrap_or(false)
            }),
        None => true,
    }
}
