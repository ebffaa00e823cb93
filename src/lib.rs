#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::unused_async)]

//! # cropdx
//!
//! Plant disease classification for leaf photographs. Uploaded images are
//! normalized to the model's input size, classified by an ONNX model running
//! on Tract (pure Rust) or ONNX Runtime, optionally averaged over randomized
//! test-time augmentation passes, and returned as ranked, human-readable
//! predictions.
//!
//! ## Features
//!
//! - **Primary and fallback models**: the TTA-capable primary model is
//!   preferred; a smaller fallback keeps the service up when it cannot load
//! - **Test-time augmentation**: rotation, zoom and brightness perturbations
//!   with reflect padding, seedable for reproducible runs
//! - **Batch prediction**: up to ten images per call with per-item error isolation
//! - **Request layer**: typed records and a JSON envelope for HTTP front ends
//! - **CLI Integration**: optional command-line interface (`cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cropdx::{DefaultBackendFactory, PredictOptions, Predictor, PredictorConfig};
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = PredictorConfig::builder()
//!     .primary_model("models/best_model_advanced.onnx")
//!     .labels("models/class_names_advanced.txt")
//!     .build()?;
//! let predictor = Predictor::load(config, &DefaultBackendFactory);
//!
//! let bytes = std::fs::read("leaf.jpg")?;
//! let response = predictor.predict_bytes(&bytes, "leaf.jpg", &PredictOptions::default())?;
//! if let Some(top) = response.top_prediction {
//!     println!("{} ({:.1}%)", top.label, top.confidence * 100.0);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `tract` (default): pure Rust Tract backend
//! - `onnx`: ONNX Runtime backend
//! - `cli` (default): command-line interface and tracing subscriber setup
//! - `tracing-json`, `tracing-files`: extra log output formats for the CLI
//!
//! ### Library-Only Usage
//!
//! ```toml
//! [dependencies]
//! cropdx = { version = "0.1", default-features = false, features = ["tract"] }
//! ```

pub mod api;
pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod inference;
pub mod labels;
pub mod models;
pub mod processor;
pub mod services;
pub mod session;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod tta;
pub mod types;
pub mod utils;

use std::sync::Arc;
use tokio::io::AsyncRead;

// Public API exports
pub use backends::*;
pub use config::{
    BackendType, BatchOptions, PredictOptions, PredictorConfig, PredictorConfigBuilder,
    PreviewConfig, MAX_BATCH_SIZE, MAX_TOP_N,
};
pub use error::{CropDxError, Result};
pub use inference::{BackendFactory, DefaultBackendFactory, InferenceBackend};
pub use labels::ClassLabels;
pub use models::ModelHandle;
pub use processor::{BatchInput, Predictor};
pub use services::{ImageIOService, ResponseFormatter};
pub use session::SharedPredictor;
pub use tta::{Perturbation, TtaEnsembler};
pub use types::{
    BatchItemResult, BatchResponse, ClassPrediction, HealthStatus, ImageMetadata, ModelInfo,
    ModelKind, NormalizedImage, PredictionResponse, PredictionResult, ProcessingOptions,
};
pub use utils::{ImageNormalizer, NormalizedInput, PathValidator, PreviewOptions, TensorValidator};

#[cfg(feature = "cli")]
pub use tracing_config::{
    events, init_cli_tracing, spans, TracingConfig, TracingFormat, TracingGuard, TracingOutput,
};

/// Classify an image provided as bytes
///
/// Loads the shared predictor on first use and runs inference on the
/// blocking thread pool, so it is safe to call from async request handlers.
///
/// # Examples
///
/// ```rust,no_run
/// use cropdx::{predict_from_bytes, DefaultBackendFactory, PredictOptions, PredictorConfig, SharedPredictor};
/// use std::sync::Arc;
///
/// # async fn example(upload_bytes: Vec<u8>) -> anyhow::Result<()> {
/// let shared = SharedPredictor::new(PredictorConfig::default(), Arc::new(DefaultBackendFactory));
/// let response =
///     predict_from_bytes(upload_bytes, "leaf.png", &shared, PredictOptions::default()).await?;
/// println!("{}", serde_json::to_string_pretty(&response)?);
/// # Ok(())
/// # }
/// ```
pub async fn predict_from_bytes(
    image_bytes: Vec<u8>,
    filename: &str,
    shared: &SharedPredictor,
    options: PredictOptions,
) -> Result<PredictionResponse> {
    let predictor: Arc<Predictor> = shared.get().await;
    let filename = filename.to_string();

    tokio::task::spawn_blocking(move || predictor.predict_bytes(&image_bytes, &filename, &options))
        .await
        .map_err(|e| CropDxError::prediction(format!("Prediction task failed: {e}")))?
}

/// Classify an image read from any async reader
///
/// # Examples
///
/// ```rust,no_run
/// use cropdx::{predict_from_reader, DefaultBackendFactory, PredictOptions, PredictorConfig, SharedPredictor};
/// use std::sync::Arc;
/// use tokio::fs::File;
///
/// # async fn example() -> anyhow::Result<()> {
/// let shared = SharedPredictor::new(PredictorConfig::default(), Arc::new(DefaultBackendFactory));
/// let file = File::open("leaf.jpg").await?;
/// let response = predict_from_reader(file, "leaf.jpg", &shared, PredictOptions::default()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn predict_from_reader<R: AsyncRead + Unpin>(
    reader: R,
    filename: &str,
    shared: &SharedPredictor,
    options: PredictOptions,
) -> Result<PredictionResponse> {
    let bytes = ImageIOService::read_all(reader).await?;
    predict_from_bytes(bytes, filename, shared, options).await
}
