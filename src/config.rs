//! Configuration types for plant disease prediction

use crate::error::{CropDxError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Hard cap on the number of images accepted by one batch call
pub const MAX_BATCH_SIZE: usize = 10;

/// Upper bound for the number of ranked classes returned per image
pub const MAX_TOP_N: usize = 10;

/// Default number of TTA passes for single-image prediction
pub const DEFAULT_TTA_PASSES: usize = 5;

/// Maximum accepted TTA pass count
pub const MAX_TTA_PASSES: usize = 20;

/// Inference backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// Tract backend (pure Rust, no external dependencies)
    Tract,
    /// ONNX Runtime backend
    Onnx,
}

impl Default for BackendType {
    fn default() -> Self {
        Self::Tract
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tract => write!(f, "tract"),
            Self::Onnx => write!(f, "onnx"),
        }
    }
}

impl std::str::FromStr for BackendType {
    type Err = CropDxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tract" => Ok(Self::Tract),
            "onnx" => Ok(Self::Onnx),
            other => Err(CropDxError::invalid_config(format!(
                "Unknown backend '{other}'. Expected 'tract' or 'onnx'"
            ))),
        }
    }
}

/// Preview re-encoding settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// JPEG quality for full-size previews (single-image requests)
    pub quality: u8,
    /// JPEG quality for batch thumbnails
    pub thumbnail_quality: u8,
    /// Edge length of batch thumbnails in pixels
    pub thumbnail_size: u32,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            quality: 95,
            thumbnail_quality: 80,
            thumbnail_size: 150,
        }
    }
}

/// Configuration for constructing a [`crate::Predictor`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Path to the primary (TTA-capable) model artifact
    pub primary_model: PathBuf,

    /// Path to the fallback model artifact, tried when the primary fails
    pub fallback_model: Option<PathBuf>,

    /// Text file with one class label per line, in model output order
    pub labels: PathBuf,

    /// Input size (width, height) of the primary model
    pub primary_input_size: (u32, u32),

    /// Input size (width, height) of the fallback model
    pub fallback_input_size: (u32, u32),

    /// Inference backend used for both models
    pub backend: BackendType,

    /// Number of passes used when TTA is requested
    pub tta_passes: usize,

    /// Fixed seed for TTA perturbations (None = OS entropy per request)
    pub tta_seed: Option<u64>,

    /// Preview re-encoding settings
    pub preview: PreviewConfig,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            primary_model: PathBuf::from("models/best_model_advanced.onnx"),
            fallback_model: Some(PathBuf::from("models/best_model.onnx")),
            labels: PathBuf::from("models/class_names_advanced.txt"),
            primary_input_size: (300, 300),
            fallback_input_size: (224, 224),
            backend: BackendType::default(),
            tta_passes: DEFAULT_TTA_PASSES,
            tta_seed: None,
            preview: PreviewConfig::default(),
        }
    }
}

impl PredictorConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> PredictorConfigBuilder {
        PredictorConfigBuilder::default()
    }

    /// Load a configuration from a JSON file
    ///
    /// Missing fields fall back to their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            CropDxError::invalid_config(format!(
                "Failed to parse config file '{}': {e}",
                path.display()
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Default config location: `<config_dir>/cropdx/config.json`
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cropdx").join("config.json"))
    }

    /// Validate all configuration parameters
    ///
    /// # Validation Rules
    ///
    /// - TTA passes: 1-20 (inclusive)
    /// - Input sizes: non-zero in both dimensions
    /// - Preview qualities: 1-100
    pub fn validate(&self) -> Result<()> {
        if self.tta_passes == 0 || self.tta_passes > MAX_TTA_PASSES {
            return Err(CropDxError::config_value_error(
                "TTA passes",
                self.tta_passes,
                "1-20",
                Some(DEFAULT_TTA_PASSES),
            ));
        }

        for (name, (width, height)) in [
            ("primary input size", self.primary_input_size),
            ("fallback input size", self.fallback_input_size),
        ] {
            if width == 0 || height == 0 {
                return Err(CropDxError::invalid_config(format!(
                    "Invalid {name}: {width}x{height}"
                )));
            }
        }

        for (name, quality) in [
            ("preview quality", self.preview.quality),
            ("thumbnail quality", self.preview.thumbnail_quality),
        ] {
            if quality == 0 || quality > 100 {
                return Err(CropDxError::config_value_error(name, quality, "1-100", None));
            }
        }

        if self.preview.thumbnail_size == 0 {
            return Err(CropDxError::invalid_config("Thumbnail size must be non-zero"));
        }

        Ok(())
    }
}

/// Builder for `PredictorConfig`
#[derive(Debug, Default)]
pub struct PredictorConfigBuilder {
    config: PredictorConfig,
}

impl PredictorConfigBuilder {
    #[must_use]
    pub fn primary_model<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.primary_model = path.into();
        self
    }

    #[must_use]
    pub fn fallback_model<P: Into<PathBuf>>(mut self, path: Option<P>) -> Self {
        self.config.fallback_model = path.map(Into::into);
        self
    }

    #[must_use]
    pub fn labels<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.labels = path.into();
        self
    }

    #[must_use]
    pub fn primary_input_size(mut self, width: u32, height: u32) -> Self {
        self.config.primary_input_size = (width, height);
        self
    }

    #[must_use]
    pub fn fallback_input_size(mut self, width: u32, height: u32) -> Self {
        self.config.fallback_input_size = (width, height);
        self
    }

    #[must_use]
    pub fn backend(mut self, backend: BackendType) -> Self {
        self.config.backend = backend;
        self
    }

    #[must_use]
    pub fn tta_passes(mut self, passes: usize) -> Self {
        self.config.tta_passes = passes;
        self
    }

    #[must_use]
    pub fn tta_seed(mut self, seed: Option<u64>) -> Self {
        self.config.tta_seed = seed;
        self
    }

    #[must_use]
    pub fn preview(mut self, preview: PreviewConfig) -> Self {
        self.config.preview = preview;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// - TTA pass count outside 1-20
    /// - Zero-sized input dimensions
    /// - Preview quality outside 1-100
    pub fn build(self) -> Result<PredictorConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}

/// Request-scoped options for single-image prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictOptions {
    /// Run test-time augmentation
    pub use_tta: bool,
    /// Number of ranked classes to return (clamped to 1-10)
    pub top_n: usize,
    /// Echoed back to the caller; preprocessing is fixed
    pub enhance_image: bool,
}

impl Default for PredictOptions {
    fn default() -> Self {
        Self {
            use_tta: true,
            top_n: 5,
            enhance_image: true,
        }
    }
}

/// Request-scoped options for batch prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOptions {
    /// Run test-time augmentation on every item (off by default for throughput)
    pub use_tta: bool,
    /// Number of ranked classes to return per item (clamped to 1-10)
    pub top_n: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            use_tta: false,
            top_n: 3,
        }
    }
}

/// Clamp a caller-requested top-N into `[1, MAX_TOP_N]`
#[must_use]
pub fn clamp_top_n(requested: usize) -> usize {
    requested.clamp(1, MAX_TOP_N)
}
