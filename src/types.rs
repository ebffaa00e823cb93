//! Core data types shared across the prediction pipeline

use crate::error::{CropDxError, Result};
use ndarray::{Array3, Array4, Axis};
use serde::{Deserialize, Serialize};

/// Image tensor in model input layout: `height × width × 3`, values in `[0, 1]`
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedImage {
    data: Array3<f32>,
}

impl NormalizedImage {
    /// Wrap an `(H, W, 3)` array, rejecting other channel counts and out-of-range values
    pub fn new(data: Array3<f32>) -> Result<Self> {
        let (height, width, channels) = data.dim();
        if channels != 3 || height == 0 || width == 0 {
            return Err(CropDxError::invalid_request(format!(
                "Normalized image must have shape (H, W, 3), got ({height}, {width}, {channels})"
            )));
        }
        if let Some(value) = data.iter().find(|v| !(0.0..=1.0).contains(*v)) {
            return Err(CropDxError::invalid_request(format!(
                "Normalized image value {value} outside [0, 1]"
            )));
        }
        Ok(Self { data })
    }

    /// Wrap an array that the caller guarantees is in range
    pub(crate) fn from_clamped(data: Array3<f32>) -> Self {
        Self { data }
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    #[must_use]
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// Add the leading batch axis: `(1, H, W, 3)`
    #[must_use]
    pub fn to_batch_tensor(&self) -> Array4<f32> {
        self.data.view().insert_axis(Axis(0)).to_owned()
    }
}

/// Metadata about the decoded source image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Detected container format, e.g. `JPEG`, `PNG`
    pub format: String,
    /// Source color mode, e.g. `RGB`, `RGBA`, `L`
    pub mode: String,
    /// Original pixel dimensions `(width, height)`
    pub size: (u32, u32),
    pub filename: String,
}

/// One ranked class in a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassPrediction {
    /// 1-based rank within the result
    pub rank: usize,
    /// Position of the class in the model output vector
    pub class_index: usize,
    /// Human-readable label, e.g. `Tomato - Late blight`
    pub label: String,
    /// Label exactly as listed in the class file
    pub raw_label: String,
    pub plant: String,
    pub condition: String,
    pub is_healthy: bool,
    /// Probability in `[0, 1]`
    pub confidence: f32,
}

/// Ranked top-N classes, sorted by descending confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predictions: Vec<ClassPrediction>,
}

impl PredictionResult {
    #[must_use]
    pub fn top_prediction(&self) -> Option<&ClassPrediction> {
        self.predictions.first()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }
}

/// Echo of the options actually applied to a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingOptions {
    pub use_tta: bool,
    pub top_n: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhance_image: Option<bool>,
}

/// Which model artifact is serving predictions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// The primary TTA-capable model
    Primary,
    /// The designated fallback model
    Fallback,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Full response for one classified image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    #[serde(flatten)]
    pub result: PredictionResult,
    pub top_prediction: Option<ClassPrediction>,
    /// JPEG preview as a `data:` URL
    pub original_image: String,
    pub image_info: ImageMetadata,
    pub processing_options: ProcessingOptions,
    pub model_type: ModelKind,
    pub inference_ms: u64,
}

/// Per-item outcome of a batch call, tagged with the item's input position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchItemResult {
    Success {
        index: usize,
        #[serde(flatten)]
        prediction: Box<PredictionResponse>,
    },
    Failure {
        index: usize,
        filename: String,
        error: String,
        error_kind: String,
    },
}

impl BatchItemResult {
    pub(crate) fn failure(index: usize, filename: String, error: &CropDxError) -> Self {
        Self::Failure {
            index,
            filename,
            error: error.to_string(),
            error_kind: error.kind().to_string(),
        }
    }

    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Self::Success { index, .. } | Self::Failure { index, .. } => *index,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    #[must_use]
    pub fn prediction(&self) -> Option<&PredictionResponse> {
        match self {
            Self::Success { prediction, .. } => Some(prediction),
            Self::Failure { .. } => None,
        }
    }
}

/// Aggregate result of a batch call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub results: Vec<BatchItemResult>,
    pub processed_count: usize,
    pub processing_options: ProcessingOptions,
}

/// Read-only description of the loaded model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_type: ModelKind,
    pub model_path: String,
    pub backend: String,
    pub input_size: (u32, u32),
    pub size_bytes: u64,
    pub sha256: String,
    pub supports_tta: bool,
    pub tta_passes: usize,
    pub total_classes: usize,
    /// First ten class labels
    pub classes_preview: Vec<String>,
}

/// Snapshot of predictor availability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// `healthy` when a model is loaded, `degraded` otherwise
    pub status: String,
    pub predictor_available: bool,
    pub model_loaded: bool,
    pub classes_loaded: usize,
    /// `primary`, `fallback`, or `none`
    pub model_type: String,
    pub supports_tta: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
