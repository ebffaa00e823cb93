//! Request records

use crate::config::{BatchOptions, PredictOptions};
use serde::{Deserialize, Serialize};

/// Filename assumed when a single-image request omits one
pub const DEFAULT_FILENAME: &str = "uploaded_image.jpg";

fn default_filename() -> String {
    DEFAULT_FILENAME.to_string()
}

fn default_true() -> bool {
    true
}

fn default_top_n() -> usize {
    PredictOptions::default().top_n
}

fn default_batch_top_n() -> usize {
    BatchOptions::default().top_n
}

/// Single-image prediction request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictRequest {
    /// Base64 image, optionally as a `data:` URL
    #[serde(default)]
    pub image: String,
    #[serde(default = "default_filename")]
    pub filename: String,
    #[serde(default = "default_true")]
    pub use_tta: bool,
    #[serde(default = "default_true")]
    pub enhance_image: bool,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl PredictRequest {
    #[must_use]
    pub fn options(&self) -> PredictOptions {
        PredictOptions {
            use_tta: self.use_tta,
            top_n: self.top_n,
            enhance_image: self.enhance_image,
        }
    }
}

/// One image inside a batch request
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchImage {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

impl BatchImage {
    /// Filename, defaulting to `image_<index>.jpg`
    #[must_use]
    pub fn filename_or_default(&self, index: usize) -> String {
        self.filename
            .clone()
            .unwrap_or_else(|| format!("image_{index}.jpg"))
    }
}

/// Batch prediction request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPredictRequest {
    #[serde(default)]
    pub images: Vec<BatchImage>,
    #[serde(default)]
    pub use_tta: bool,
    #[serde(default = "default_batch_top_n")]
    pub top_n: usize,
}

impl BatchPredictRequest {
    #[must_use]
    pub fn options(&self) -> BatchOptions {
        BatchOptions {
            use_tta: self.use_tta,
            top_n: self.top_n,
        }
    }
}
