//! Error types for plant disease prediction

use thiserror::Error;

/// Result type alias for prediction operations
pub type Result<T> = std::result::Result<T, CropDxError>;

/// Error taxonomy for the prediction lifecycle
#[derive(Error, Debug)]
pub enum CropDxError {
    /// Image bytes could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Filename extension outside the allow-list
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Neither the primary nor the fallback model could be loaded
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Batch exceeded the per-call item cap
    #[error("Batch too large: {size} items (maximum {max})")]
    BatchTooLarge { size: usize, max: usize },

    /// Probability vector length does not match the class label count
    #[error("Label mismatch: model produces {outputs} classes but {labels} labels are loaded")]
    LabelMismatch { outputs: usize, labels: usize },

    /// Unexpected failure while evaluating the model
    #[error("Prediction error: {0}")]
    Prediction(String),

    /// Malformed request payload
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Model artifact loading or deserialization errors
    #[error("Model error: {0}")]
    Model(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CropDxError {
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    pub fn unsupported_format<S: Into<String>>(msg: S) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    pub fn model_unavailable<S: Into<String>>(msg: S) -> Self {
        Self::ModelUnavailable(msg.into())
    }

    pub fn prediction<S: Into<String>>(msg: S) -> Self {
        Self::Prediction(msg.into())
    }

    pub fn invalid_request<S: Into<String>>(msg: S) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Create model error with the path that failed to load
    pub fn model_load_error<P: AsRef<std::path::Path>>(model_path: P, error: &str) -> Self {
        Self::Model(format!(
            "Failed to load model '{}': {}",
            model_path.as_ref().display(),
            error
        ))
    }

    /// HTTP-style status implied by this error
    ///
    /// 400 for malformed or invalid input, 503 when no model is loaded,
    /// 500 for everything else.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Decode(_)
            | Self::UnsupportedFormat(_)
            | Self::BatchTooLarge { .. }
            | Self::InvalidRequest(_) => 400,
            Self::ModelUnavailable(_) => 503,
            Self::LabelMismatch { .. }
            | Self::Prediction(_)
            | Self::InvalidConfig(_)
            | Self::Model(_)
            | Self::Io(_) => 500,
        }
    }

    /// Stable machine-readable name of the error kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode_error",
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::ModelUnavailable(_) => "model_unavailable",
            Self::BatchTooLarge { .. } => "batch_too_large",
            Self::LabelMismatch { .. } => "label_mismatch",
            Self::Prediction(_) => "prediction_error",
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidConfig(_) => "invalid_config",
            Self::Model(_) => "model_error",
            Self::Io(_) => "io_error",
        }
    }
}

impl From<image::ImageError> for CropDxError {
    fn from(error: image::ImageError) -> Self {
        Self::Decode(error.to_string())
    }
}
