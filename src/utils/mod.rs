//! Utility modules for image normalization and validation

pub mod preprocessing;
pub mod validation;

pub use preprocessing::{ImageNormalizer, NormalizedInput, PreviewOptions};
pub use validation::{PathValidator, TensorValidator};
