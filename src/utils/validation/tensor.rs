//! Tensor validation utilities
//!
//! Shape checks for model inputs and sanity checks for model outputs.

use crate::error::{CropDxError, Result};
use ndarray::{Array2, Array4};

/// Tolerance for a probability vector summing to one
pub const PROBABILITY_SUM_TOLERANCE: f32 = 1e-3;

/// Validator for tensor operations and shape validation
pub struct TensorValidator;

impl TensorValidator {
    /// Validate an NHWC input tensor against the model's declared shape
    pub fn validate_input_shape(
        tensor: &Array4<f32>,
        expected_shape: (usize, usize, usize, usize),
    ) -> Result<()> {
        let actual = tensor.dim();
        if actual != expected_shape {
            let (batch, height, width, channels) = expected_shape;
            return Err(CropDxError::invalid_request(format!(
                "Input tensor shape mismatch. Expected [{}, {}, {}, {}], got [{}, {}, {}, {}]",
                batch, height, width, channels, actual.0, actual.1, actual.2, actual.3
            )));
        }
        Ok(())
    }

    /// Validate a `(batch, classes)` output with exactly one row
    pub fn validate_single_row(output: &Array2<f32>) -> Result<usize> {
        let (rows, classes) = output.dim();
        if rows != 1 || classes == 0 {
            return Err(CropDxError::prediction(format!(
                "Expected output shape [1, C], got [{rows}, {classes}]"
            )));
        }
        Ok(classes)
    }

    /// Check that a vector is a probability distribution
    #[must_use]
    pub fn is_probability_distribution(values: &[f32]) -> bool {
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return false;
        }
        let sum: f32 = values.iter().sum();
        (sum - 1.0).abs() <= PROBABILITY_SUM_TOLERANCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_input_shape() {
        let tensor = Array4::<f32>::zeros((1, 224, 224, 3));
        assert!(TensorValidator::validate_input_shape(&tensor, (1, 224, 224, 3)).is_ok());

        let err = TensorValidator::validate_input_shape(&tensor, (1, 300, 300, 3)).unwrap_err();
        assert!(err.to_string().contains("300"));
    }

    #[test]
    fn test_validate_single_row() {
        assert_eq!(
            TensorValidator::validate_single_row(&Array2::<f32>::zeros((1, 38))).unwrap(),
            38
        );
        assert!(TensorValidator::validate_single_row(&Array2::<f32>::zeros((2, 38))).is_err());
        assert!(TensorValidator::validate_single_row(&Array2::<f32>::zeros((1, 0))).is_err());
    }

    #[test]
    fn test_probability_distribution() {
        assert!(TensorValidator::is_probability_distribution(&[0.2, 0.3, 0.5]));
        assert!(!TensorValidator::is_probability_distribution(&[0.2, 0.3]));
        assert!(!TensorValidator::is_probability_distribution(&[1.5, -0.5]));
        assert!(!TensorValidator::is_probability_distribution(&[f32::NAN, 1.0]));
    }
}
