//! Test utilities and mock backends for testing inference functionality
//!
//! Mock implementations of the `InferenceBackend` and `BackendFactory` traits
//! so the prediction pipeline can be tested without model files or an
//! inference engine.

use crate::{
    config::BackendType,
    error::{CropDxError, Result},
    inference::{BackendFactory, InferenceBackend},
    utils::TensorValidator,
};
use ndarray::{Array2, Array4};
use std::sync::{Arc, Mutex};

/// How the mock derives its output from the input
#[derive(Debug, Clone, PartialEq)]
pub enum MockOutput {
    /// Always return the same probability vector
    Fixed(Vec<f32>),
    /// Class 0 gets the mean pixel value, the rest share the remainder
    MeanBrightness { classes: usize },
}

/// Mock classifier backend
#[derive(Debug, Clone)]
pub struct MockClassifier {
    output: MockOutput,
    input_size: (u32, u32),
    /// Call history for verification in tests
    call_history: Arc<Mutex<Vec<String>>>,
    should_fail_inference: bool,
}

impl MockClassifier {
    /// Mock that always returns `probabilities`
    #[must_use]
    pub fn new(probabilities: Vec<f32>, input_size: (u32, u32)) -> Self {
        Self {
            output: MockOutput::Fixed(probabilities),
            input_size,
            call_history: Arc::new(Mutex::new(Vec::new())),
            should_fail_inference: false,
        }
    }

    /// Mock whose output tracks input brightness
    #[must_use]
    pub fn brightness_sensitive(classes: usize, input_size: (u32, u32)) -> Self {
        Self {
            output: MockOutput::MeanBrightness { classes },
            ..Self::new(Vec::new(), input_size)
        }
    }

    /// Mock that fails every inference call
    #[must_use]
    pub fn new_failing_inference(classes: usize, input_size: (u32, u32)) -> Self {
        let mut backend = Self::new(uniform(classes), input_size);
        backend.should_fail_inference = true;
        backend
    }

    /// Get the call history for verification in tests
    pub fn get_call_history(&self) -> Vec<String> {
        self.call_history.lock().unwrap().clone()
    }

    /// Number of `infer` calls so far
    pub fn infer_count(&self) -> usize {
        self.get_call_history()
            .iter()
            .filter(|call| call.as_str() == "infer")
            .count()
    }

    fn record_call(&self, method: &str) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(method.to_string());
        }
    }
}

impl InferenceBackend for MockClassifier {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn infer(&self, input: &Array4<f32>) -> Result<Array2<f32>> {
        self.record_call("infer");
        TensorValidator::validate_input_shape(input, self.input_shape())?;

        if self.should_fail_inference {
            return Err(CropDxError::prediction("Mock inference failed"));
        }

        let probabilities = match &self.output {
            MockOutput::Fixed(values) => values.clone(),
            MockOutput::MeanBrightness { classes } => {
                let mean = input.mean().unwrap_or(0.0).clamp(0.0, 1.0);
                let rest = (1.0 - mean) / (*classes as f32 - 1.0).max(1.0);
                std::iter::once(mean)
                    .chain(std::iter::repeat(rest).take(classes.saturating_sub(1)))
                    .collect()
            },
        };

        let classes = probabilities.len();
        Array2::from_shape_vec((1, classes), probabilities)
            .map_err(|e| CropDxError::prediction(e.to_string()))
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        let (width, height) = self.input_size;
        (1, height as usize, width as usize, 3)
    }

    fn num_classes(&self) -> Option<usize> {
        match &self.output {
            MockOutput::Fixed(values) => Some(values.len()),
            MockOutput::MeanBrightness { classes } => Some(*classes),
        }
    }
}

/// Mock backend factory
///
/// Model bytes starting with `corrupt` fail to load. Otherwise the factory
/// builds a [`MockClassifier`] producing `probabilities`.
#[derive(Debug, Clone)]
pub struct MockBackendFactory {
    probabilities: Vec<f32>,
    created: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl MockBackendFactory {
    #[must_use]
    pub fn new(probabilities: Vec<f32>) -> Self {
        Self {
            probabilities,
            created: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Input sizes of every backend created so far
    pub fn created(&self) -> Vec<(u32, u32)> {
        self.created.lock().unwrap().clone()
    }
}

impl BackendFactory for MockBackendFactory {
    fn create_backend(
        &self,
        _backend_type: BackendType,
        model_bytes: &[u8],
        input_size: (u32, u32),
    ) -> Result<Box<dyn InferenceBackend>> {
        if model_bytes.starts_with(b"corrupt") {
            return Err(CropDxError::model("Mock model bytes are corrupt"));
        }
        if let Ok(mut created) = self.created.lock() {
            created.push(input_size);
        }
        Ok(Box::new(MockClassifier::new(
            self.probabilities.clone(),
            input_size,
        )))
    }

    fn available_backends(&self) -> Vec<BackendType> {
        vec![BackendType::Tract, BackendType::Onnx]
    }
}

/// Uniform probability vector over `classes`
#[must_use]
pub fn uniform(classes: usize) -> Vec<f32> {
    vec![1.0 / classes.max(1) as f32; classes]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brightness_sensitive_output_is_distribution() {
        let backend = MockClassifier::brightness_sensitive(4, (2, 2));
        let output = backend.infer(&Array4::from_elem((1, 2, 2, 3), 0.4)).unwrap();
        let row: Vec<f32> = output.row(0).to_vec();
        assert!((row[0] - 0.4).abs() < 1e-6);
        assert!(TensorValidator::is_probability_distribution(&row));
    }

    #[test]
    fn test_mock_records_calls_and_checks_shape() {
        let backend = MockClassifier::new(uniform(3), (4, 4));
        assert!(backend.infer(&Array4::zeros((1, 4, 4, 3))).is_ok());
        assert!(backend.infer(&Array4::zeros((1, 5, 4, 3))).is_err());
        assert_eq!(backend.infer_count(), 2);
    }

    #[test]
    fn test_mock_factory_failures() {
        let factory = MockBackendFactory::new(uniform(2));
        assert!(factory
            .create_backend(BackendType::Tract, b"corrupt model", (8, 8))
            .is_err());
        assert!(factory
            .create_backend(BackendType::Tract, b"model", (8, 8))
            .is_ok());
        assert_eq!(factory.created(), vec![(8, 8)]);
    }
}
