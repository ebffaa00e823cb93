//! Inference backend abstraction and factory

use crate::{
    config::BackendType,
    error::{CropDxError, Result},
};
use ndarray::{Array2, Array4};

/// A loaded classifier that maps an NHWC image batch to class probabilities
///
/// Implementations are shared across threads behind an `Arc`, so `infer`
/// takes `&self` and any mutable runtime state must be synchronized inside.
pub trait InferenceBackend: Send + Sync + std::fmt::Debug {
    /// Short backend name for logs and model info
    fn name(&self) -> &'static str;

    /// Run inference on a `(1, H, W, 3)` tensor, returning `(1, C)` probabilities
    ///
    /// # Errors
    /// - Input shape does not match [`InferenceBackend::input_shape`]
    /// - Runtime failures inside the inference engine
    fn infer(&self, input: &Array4<f32>) -> Result<Array2<f32>>;

    /// Expected input shape `(batch, height, width, channels)`
    fn input_shape(&self) -> (usize, usize, usize, usize);

    /// Number of output classes when the model declares it statically
    fn num_classes(&self) -> Option<usize>;
}

/// Factory trait for creating inference backends
pub trait BackendFactory: Send + Sync {
    /// Create a backend of the given type from serialized model bytes
    ///
    /// # Errors
    ///
    /// Returns `CropDxError` for:
    /// - Backend types not compiled into this build
    /// - Model parsing or optimization failures
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_bytes: &[u8],
        input_size: (u32, u32),
    ) -> Result<Box<dyn InferenceBackend>>;

    /// List backend types this factory can create
    fn available_backends(&self) -> Vec<BackendType>;
}

/// Backend factory for the engines enabled at compile time
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_bytes: &[u8],
        input_size: (u32, u32),
    ) -> Result<Box<dyn InferenceBackend>> {
        match backend_type {
            #[cfg(feature = "tract")]
            BackendType::Tract => Ok(Box::new(crate::backends::TractBackend::from_bytes(
                model_bytes,
                input_size,
            )?)),
            #[cfg(feature = "onnx")]
            BackendType::Onnx => Ok(Box::new(crate::backends::OnnxBackend::from_bytes(
                model_bytes,
                input_size,
            )?)),
            #[allow(unreachable_patterns)]
            other => {
                let _ = (model_bytes, input_size);
                Err(CropDxError::invalid_config(format!(
                    "Backend '{other}' is not enabled in this build"
                )))
            },
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        let mut backends = Vec::new();
        #[cfg(feature = "tract")]
        backends.push(BackendType::Tract);
        #[cfg(feature = "onnx")]
        backends.push(BackendType::Onnx);
        backends
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::MockClassifier;

    #[test]
    fn test_mock_backend_through_trait_object() {
        let backend: Box<dyn InferenceBackend> =
            Box::new(MockClassifier::new(vec![0.1, 0.7, 0.2], (8, 8)));

        assert_eq!(backend.input_shape(), (1, 8, 8, 3));
        assert_eq!(backend.num_classes(), Some(3));

        let output = backend.infer(&Array4::zeros((1, 8, 8, 3))).unwrap();
        assert_eq!(output.dim(), (1, 3));
        assert!((output[[0, 1]] - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_default_factory_rejects_garbage_model() {
        let factory = DefaultBackendFactory;
        for backend_type in factory.available_backends() {
            let result = factory.create_backend(backend_type, b"not an onnx model", (224, 224));
            assert!(result.is_err(), "{backend_type} accepted garbage bytes");
        }
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn test_default_factory_reports_disabled_backend() {
        let err = DefaultBackendFactory
            .create_backend(BackendType::Onnx, &[], (224, 224))
            .unwrap_err();
        assert!(matches!(err, CropDxError::InvalidConfig(_)));
        assert!(!DefaultBackendFactory
            .available_backends()
            .contains(&BackendType::Onnx));
    }
}
