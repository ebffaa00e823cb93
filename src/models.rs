//! Model artifact loading
//!
//! A [`ModelHandle`] owns one deserialized classifier plus the artifact
//! metadata reported by info endpoints.

use crate::{
    config::BackendType,
    error::{CropDxError, Result},
    inference::{BackendFactory, InferenceBackend},
    types::{ModelKind, NormalizedImage},
    utils::TensorValidator,
};
use instant::Instant;
use ndarray::{Array1, Array4};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// A loaded classifier with its artifact metadata
#[derive(Debug)]
pub struct ModelHandle {
    kind: ModelKind,
    path: PathBuf,
    backend: Box<dyn InferenceBackend>,
    backend_type: BackendType,
    input_size: (u32, u32),
    num_classes: usize,
    size_bytes: u64,
    sha256: String,
}

impl ModelHandle {
    /// Read an artifact from disk and build a backend for it
    ///
    /// When the backend cannot report its class count statically, a single
    /// probe inference on a blank image determines it.
    ///
    /// # Errors
    /// - Artifact missing or unreadable
    /// - Backend creation failures
    /// - Probe inference failures
    pub fn load(
        kind: ModelKind,
        path: &Path,
        input_size: (u32, u32),
        backend_type: BackendType,
        factory: &dyn BackendFactory,
    ) -> Result<Self> {
        let load_start = Instant::now();

        if !path.is_file() {
            return Err(CropDxError::model_load_error(path, "file not found"));
        }
        let bytes =
            std::fs::read(path).map_err(|e| CropDxError::model_load_error(path, &e.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let sha256 = format!("{:x}", hasher.finalize());

        let backend = factory
            .create_backend(backend_type, &bytes, input_size)
            .map_err(|e| CropDxError::model_load_error(path, &e.to_string()))?;

        let num_classes = match backend.num_classes() {
            Some(classes) => classes,
            None => {
                let probe = Array4::<f32>::zeros(backend.input_shape());
                let output = backend
                    .infer(&probe)
                    .map_err(|e| CropDxError::model_load_error(path, &e.to_string()))?;
                TensorValidator::validate_single_row(&output)?
            },
        };

        log::info!(
            "Loaded {kind} model '{}' via {backend_type} in {:.2}ms ({num_classes} classes, {:.2} MB)",
            path.display(),
            load_start.elapsed().as_secs_f64() * 1000.0,
            bytes.len() as f64 / (1024.0 * 1024.0)
        );

        Ok(Self {
            kind,
            path: path.to_path_buf(),
            backend,
            backend_type,
            input_size,
            num_classes,
            size_bytes: bytes.len() as u64,
            sha256,
        })
    }

    /// Run the classifier on one normalized image
    ///
    /// # Errors
    /// - Image size differs from the model's input size
    /// - Backend inference failures
    /// - Output width differs from the class count seen at load time
    pub fn infer(&self, image: &NormalizedImage) -> Result<Array1<f32>> {
        let (width, height) = self.input_size;
        if image.width() != width as usize || image.height() != height as usize {
            return Err(CropDxError::prediction(format!(
                "Image is {}x{} but the {} model expects {width}x{height}",
                image.width(),
                image.height(),
                self.kind
            )));
        }

        let output = self.backend.infer(&image.to_batch_tensor())?;
        let classes = TensorValidator::validate_single_row(&output)?;
        if classes != self.num_classes {
            return Err(CropDxError::prediction(format!(
                "Model produced {classes} scores, expected {}",
                self.num_classes
            )));
        }

        Ok(output.row(0).to_owned())
    }

    #[must_use]
    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    #[must_use]
    pub fn backend_type(&self) -> BackendType {
        self.backend_type
    }

    /// Model input size `(width, height)`
    #[must_use]
    pub fn input_size(&self) -> (u32, u32) {
        self.input_size
    }

    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Hex SHA-256 of the artifact bytes
    #[must_use]
    pub fn sha256(&self) -> &str {
        &self.sha256
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::{uniform, MockBackendFactory};
    use ndarray::Array3;

    fn write_model(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_load_records_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(dir.path(), "model.onnx", b"abc");
        let factory = MockBackendFactory::new(uniform(4));

        let model =
            ModelHandle::load(ModelKind::Primary, &path, (8, 6), BackendType::Tract, &factory)
                .unwrap();

        assert_eq!(model.kind(), ModelKind::Primary);
        assert_eq!(model.num_classes(), 4);
        assert_eq!(model.size_bytes(), 3);
        assert_eq!(
            model.sha256(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(model.input_size(), (8, 6));
        assert_eq!(factory.created(), vec![(8, 6)]);
    }

    #[test]
    fn test_load_missing_and_corrupt_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let factory = MockBackendFactory::new(uniform(2));

        let missing = dir.path().join("missing.onnx");
        let err = ModelHandle::load(ModelKind::Primary, &missing, (8, 8), BackendType::Tract, &factory)
            .unwrap_err();
        assert!(matches!(err, CropDxError::Model(_)));

        let corrupt = write_model(dir.path(), "corrupt.onnx", b"corrupt bytes");
        let err =
            ModelHandle::load(ModelKind::Fallback, &corrupt, (8, 8), BackendType::Tract, &factory)
                .unwrap_err();
        assert!(err.to_string().contains("corrupt.onnx"));
    }

    #[test]
    fn test_infer_checks_input_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(dir.path(), "model.onnx", b"model");
        let factory = MockBackendFactory::new(vec![0.25, 0.75]);
        let model =
            ModelHandle::load(ModelKind::Primary, &path, (4, 4), BackendType::Tract, &factory)
                .unwrap();

        let image = NormalizedImage::new(Array3::from_elem((4, 4, 3), 0.5)).unwrap();
        let probabilities = model.infer(&image).unwrap();
        assert_eq!(probabilities.to_vec(), vec![0.25, 0.75]);

        let wrong = NormalizedImage::new(Array3::from_elem((5, 4, 3), 0.5)).unwrap();
        assert!(model.infer(&wrong).is_err());
    }
}
