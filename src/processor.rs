//! Plant disease predictor
//!
//! The [`Predictor`] owns the loaded model and class labels and runs the full
//! prediction lifecycle: normalization, single-pass or TTA inference, and
//! response formatting. It is shared by the CLI and request layers.

use crate::{
    config::{clamp_top_n, BatchOptions, PredictOptions, PredictorConfig, MAX_BATCH_SIZE},
    error::{CropDxError, Result},
    inference::BackendFactory,
    labels::ClassLabels,
    models::ModelHandle,
    services::ResponseFormatter,
    tta::TtaEnsembler,
    types::{
        BatchItemResult, BatchResponse, HealthStatus, ModelInfo, ModelKind, NormalizedImage,
        PredictionResponse, PredictionResult, ProcessingOptions,
    },
    utils::{ImageNormalizer, PreviewOptions, TensorValidator},
};
use instant::Instant;
use rand::{rngs::StdRng, SeedableRng};
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Number of labels included in model info
const CLASSES_PREVIEW_LEN: usize = 10;

/// One item of a batch request
#[derive(Debug)]
pub struct BatchInput {
    pub filename: String,
    /// Raw image bytes, or the error that prevented obtaining them
    pub payload: std::result::Result<Vec<u8>, CropDxError>,
}

impl BatchInput {
    #[must_use]
    pub fn new<S: Into<String>>(filename: S, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            payload: Ok(bytes),
        }
    }

    /// An item already known to be invalid, reported inline at its index
    #[must_use]
    pub fn rejected<S: Into<String>>(filename: S, error: CropDxError) -> Self {
        Self {
            filename: filename.into(),
            payload: Err(error),
        }
    }
}

/// Loaded model plus the labels that index its output
#[derive(Debug)]
pub struct Predictor {
    config: PredictorConfig,
    model: Option<ModelHandle>,
    labels: Option<ClassLabels>,
    load_error: Option<String>,
}

impl Predictor {
    /// Load labels, then the primary model, then the fallback if the primary fails
    ///
    /// Never fails: when no model can be loaded the predictor is returned in
    /// the unavailable state and remembers why.
    #[instrument(skip(config, factory), fields(
        primary = %config.primary_model.display(),
        backend = %config.backend
    ))]
    pub fn load(config: PredictorConfig, factory: &dyn BackendFactory) -> Self {
        let labels = match ClassLabels::from_file(&config.labels) {
            Ok(labels) => labels,
            Err(e) => {
                warn!(error = %e, "Class labels could not be loaded");
                return Self::unavailable(config, e.to_string());
            },
        };
        info!(classes = labels.len(), "Class labels loaded");

        let mut candidates = vec![(
            ModelKind::Primary,
            config.primary_model.clone(),
            config.primary_input_size,
        )];
        if let Some(fallback) = &config.fallback_model {
            candidates.push((ModelKind::Fallback, fallback.clone(), config.fallback_input_size));
        }

        let mut failures = Vec::new();
        for (kind, path, input_size) in candidates {
            match Self::load_candidate(kind, &path, input_size, &config, &labels, factory) {
                Ok(model) => {
                    info!(model_type = %kind, path = %path.display(), "Model ready");
                    return Self {
                        config,
                        model: Some(model),
                        labels: Some(labels),
                        load_error: None,
                    };
                },
                Err(e) => {
                    warn!(model_type = %kind, error = %e, "Model candidate failed to load");
                    failures.push(format!("{kind}: {e}"));
                },
            }
        }

        Self {
            config,
            model: None,
            labels: Some(labels),
            load_error: Some(failures.join("; ")),
        }
    }

    fn load_candidate(
        kind: ModelKind,
        path: &Path,
        input_size: (u32, u32),
        config: &PredictorConfig,
        labels: &ClassLabels,
        factory: &dyn BackendFactory,
    ) -> Result<ModelHandle> {
        let model = ModelHandle::load(kind, path, input_size, config.backend, factory)?;
        labels.ensure_matches(model.num_classes())?;
        Ok(model)
    }

    /// A predictor with no model, reporting `reason` from health checks
    #[must_use]
    pub fn unavailable<S: Into<String>>(config: PredictorConfig, reason: S) -> Self {
        Self {
            config,
            model: None,
            labels: None,
            load_error: Some(reason.into()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.model.is_some()
    }

    #[must_use]
    pub fn model_kind(&self) -> Option<ModelKind> {
        self.model.as_ref().map(ModelHandle::kind)
    }

    /// Number of loaded class labels (0 when labels failed to load)
    #[must_use]
    pub fn class_count(&self) -> usize {
        self.labels.as_ref().map_or(0, ClassLabels::len)
    }

    /// TTA runs only on the primary model
    #[must_use]
    pub fn supports_tta(&self) -> bool {
        self.model_kind() == Some(ModelKind::Primary)
    }

    /// Input size `(width, height)` of the loaded model
    #[must_use]
    pub fn input_size(&self) -> Option<(u32, u32)> {
        self.model.as_ref().map(ModelHandle::input_size)
    }

    #[must_use]
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    fn loaded(&self) -> Result<(&ModelHandle, &ClassLabels)> {
        match (&self.model, &self.labels) {
            (Some(model), Some(labels)) => Ok((model, labels)),
            _ => Err(CropDxError::model_unavailable(
                self.load_error
                    .clone()
                    .unwrap_or_else(|| "No model loaded".to_string()),
            )),
        }
    }

    fn rng(&self) -> StdRng {
        match self.config.tta_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    /// Classify an already normalized image
    ///
    /// `top_n` is clamped to `1..=10`. With `use_tta` on the primary model
    /// the configured number of TTA passes is averaged; otherwise one pass runs.
    ///
    /// # Errors
    /// - `ModelUnavailable` when no model is loaded
    /// - `Prediction` for inference failures or a wrongly sized image
    /// - `LabelMismatch` when the output width differs from the label count
    #[instrument(skip(self, image))]
    pub fn predict(
        &self,
        image: &NormalizedImage,
        top_n: usize,
        use_tta: bool,
    ) -> Result<PredictionResult> {
        let (model, labels) = self.loaded()?;
        let passes = if use_tta && self.supports_tta() {
            self.config.tta_passes
        } else {
            1
        };

        let probabilities = TtaEnsembler::new(passes)
            .ensemble(image, model, &mut self.rng())?
            .to_vec();
        if !TensorValidator::is_probability_distribution(&probabilities) {
            debug!("Model output is not a normalized probability distribution");
        }

        ResponseFormatter::format(&probabilities, labels, clamp_top_n(top_n))
    }

    /// Decode, normalize and classify one uploaded image
    ///
    /// # Errors
    /// - `ModelUnavailable` when no model is loaded
    /// - `UnsupportedFormat` / `Decode` for rejected uploads
    /// - Any error from [`Predictor::predict`]
    #[instrument(skip(self, bytes, options), fields(size = bytes.len()))]
    pub fn predict_bytes(
        &self,
        bytes: &[u8],
        filename: &str,
        options: &PredictOptions,
    ) -> Result<PredictionResponse> {
        let preview = PreviewOptions::full(self.config.preview.quality);
        let processing_options = ProcessingOptions {
            use_tta: options.use_tta && self.supports_tta(),
            top_n: clamp_top_n(options.top_n),
            enhance_image: Some(options.enhance_image),
        };
        self.predict_upload(bytes, filename, &preview, processing_options)
    }

    fn predict_upload(
        &self,
        bytes: &[u8],
        filename: &str,
        preview: &PreviewOptions,
        processing_options: ProcessingOptions,
    ) -> Result<PredictionResponse> {
        let (model, _) = self.loaded()?;

        let input = ImageNormalizer::normalize(bytes, filename, model.input_size(), preview)?;

        let inference_start = Instant::now();
        let result = self.predict(
            &input.image,
            processing_options.top_n,
            processing_options.use_tta,
        )?;
        let inference_ms = inference_start.elapsed().as_millis() as u64;

        debug!(
            inference_ms,
            top = result.top_prediction().map(|p| p.label.as_str()),
            "Prediction complete"
        );

        Ok(PredictionResponse {
            top_prediction: result.top_prediction().cloned(),
            result,
            original_image: input.preview,
            image_info: input.metadata,
            processing_options,
            model_type: model.kind(),
            inference_ms,
        })
    }

    /// Classify up to ten images, isolating per-item failures
    ///
    /// # Errors
    /// - `InvalidRequest` for an empty batch
    /// - `BatchTooLarge` for more than ten items, before any inference
    /// - `ModelUnavailable` when no model is loaded
    pub fn predict_batch(
        &self,
        items: Vec<BatchInput>,
        options: &BatchOptions,
    ) -> Result<BatchResponse> {
        self.predict_batch_with_progress(items, options, |_| {})
    }

    /// [`Predictor::predict_batch`], calling `on_item` after each item completes
    #[instrument(skip(self, items, options, on_item), fields(batch_size = items.len()))]
    pub fn predict_batch_with_progress<F>(
        &self,
        items: Vec<BatchInput>,
        options: &BatchOptions,
        mut on_item: F,
    ) -> Result<BatchResponse>
    where
        F: FnMut(&BatchItemResult),
    {
        if items.is_empty() {
            return Err(CropDxError::invalid_request("No images provided"));
        }
        if items.len() > MAX_BATCH_SIZE {
            return Err(CropDxError::BatchTooLarge {
                size: items.len(),
                max: MAX_BATCH_SIZE,
            });
        }
        self.loaded()?;

        let preview = PreviewOptions::thumbnail(
            self.config.preview.thumbnail_size,
            self.config.preview.thumbnail_quality,
        );
        let processing_options = ProcessingOptions {
            use_tta: options.use_tta && self.supports_tta(),
            top_n: clamp_top_n(options.top_n),
            enhance_image: None,
        };

        let mut results = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let outcome = item.payload.and_then(|bytes| {
                self.predict_upload(&bytes, &item.filename, &preview, processing_options)
            });

            let result = match outcome {
                Ok(prediction) => BatchItemResult::Success {
                    index,
                    prediction: Box::new(prediction),
                },
                Err(e) => {
                    warn!(index, filename = %item.filename, error = %e, "Batch item failed");
                    BatchItemResult::failure(index, item.filename, &e)
                },
            };
            on_item(&result);
            results.push(result);
        }

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        info!(
            processed = results.len(),
            succeeded,
            failed = results.len() - succeeded,
            "Batch complete"
        );

        Ok(BatchResponse {
            processed_count: results.len(),
            results,
            processing_options,
        })
    }

    /// Describe the loaded model
    ///
    /// # Errors
    /// - `ModelUnavailable` when no model is loaded
    pub fn model_info(&self) -> Result<ModelInfo> {
        let (model, labels) = self.loaded()?;
        Ok(ModelInfo {
            model_type: model.kind(),
            model_path: model.path().display().to_string(),
            backend: model.backend_name().to_string(),
            input_size: model.input_size(),
            size_bytes: model.size_bytes(),
            sha256: model.sha256().to_string(),
            supports_tta: self.supports_tta(),
            tta_passes: if self.supports_tta() {
                self.config.tta_passes
            } else {
                1
            },
            total_classes: labels.len(),
            classes_preview: labels.preview(CLASSES_PREVIEW_LEN),
        })
    }

    /// Availability snapshot for health checks
    #[must_use]
    pub fn health(&self) -> HealthStatus {
        let available = self.is_available();
        HealthStatus {
            status: if available { "healthy" } else { "degraded" }.to_string(),
            predictor_available: available,
            model_loaded: available,
            classes_loaded: self.class_count(),
            model_type: self
                .model_kind()
                .map_or_else(|| "none".to_string(), |kind| kind.to_string()),
            supports_tta: self.supports_tta(),
            error: self.load_error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::{uniform, MockBackendFactory};
    use std::path::PathBuf;

    struct Fixture {
        _dir: tempfile::TempDir,
        config: PredictorConfig,
    }

    fn fixture(primary: Option<&[u8]>, fallback: Option<&[u8]>, labels: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, bytes: &[u8]| -> PathBuf {
            let path = dir.path().join(name);
            std::fs::write(&path, bytes).unwrap();
            path
        };

        let primary_path = primary.map_or_else(
            || dir.path().join("missing_primary.onnx"),
            |bytes| write("primary.onnx", bytes),
        );
        let fallback_path = fallback.map(|bytes| write("fallback.onnx", bytes));
        let labels_path = write("labels.txt", labels.as_bytes());

        let config = PredictorConfig::builder()
            .primary_model(primary_path)
            .fallback_model(fallback_path)
            .labels(labels_path)
            .primary_input_size(8, 8)
            .fallback_input_size(6, 6)
            .tta_seed(Some(3))
            .build()
            .unwrap();

        Fixture { _dir: dir, config }
    }

    const LABELS: &str = "Apple___healthy\nTomato___Late_blight\nTomato___healthy\n";

    fn image(edge: usize) -> NormalizedImage {
        NormalizedImage::new(ndarray::Array3::from_elem((edge, edge, 3), 0.5)).unwrap()
    }

    #[test]
    fn test_loads_primary() {
        let f = fixture(Some(b"primary"), Some(b"fallback"), LABELS);
        let predictor = Predictor::load(f.config, &MockBackendFactory::new(vec![0.2, 0.7, 0.1]));

        assert!(predictor.is_available());
        assert_eq!(predictor.model_kind(), Some(ModelKind::Primary));
        assert!(predictor.supports_tta());
        assert_eq!(predictor.input_size(), Some((8, 8)));
        assert_eq!(predictor.class_count(), 3);

        let result = predictor.predict(&image(8), 2, true).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.predictions[0].label, "Tomato - Late blight");
    }

    #[test]
    fn test_missing_primary_uses_fallback() {
        let f = fixture(None, Some(b"fallback"), LABELS);
        let predictor = Predictor::load(f.config, &MockBackendFactory::new(uniform(3)));

        assert_eq!(predictor.model_kind(), Some(ModelKind::Fallback));
        assert!(!predictor.supports_tta());
        assert_eq!(predictor.input_size(), Some((6, 6)));
        assert_eq!(predictor.health().model_type, "fallback");
    }

    #[test]
    fn test_corrupt_primary_uses_fallback() {
        let f = fixture(Some(b"corrupt primary"), Some(b"fallback"), LABELS);
        let predictor = Predictor::load(f.config, &MockBackendFactory::new(uniform(3)));
        assert_eq!(predictor.model_kind(), Some(ModelKind::Fallback));
    }

    #[test]
    fn test_no_model_is_unavailable() {
        let f = fixture(None, None, LABELS);
        let predictor = Predictor::load(f.config, &MockBackendFactory::new(uniform(3)));

        assert!(!predictor.is_available());
        assert!(predictor.load_error().unwrap().contains("primary"));
        let err = predictor.predict(&image(8), 5, false).unwrap_err();
        assert!(matches!(err, CropDxError::ModelUnavailable(_)));
        assert_eq!(err.status_code(), 503);
        assert!(predictor.model_info().is_err());

        let health = predictor.health();
        assert_eq!(health.status, "degraded");
        assert!(!health.predictor_available);
        assert!(!health.model_loaded);
        assert_eq!(health.model_type, "none");
        assert_eq!(health.classes_loaded, 3);
    }

    #[test]
    fn test_label_count_mismatch_rejects_candidate() {
        let f = fixture(Some(b"primary"), None, LABELS);
        let predictor = Predictor::load(f.config, &MockBackendFactory::new(uniform(4)));
        assert!(!predictor.is_available());
        assert!(predictor.load_error().unwrap().contains("Label mismatch"));
    }

    #[test]
    fn test_batch_limits_checked_first() {
        let f = fixture(Some(b"primary"), None, LABELS);
        let predictor = Predictor::load(f.config, &MockBackendFactory::new(uniform(3)));

        let err = predictor
            .predict_batch(Vec::new(), &BatchOptions::default())
            .unwrap_err();
        assert!(matches!(err, CropDxError::InvalidRequest(_)));

        let items = (0..11)
            .map(|i| BatchInput::new(format!("leaf_{i}.png"), Vec::new()))
            .collect();
        let err = predictor
            .predict_batch(items, &BatchOptions::default())
            .unwrap_err();
        assert!(matches!(err, CropDxError::BatchTooLarge { size: 11, max: 10 }));
    }

    #[test]
    fn test_model_info() {
        let f = fixture(Some(b"primary"), None, LABELS);
        let predictor = Predictor::load(f.config, &MockBackendFactory::new(uniform(3)));
        let info = predictor.model_info().unwrap();

        assert_eq!(info.model_type, ModelKind::Primary);
        assert_eq!(info.backend, "mock");
        assert_eq!(info.total_classes, 3);
        assert_eq!(info.classes_preview.len(), 3);
        assert_eq!(info.tta_passes, 5);
        assert_eq!(info.size_bytes, 7);
    }
}
