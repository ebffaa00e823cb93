//! Shared fixtures for integration tests
//!
//! Provides a counting mock backend, a factory that builds it, and temporary
//! model/label files so the full predictor can run without a real ONNX model.

#![allow(dead_code)]

use cropdx::{
    BackendFactory, BackendType, CropDxError, InferenceBackend, PredictorConfig, Result,
};
use image::{ImageFormat, Rgb, RgbImage};
use ndarray::{Array2, Array4};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

pub const LABELS: &str = "\
Apple___Apple_scab
Apple___healthy
Tomato___Late_blight
Tomato___healthy
";

pub const CLASS_COUNT: usize = 4;

/// What the counting backend returns
#[derive(Debug, Clone)]
pub enum Output {
    Fixed(Vec<f32>),
    /// Class 0 scores the mean pixel value; other classes share the rest
    Brightness,
}

#[derive(Debug)]
pub struct CountingBackend {
    output: Output,
    input_size: (u32, u32),
    calls: Arc<AtomicUsize>,
}

impl InferenceBackend for CountingBackend {
    fn name(&self) -> &'static str {
        "counting-mock"
    }

    fn infer(&self, input: &Array4<f32>) -> Result<Array2<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (_, height, width, _) = self.input_shape();
        if input.dim() != (1, height, width, 3) {
            return Err(CropDxError::prediction(format!(
                "Unexpected input shape {:?}",
                input.dim()
            )));
        }

        let row = match &self.output {
            Output::Fixed(values) => values.clone(),
            Output::Brightness => {
                let mean = input.mean().unwrap_or(0.0);
                let rest = (1.0 - mean) / (CLASS_COUNT - 1) as f32;
                let mut row = vec![rest; CLASS_COUNT];
                row[0] = mean;
                row
            },
        };
        let classes = row.len();
        Array2::from_shape_vec((1, classes), row).map_err(|e| CropDxError::prediction(e.to_string()))
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        (1, self.input_size.1 as usize, self.input_size.0 as usize, 3)
    }

    fn num_classes(&self) -> Option<usize> {
        match &self.output {
            Output::Fixed(values) => Some(values.len()),
            Output::Brightness => Some(CLASS_COUNT),
        }
    }
}

/// Builds [`CountingBackend`]s that share one call counter
///
/// Model bytes starting with `corrupt` fail to load.
#[derive(Debug, Clone)]
pub struct CountingFactory {
    output: Output,
    calls: Arc<AtomicUsize>,
    loads: Arc<AtomicUsize>,
}

impl CountingFactory {
    pub fn new(output: Output) -> Self {
        Self {
            output,
            calls: Arc::new(AtomicUsize::new(0)),
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn fixed(values: &[f32]) -> Self {
        Self::new(Output::Fixed(values.to_vec()))
    }

    /// Total `infer` calls across all created backends
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of backends successfully created
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl BackendFactory for CountingFactory {
    fn create_backend(
        &self,
        _backend_type: BackendType,
        model_bytes: &[u8],
        input_size: (u32, u32),
    ) -> Result<Box<dyn InferenceBackend>> {
        if model_bytes.starts_with(b"corrupt") {
            return Err(CropDxError::model("corrupt test model"));
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingBackend {
            output: self.output.clone(),
            input_size,
            calls: Arc::clone(&self.calls),
        }))
    }

    fn available_backends(&self) -> Vec<BackendType> {
        vec![BackendType::Tract]
    }
}

/// Temporary model and label files plus a config pointing at them
pub struct Fixture {
    pub dir: TempDir,
    pub config: PredictorConfig,
}

/// Write fixtures; `None` leaves the corresponding model file missing
pub fn fixture(primary: Option<&[u8]>, fallback: Option<&[u8]>) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let write = |name: &str, bytes: &[u8]| -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    };

    let primary_path = primary.map_or_else(
        || dir.path().join("best_model_advanced.onnx"),
        |bytes| write("best_model_advanced.onnx", bytes),
    );
    let fallback_path = fallback.map(|bytes| write("plant_disease_model.onnx", bytes));
    let labels_path = write("class_names.txt", LABELS.as_bytes());

    let config = PredictorConfig::builder()
        .primary_model(primary_path)
        .fallback_model(fallback_path)
        .labels(labels_path)
        .primary_input_size(16, 16)
        .fallback_input_size(12, 12)
        .tta_seed(Some(42))
        .build()
        .unwrap();

    Fixture { dir, config }
}

/// Encode an image as bytes in `format`
pub fn encode(image: &RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, format).unwrap();
    buffer.into_inner()
}

/// Solid-color PNG
pub fn solid_png(width: u32, height: u32, value: u8) -> Vec<u8> {
    encode(
        &RgbImage::from_pixel(width, height, Rgb([value, value, value])),
        ImageFormat::Png,
    )
}

/// PNG with a diagonal gradient
pub fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        let v = ((x + y) * 255 / (width + height).max(1)) as u8;
        Rgb([v, v / 2, 255 - v])
    });
    encode(&image, ImageFormat::Png)
}
