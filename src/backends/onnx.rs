//! ONNX Runtime backend implementation for plant disease classifiers
//!
//! Uses ONNX Runtime on the CPU execution provider. The session is guarded by
//! a mutex because running it needs exclusive access.

use crate::error::{CropDxError, Result};
use crate::inference::InferenceBackend;
use crate::utils::TensorValidator;
use instant::Instant;
use ndarray::{Array2, Array4};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::sync::Mutex;

/// ONNX Runtime backend holding one classifier session
#[derive(Debug)]
pub struct OnnxBackend {
    session: Mutex<Session>,
    input_size: (u32, u32),
}

impl OnnxBackend {
    /// Create a session from serialized ONNX bytes
    ///
    /// # Errors
    /// - Session builder or optimization failures
    /// - Bytes are not a valid ONNX graph
    pub fn from_bytes(model_bytes: &[u8], input_size: (u32, u32)) -> Result<Self> {
        let load_start = Instant::now();
        let intra_threads = std::thread::available_parallelism()
            .map(std::num::NonZero::get)
            .unwrap_or(1);

        let session = Session::builder()
            .map_err(|e| CropDxError::model(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| CropDxError::model(format!("Failed to set optimization level: {e}")))?
            .with_intra_threads(intra_threads)
            .map_err(|e| CropDxError::model(format!("Failed to set intra threads: {e}")))?
            .commit_from_memory(model_bytes)
            .map_err(|e| {
                CropDxError::model(format!("Failed to create session from model data: {e}"))
            })?;

        log::info!(
            "ONNX Runtime session created in {:.2}ms ({intra_threads} intra-op threads)",
            load_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(Self {
            session: Mutex::new(session),
            input_size,
        })
    }
}

impl InferenceBackend for OnnxBackend {
    fn name(&self) -> &'static str {
        "onnx"
    }

    fn infer(&self, input: &Array4<f32>) -> Result<Array2<f32>> {
        TensorValidator::validate_input_shape(input, self.input_shape())?;

        let inference_start = Instant::now();
        let input_value = Value::from_array(input.clone())
            .map_err(|e| CropDxError::prediction(format!("Failed to convert input tensor: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| CropDxError::prediction("ONNX session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| CropDxError::prediction(format!("ONNX inference failed: {e}")))?;

        // Positional access avoids depending on exported tensor names
        let keys: Vec<_> = outputs.keys().collect();
        let first_key = keys
            .first()
            .ok_or_else(|| CropDxError::prediction("No output tensors found"))?;
        let output = outputs
            .get(first_key)
            .ok_or_else(|| CropDxError::prediction("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| CropDxError::prediction(format!("Failed to extract output tensor: {e}")))?;

        let classes = match output.shape() {
            [1, classes] | [classes] => *classes,
            shape => {
                return Err(CropDxError::prediction(format!(
                    "Expected output shape [1, C], got {shape:?}"
                )))
            },
        };
        let probabilities = Array2::from_shape_vec((1, classes), output.iter().copied().collect())
            .map_err(|e| CropDxError::prediction(format!("Failed to reshape output: {e}")))?;

        log::debug!(
            "ONNX inference completed in {:.2}ms",
            inference_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(probabilities)
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        let (width, height) = self.input_size;
        (1, height as usize, width as usize, 3)
    }

    fn num_classes(&self) -> Option<usize> {
        None
    }
}
