//! Tract backend implementation for plant disease classifiers
//!
//! Runs ONNX classifier graphs with Tract, a pure Rust inference engine with
//! no native dependencies. The graph is specialized to a fixed NHWC input
//! shape at load time so Tract can fully optimize it.

use crate::error::{CropDxError, Result};
use crate::inference::InferenceBackend;
use crate::utils::TensorValidator;
use instant::Instant;
use ndarray::{Array2, Array4};
use tract_onnx::prelude::*;

/// Type alias for the optimized, runnable Tract plan
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract backend holding one optimized classifier graph
#[derive(Debug)]
pub struct TractBackend {
    model: TractModel,
    input_size: (u32, u32),
    num_classes: Option<usize>,
}

impl TractBackend {
    /// Parse and optimize an ONNX model for a `(1, height, width, 3)` input
    ///
    /// # Errors
    /// - Bytes are not a valid ONNX graph
    /// - The graph cannot be specialized to the requested input shape
    pub fn from_bytes(model_bytes: &[u8], input_size: (u32, u32)) -> Result<Self> {
        let load_start = Instant::now();
        let (width, height) = input_size;

        log::debug!(
            "Creating Tract model from {} bytes of ONNX data ({width}x{height} input)",
            model_bytes.len()
        );

        let optimized = onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .map_err(|e| CropDxError::model(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, f32::fact([1, height as usize, width as usize, 3]).into())
            .map_err(|e| CropDxError::model(format!("Failed to set input shape: {e}")))?
            .into_optimized()
            .map_err(|e| CropDxError::model(format!("Failed to optimize model: {e}")))?;

        let num_classes = optimized
            .output_fact(0)
            .ok()
            .and_then(|fact| fact.shape.as_concrete().map(<[usize]>::to_vec))
            .and_then(|dims| dims.last().copied());

        let model = optimized
            .into_runnable()
            .map_err(|e| CropDxError::model(format!("Failed to create runnable model: {e}")))?;

        log::info!(
            "Tract backend initialized in {:.2}ms ({} classes)",
            load_start.elapsed().as_secs_f64() * 1000.0,
            num_classes.map_or_else(|| "dynamic".to_string(), |n| n.to_string())
        );

        Ok(Self {
            model,
            input_size,
            num_classes,
        })
    }
}

impl InferenceBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn infer(&self, input: &Array4<f32>) -> Result<Array2<f32>> {
        TensorValidator::validate_input_shape(input, self.input_shape())?;

        let inference_start = Instant::now();
        let contiguous = input.as_standard_layout();
        let data = contiguous
            .as_slice()
            .ok_or_else(|| CropDxError::prediction("Input tensor is not contiguous"))?;
        let tensor = Tensor::from_shape(input.shape(), data)
            .map_err(|e| CropDxError::prediction(format!("Failed to build input tensor: {e}")))?;

        let outputs = self
            .model
            .run(tvec![tensor.into()])
            .map_err(|e| CropDxError::prediction(format!("Tract inference failed: {e}")))?;

        let output = outputs
            .first()
            .ok_or_else(|| CropDxError::prediction("No output tensor found"))?;
        let values = output
            .as_slice::<f32>()
            .map_err(|e| CropDxError::prediction(format!("Failed to read output tensor: {e}")))?;

        let classes = match output.shape() {
            [1, classes] | [classes] => *classes,
            shape => {
                return Err(CropDxError::prediction(format!(
                    "Expected output shape [1, C], got {shape:?}"
                )))
            },
        };

        let probabilities = Array2::from_shape_vec((1, classes), values.to_vec())
            .map_err(|e| CropDxError::prediction(format!("Failed to reshape output: {e}")))?;

        log::debug!(
            "Tract inference completed in {:.2}ms",
            inference_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(probabilities)
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        let (width, height) = self.input_size;
        (1, height as usize, width as usize, 3)
    }

    fn num_classes(&self) -> Option<usize> {
        self.num_classes
    }
}
