//! Operation handlers

use super::{
    request::{BatchPredictRequest, PredictRequest},
    response::ApiResponse,
};
use crate::{
    config::MAX_BATCH_SIZE,
    error::{CropDxError, Result},
    processor::{BatchInput, Predictor},
    services::ImageIOService,
    types::{BatchResponse, HealthStatus, ModelInfo, PredictionResponse},
    utils::PathValidator,
};
use tracing::instrument;

/// Classify one base64-encoded image
///
/// Availability is checked first, then the filename, then the payload.
#[instrument(skip_all, fields(filename = %request.filename))]
pub fn handle_predict(
    predictor: &Predictor,
    request: &PredictRequest,
) -> ApiResponse<PredictionResponse> {
    if let Err(e) = ensure_available(predictor) {
        return ApiResponse::from_error(&e);
    }
    if request.image.trim().is_empty() {
        return ApiResponse::from_error(&CropDxError::invalid_request("No image provided"));
    }

    PathValidator::validate_filename(&request.filename)
        .and_then(|_| ImageIOService::decode_base64_payload(&request.image))
        .and_then(|bytes| predictor.predict_bytes(&bytes, &request.filename, &request.options()))
        .into()
}

/// Classify up to ten base64-encoded images
///
/// Items with a missing payload, a disallowed filename or undecodable base64
/// are reported inline at their index. The filename is checked before the
/// payload is decoded. Only whole-batch problems produce an error envelope.
#[instrument(skip_all, fields(batch_size = request.images.len()))]
pub fn handle_batch_predict(
    predictor: &Predictor,
    request: BatchPredictRequest,
) -> ApiResponse<BatchResponse> {
    if let Err(e) = ensure_available(predictor) {
        return ApiResponse::from_error(&e);
    }
    if request.images.len() > MAX_BATCH_SIZE {
        return ApiResponse::from_error(&CropDxError::BatchTooLarge {
            size: request.images.len(),
            max: MAX_BATCH_SIZE,
        });
    }

    let options = request.options();
    let items = request
        .images
        .iter()
        .enumerate()
        .map(|(index, image)| {
            let filename = image.filename_or_default(index);
            let payload = match image.image.as_deref().map(str::trim) {
                Some(payload) if !payload.is_empty() => payload,
                _ => {
                    return BatchInput::rejected(
                        filename,
                        CropDxError::invalid_request(format!(
                            "No image data provided for item {index}"
                        )),
                    )
                },
            };
            match PathValidator::validate_filename(&filename)
                .and_then(|_| ImageIOService::decode_base64_payload(payload))
            {
                Ok(bytes) => BatchInput::new(filename, bytes),
                Err(e) => BatchInput::rejected(filename, e),
            }
        })
        .collect();

    predictor.predict_batch(items, &options).into()
}

/// Report availability; `None` means the predictor has not been constructed
///
/// A predictor without a loaded model answers 503 with the degraded status
/// still attached.
pub fn handle_health(predictor: Option<&Predictor>) -> ApiResponse<HealthStatus> {
    match predictor {
        Some(predictor) if predictor.is_available() => ApiResponse::ok(predictor.health()),
        Some(predictor) => ApiResponse::unavailable(predictor.health()),
        None => ApiResponse::unavailable(HealthStatus {
            status: "degraded".to_string(),
            predictor_available: false,
            model_loaded: false,
            classes_loaded: 0,
            model_type: "none".to_string(),
            supports_tta: false,
            error: Some("Predictor not initialized".to_string()),
        }),
    }
}

fn ensure_available(predictor: &Predictor) -> Result<()> {
    if predictor.is_available() {
        return Ok(());
    }
    Err(CropDxError::model_unavailable(format!(
        "Prediction service unavailable: {}",
        predictor.load_error().unwrap_or("no model loaded")
    )))
}

/// Describe the loaded model
pub fn handle_model_info(predictor: &Predictor) -> ApiResponse<ModelInfo> {
    predictor.model_info().into()
}
