//! Request layer
//!
//! Typed request and response records for the single-image, batch, health
//! and model-info operations, plus the handlers that drive a [`Predictor`].
//! Transport (HTTP, CLI, ...) is up to the caller: handlers take decoded
//! request records and return an [`ApiResponse`] envelope carrying the
//! status code to send.
//!
//! [`Predictor`]: crate::Predictor

pub mod handlers;
pub mod request;
pub mod response;

pub use handlers::{handle_batch_predict, handle_health, handle_model_info, handle_predict};
pub use request::{BatchImage, BatchPredictRequest, PredictRequest};
pub use response::ApiResponse;
