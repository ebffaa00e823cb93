//! Service layer
//!
//! Stateless helpers that keep payload handling and response shaping out of
//! the predictor.

pub mod format;
pub mod io;

pub use format::ResponseFormatter;
pub use io::ImageIOService;
