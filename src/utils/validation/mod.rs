//! Consolidated validation utilities

pub mod path;
pub mod tensor;

pub use path::PathValidator;
pub use tensor::TensorValidator;
