//! Filename and path validation utilities
//!
//! Provides the extension allow-list check that runs before any image bytes
//! are decoded.

use crate::error::{CropDxError, Result};
use std::path::Path;

/// Extensions accepted for uploaded images
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "tiff", "webp"];

/// Validator for filenames and file system paths
pub struct PathValidator;

impl PathValidator {
    /// Lower-cased text after the last `.`, if any
    #[must_use]
    pub fn extension_of(filename: &str) -> Option<String> {
        filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }

    /// Check if a filename has an allowed image extension
    #[must_use]
    pub fn is_allowed_filename(filename: &str) -> bool {
        Self::extension_of(filename).is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
    }

    /// Validate a filename against the allow-list, returning its extension
    ///
    /// # Errors
    /// - `UnsupportedFormat` when the name has no extension or a disallowed one
    pub fn validate_filename(filename: &str) -> Result<String> {
        match Self::extension_of(filename) {
            Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(ext),
            Some(ext) => Err(CropDxError::unsupported_format(format!(
                "'{filename}' has extension '{ext}'. Please upload PNG, JPG, JPEG, GIF, BMP, TIFF, or WebP files"
            ))),
            None => Err(CropDxError::unsupported_format(format!(
                "'{filename}' has no file extension. Please upload PNG, JPG, JPEG, GIF, BMP, TIFF, or WebP files"
            ))),
        }
    }

    /// Validate that a file exists
    pub fn validate_file_exists<P: AsRef<Path>>(path: P) -> Result<()> {
        let path_ref = path.as_ref();
        if !path_ref.is_file() {
            return Err(CropDxError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File does not exist: {}", path_ref.display()),
            )));
        }
        Ok(())
    }
}
