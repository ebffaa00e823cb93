//! Image payload I/O service
//!
//! Reads raw image bytes from files, async readers and base64 request
//! payloads. Decoding into pixels is left to the normalizer.

use crate::{
    error::{CropDxError, Result},
    utils::PathValidator,
};
use base64::Engine;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Service for obtaining raw image bytes
pub struct ImageIOService;

impl ImageIOService {
    /// Decode a base64 image payload
    ///
    /// Accepts bare base64 or a `data:<mime>;base64,` URL; everything up to
    /// the first comma is treated as the URL header.
    ///
    /// # Errors
    /// - `InvalidRequest` for an empty payload or invalid base64
    pub fn decode_base64_payload(payload: &str) -> Result<Vec<u8>> {
        let encoded = match payload.split_once(',') {
            Some((header, data)) if header.starts_with("data:") => data,
            Some(_) => {
                return Err(CropDxError::invalid_request(
                    "Image payload contains a ',' but is not a data URL",
                ))
            },
            None => payload,
        };

        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Err(CropDxError::invalid_request("Image payload is empty"));
        }

        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| CropDxError::invalid_request(format!("Invalid base64 image data: {e}")))
    }

    /// Read an image file, returning its bytes and file name
    ///
    /// # Errors
    /// - File missing, not a regular file, or unreadable
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<(Vec<u8>, String)> {
        let path = path.as_ref();
        PathValidator::validate_file_exists(path)?;
        let bytes = std::fs::read(path).map_err(|e| {
            CropDxError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read image '{}': {e}", path.display()),
            ))
        })?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok((bytes, filename))
    }

    /// Drain an async reader into memory
    pub async fn read_all<R: AsyncRead + Unpin>(mut reader: R) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        Ok(bytes)
    }
}
