//! Image normalization for model input
//!
//! Turns raw upload bytes into the fixed-size `[0, 1]` tensor the classifier
//! was trained on, plus a JPEG preview and source metadata.

use crate::{
    error::{CropDxError, Result},
    types::{ImageMetadata, NormalizedImage},
    utils::validation::PathValidator,
};
use base64::Engine;
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, ColorType, DynamicImage, ImageFormat, RgbImage};
use ndarray::Array3;

/// Resampling filter used for model input; must match the training pipeline
pub const RESIZE_FILTER: FilterType = FilterType::Lanczos3;

/// Fixed pixel scale between `u8` and the model's float range
pub const PIXEL_SCALE: f32 = 255.0;

/// How the display copy of the image is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewOptions {
    /// Resize to exactly this `(width, height)` before encoding; `None` keeps the original size
    pub size: Option<(u32, u32)>,
    /// JPEG quality (1-100)
    pub quality: u8,
}

impl PreviewOptions {
    /// Full-size preview used for single-image requests
    #[must_use]
    pub fn full(quality: u8) -> Self {
        Self {
            size: None,
            quality,
        }
    }

    /// Square thumbnail used for batch items
    #[must_use]
    pub fn thumbnail(edge: u32, quality: u8) -> Self {
        Self {
            size: Some((edge, edge)),
            quality,
        }
    }
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self::full(95)
    }
}

/// Output of [`ImageNormalizer::normalize`]
#[derive(Debug, Clone)]
pub struct NormalizedInput {
    pub image: NormalizedImage,
    /// JPEG preview as a `data:image/jpeg;base64,` URL
    pub preview: String,
    pub metadata: ImageMetadata,
}

/// Decoder and normalizer for uploaded images
pub struct ImageNormalizer;

impl ImageNormalizer {
    /// Decode, validate and normalize one uploaded image
    ///
    /// The filename is checked against the extension allow-list before any
    /// byte is decoded.
    ///
    /// # Arguments
    /// * `bytes` - Raw encoded image data
    /// * `filename` - Client-supplied filename, used for the extension check
    /// * `target_size` - Model input `(width, height)`
    /// * `preview` - Preview encoding options
    ///
    /// # Errors
    /// - `UnsupportedFormat` for a disallowed extension
    /// - `Decode` when the bytes are not a recognizable image
    pub fn normalize(
        bytes: &[u8],
        filename: &str,
        target_size: (u32, u32),
        preview: &PreviewOptions,
    ) -> Result<NormalizedInput> {
        PathValidator::validate_filename(filename)?;

        let (image, format) = Self::decode(bytes)?;
        let metadata = ImageMetadata {
            format: format_name(format),
            mode: color_mode(image.color()).to_string(),
            size: (image.width(), image.height()),
            filename: filename.to_string(),
        };

        let rgb = image.into_rgb8();
        let preview = Self::encode_preview(&rgb, preview)?;
        let image = Self::to_tensor(&rgb, target_size)?;

        Ok(NormalizedInput {
            image,
            preview,
            metadata,
        })
    }

    /// Decode bytes, returning the image and its sniffed container format
    pub fn decode(bytes: &[u8]) -> Result<(DynamicImage, ImageFormat)> {
        if bytes.is_empty() {
            return Err(CropDxError::decode("Image data is empty"));
        }
        let format = image::guess_format(bytes)
            .map_err(|e| CropDxError::decode(format!("Unrecognized image data: {e}")))?;
        let image = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| CropDxError::decode(format!("Failed to decode {format:?} image: {e}")))?;
        Ok((image, format))
    }

    /// Resize an RGB image to the target size and scale it into `[0, 1]`
    pub fn to_tensor(rgb: &RgbImage, target_size: (u32, u32)) -> Result<NormalizedImage> {
        let (target_width, target_height) = target_size;
        if target_width == 0 || target_height == 0 {
            return Err(CropDxError::invalid_config(format!(
                "Invalid target size {target_width}x{target_height}"
            )));
        }

        let resized = if rgb.dimensions() == target_size {
            rgb.clone()
        } else {
            image::imageops::resize(rgb, target_width, target_height, RESIZE_FILTER)
        };

        let data = Array3::from_shape_fn(
            (target_height as usize, target_width as usize, 3),
            |(y, x, c)| {
                let pixel = resized.get_pixel(x as u32, y as u32);
                f32::from(pixel.0[c]) / PIXEL_SCALE
            },
        );

        Ok(NormalizedImage::from_clamped(data))
    }

    /// Re-encode an RGB image as a JPEG data URL
    pub fn encode_preview(rgb: &RgbImage, options: &PreviewOptions) -> Result<String> {
        let resized;
        let source = match options.size {
            Some((width, height)) if rgb.dimensions() != (width, height) => {
                resized = image::imageops::resize(rgb, width, height, RESIZE_FILTER);
                &resized
            },
            _ => rgb,
        };

        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, options.quality.clamp(1, 100))
            .encode_image(source)
            .map_err(|e| CropDxError::prediction(format!("Failed to encode preview: {e}")))?;

        Ok(format!(
            "data:image/jpeg;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&buffer)
        ))
    }
}

/// Display name for a container format, `JPEG` when unknown
fn format_name(format: ImageFormat) -> String {
    match format {
        ImageFormat::Png => "PNG".to_string(),
        ImageFormat::Jpeg => "JPEG".to_string(),
        ImageFormat::Gif => "GIF".to_string(),
        ImageFormat::Bmp => "BMP".to_string(),
        ImageFormat::Tiff => "TIFF".to_string(),
        ImageFormat::WebP => "WEBP".to_string(),
        other => other
            .extensions_str()
            .first()
            .map_or_else(|| "JPEG".to_string(), |ext| ext.to_ascii_uppercase()),
    }
}

/// Color mode name in the conventional short form (`RGB`, `RGBA`, `L`, ...)
fn color_mode(color: ColorType) -> &'static str {
    match color {
        ColorType::L8 => "L",
        ColorType::La8 => "LA",
        ColorType::Rgb8 => "RGB",
        ColorType::Rgba8 => "RGBA",
        ColorType::L16 => "I;16",
        ColorType::La16 => "LA;16",
        ColorType::Rgb16 => "RGB;16",
        ColorType::Rgba16 => "RGBA;16",
        ColorType::Rgb32F => "RGB;F",
        ColorType::Rgba32F => "RGBA;F",
        _ => "UNKNOWN",
    }
}
