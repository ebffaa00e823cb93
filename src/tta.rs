//! Test-time augmentation
//!
//! The ensembler evaluates the model on the unmodified image plus
//! `passes - 1` randomly perturbed copies and averages the probability
//! vectors element-wise. Each perturbation is a rotation and zoom about the
//! image center, sampled with reflect padding, followed by a brightness gain.

use crate::{
    error::Result,
    models::ModelHandle,
    types::NormalizedImage,
};
use ndarray::{Array1, Array3};
use rand::Rng;
use tracing::{debug, instrument};

/// Maximum absolute rotation in degrees
pub const MAX_ROTATION_DEGREES: f32 = 15.0;

/// Brightness gain range
pub const BRIGHTNESS_RANGE: (f32, f32) = (0.8, 1.2);

/// Zoom factor range
pub const ZOOM_RANGE: (f32, f32) = (0.9, 1.1);

/// One sampled augmentation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Perturbation {
    pub rotation_degrees: f32,
    pub brightness: f32,
    pub zoom: f32,
}

impl Perturbation {
    /// The no-op perturbation
    pub const IDENTITY: Self = Self {
        rotation_degrees: 0.0,
        brightness: 1.0,
        zoom: 1.0,
    };

    /// Draw a perturbation uniformly from the configured ranges
    pub fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            rotation_degrees: rng.random_range(-MAX_ROTATION_DEGREES..=MAX_ROTATION_DEGREES),
            brightness: rng.random_range(BRIGHTNESS_RANGE.0..=BRIGHTNESS_RANGE.1),
            zoom: rng.random_range(ZOOM_RANGE.0..=ZOOM_RANGE.1),
        }
    }

    /// Apply to an image, producing a new image of the same size in `[0, 1]`
    #[must_use]
    pub fn apply(&self, image: &NormalizedImage) -> NormalizedImage {
        let source = image.data();
        let (height, width, channels) = source.dim();

        let theta = self.rotation_degrees.to_radians();
        let (sin, cos) = theta.sin_cos();
        let center_x = (width as f32 - 1.0) / 2.0;
        let center_y = (height as f32 - 1.0) / 2.0;

        let mut output = Array3::<f32>::zeros((height, width, channels));
        for y in 0..height {
            for x in 0..width {
                let dx = x as f32 - center_x;
                let dy = y as f32 - center_y;
                // Inverse mapping: output pixel -> source coordinate
                let src_x = center_x + self.zoom * (cos * dx + sin * dy);
                let src_y = center_y + self.zoom * (-sin * dx + cos * dy);

                for c in 0..channels {
                    let value = bilinear(source, src_x, src_y, c) * self.brightness;
                    output[[y, x, c]] = value.clamp(0.0, 1.0);
                }
            }
        }

        NormalizedImage::from_clamped(output)
    }
}

/// Reflect an out-of-range index back into `0..len` (`d c b a | a b c d | d c b a`, edge repeated)
fn reflect(index: i64, len: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    let len = len as i64;
    let period = 2 * len;
    let m = index.rem_euclid(period);
    (if m < len { m } else { period - 1 - m }) as usize
}

fn bilinear(source: &Array3<f32>, x: f32, y: f32, channel: usize) -> f32 {
    let (height, width, _) = source.dim();
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let sample = |xi: i64, yi: i64| source[[reflect(yi, height), reflect(xi, width), channel]];

    let top = sample(x0, y0) * (1.0 - fx) + sample(x0 + 1, y0) * fx;
    let bottom = sample(x0, y0 + 1) * (1.0 - fx) + sample(x0 + 1, y0 + 1) * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Averages model outputs over perturbed copies of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtaEnsembler {
    passes: usize,
}

impl TtaEnsembler {
    /// Create an ensembler running `passes` evaluations (at least one)
    #[must_use]
    pub fn new(passes: usize) -> Self {
        Self {
            passes: passes.max(1),
        }
    }

    #[must_use]
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Ensemble predictions for one image
    ///
    /// Pass 1 always uses the unmodified image. With a single pass the
    /// baseline output is returned as-is.
    ///
    /// # Errors
    /// - Any pass failing inference
    #[instrument(skip(self, image, model, rng), fields(passes = self.passes))]
    pub fn ensemble<R: Rng + ?Sized>(
        &self,
        image: &NormalizedImage,
        model: &ModelHandle,
        rng: &mut R,
    ) -> Result<Array1<f32>> {
        let baseline = model.infer(image)?;
        if self.passes == 1 {
            return Ok(baseline);
        }

        let mut sum = baseline;
        for pass in 2..=self.passes {
            let perturbation = Perturbation::sample(rng);
            debug!(
                pass,
                rotation = perturbation.rotation_degrees,
                brightness = perturbation.brightness,
                zoom = perturbation.zoom,
                "TTA pass"
            );
            let output = model.infer(&perturbation.apply(image))?;
            sum += &output;
        }

        Ok(sum / self.passes as f32)
    }
}
