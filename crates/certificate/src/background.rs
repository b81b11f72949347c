//! Signature background removal
//!
//! A heuristic: the background color is estimated from the image corners
//! and pixels close to it become transparent. Photos of signatures on
//! uneven paper will not come out clean.

use crate::{CertificateError, Result};
use image::{DynamicImage, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Distance thresholds for background removal
///
/// Distances are Euclidean in 0-255 RGB space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundRemoval {
    /// Below this distance a pixel is fully transparent
    pub near: f64,
    /// From this distance on a pixel is fully opaque
    pub far: f64,
}

impl Default for BackgroundRemoval {
    fn default() -> Self {
        Self {
            near: 30.0,
            far: 80.0,
        }
    }
}

/// Remove the background of an encoded image with the default thresholds
///
/// Returns an RGBA PNG.
pub fn remove_background(image_bytes: &[u8]) -> Result<Vec<u8>> {
    BackgroundRemoval::default().apply(image_bytes)
}

impl BackgroundRemoval {
    /// Decode, remove the background and encode as RGBA PNG
    pub fn apply(&self, image_bytes: &[u8]) -> Result<Vec<u8>> {
        let mut rgba = decode_rgba(image_bytes)?;
        self.apply_to(&mut rgba);
        encode_png(rgba)
    }

    /// Rewrite the alpha channel of `image` in place
    pub fn apply_to(&self, image: &mut RgbaImage) {
        let Some(background) = estimate_background(image) else {
            return;
        };

        let span = self.far - self.near;

        for pixel in image.pixels_mut() {
            let distance = color_distance(pixel.0, background);

            pixel[3] = if distance < self.near {
                0
            } else if distance < self.far && span > 0.0 {
                (255.0 * (distance - self.near) / span).round() as u8
            } else {
                255
            };
        }
    }
}

/// Decode any supported image format into RGBA pixels
pub(crate) fn decode_rgba(image_bytes: &[u8]) -> Result<RgbaImage> {
    image::load_from_memory(image_bytes)
        .map(|decoded| decoded.to_rgba8())
        .map_err(|e| CertificateError::ImageDecode(e.to_string()))
}

pub(crate) fn encode_png(rgba: RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    DynamicImage::ImageRgba8(rgba)
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| CertificateError::ImageDecode(e.to_string()))?;
    Ok(buffer)
}

/// Side of the square corner patches used for sampling
fn patch_size(width: u32, height: u32) -> u32 {
    (width.min(height) / 20).clamp(1, 10)
}

/// Mean RGB of the four corner patches
///
/// Returns `None` for an empty image.
pub fn estimate_background(image: &RgbaImage) -> Option<[f64; 3]> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    let side = patch_size(width, height).min(width).min(height);
    let origins = [
        (0, 0),
        (width - side, 0),
        (0, height - side),
        (width - side, height - side),
    ];

    let mut sum = [0.0f64; 3];
    let mut count = 0usize;
    for (ox, oy) in origins {
        for y in oy..oy + side {
            for x in ox..ox + side {
                let pixel = image.get_pixel(x, y);
                for (channel, total) in sum.iter_mut().enumerate() {
                    *total += pixel[channel] as f64;
                }
                count += 1;
            }
        }
    }

    Some(sum.map(|total| total / count as f64))
}

fn color_distance(pixel: [u8; 4], background: [f64; 3]) -> f64 {
    (0..3)
        .map(|channel| {
            let diff = pixel[channel] as f64 - background[channel];
            diff * diff
        })
        .sum::<f64>()
        .sqrt()
}
