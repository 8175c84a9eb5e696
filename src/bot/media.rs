//! Photo preprocessing before upload to the model.

use crate::config::{IMAGE_JPEG_QUALITY, IMAGE_MAX_DIMENSION};
use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;

/// Downscales a photo so its longest edge fits `IMAGE_MAX_DIMENSION` and
/// re-encodes it as JPEG. Aspect ratio is preserved.
///
/// # Errors
///
/// Returns an error if the bytes are not a decodable image or JPEG
/// encoding fails.
pub fn downscale_to_jpeg(bytes: &[u8]) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes).context("failed to decode photo")?;
    let img = if img.width() > IMAGE_MAX_DIMENSION || img.height() > IMAGE_MAX_DIMENSION {
        img.thumbnail(IMAGE_MAX_DIMENSION, IMAGE_MAX_DIMENSION)
    } else {
        img
    };

    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, IMAGE_JPEG_QUALITY);
    encoder
        .encode_image(&rgb)
        .context("failed to encode JPEG")?;
    Ok(out)
}
