//! Image preparation for the OCR passes.
//!
//! Phone photos of labels arrive in arbitrary orientation and size. Both
//! passes start from the same decoded, EXIF-corrected frame:
//! - full pass: the frame as-is, re-encoded as PNG
//! - bottom pass: the lower half, upscaled, grayscaled and binarized with a
//!   Gaussian adaptive threshold so small sticker print survives OCR

use std::borrow::Cow;
use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage, ImageOutputFormat, Luma};
use tracing::debug;

use super::ScanError;

// ═══════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════

/// Maximum accepted upload, matching the HTTP body limit.
pub const MAX_IMAGE_BYTES: usize = 25 * 1024 * 1024; // 25 MB

/// Minimum valid image size in bytes (smallest valid PNG is ~67 bytes).
const MIN_IMAGE_BYTES: usize = 67;

// ═══════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════

/// Tuning for the bottom-half pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PassConfig {
    /// Upscale applied to the cropped lower half.
    pub upscale_factor: f32,
    /// Longest side allowed after upscaling. Large crops get a smaller factor.
    pub max_upscaled_dimension: u32,
    /// Gaussian sigma for the local mean. 2.0 approximates an 11x11 window.
    pub threshold_sigma: f32,
    /// Constant subtracted from the local mean (C).
    pub threshold_offset: i16,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            upscale_factor: 3.0,
            max_upscaled_dimension: 6000,
            threshold_sigma: 2.0,
            threshold_offset: 2,
        }
    }
}

/// PNG inputs for one scan.
#[derive(Debug)]
pub struct PreparedPasses {
    pub full_png: Vec<u8>,
    /// Present only when the bottom pass was requested.
    pub bottom_png: Option<Vec<u8>>,
    pub width: u32,
    pub height: u32,
}

// ═══════════════════════════════════════════════════════════
// Entry point
// ═══════════════════════════════════════════════════════════

/// Validate, decode and orient `image_bytes`, then encode the pass inputs.
pub fn prepare_passes(
    image_bytes: &[u8],
    with_bottom: bool,
    config: &PassConfig,
) -> Result<PreparedPasses, ScanError> {
    let img = decode_oriented(image_bytes)?;
    let (width, height) = img.dimensions();

    let full_png = encode_png(&img)?;
    let bottom_png = if with_bottom {
        Some(encode_png(&DynamicImage::ImageLuma8(bottom_half_pass(
            &img, config,
        )))?)
    } else {
        None
    };

    debug!(
        dimensions = format!("{width}x{height}"),
        full_png = full_png.len(),
        bottom_png = bottom_png.as_ref().map(Vec::len).unwrap_or(0),
        "Image prepared for OCR"
    );

    Ok(PreparedPasses {
        full_png,
        bottom_png,
        width,
        height,
    })
}

/// Validate byte length, decode, and apply the EXIF orientation.
pub fn decode_oriented(image_bytes: &[u8]) -> Result<DynamicImage, ScanError> {
    validate_image_bytes(image_bytes)?;
    let img = image::load_from_memory(image_bytes)
        .map_err(|e| ScanError::ImageProcessing(format!("Failed to decode image: {e}")))?;
    Ok(apply_orientation(img, read_exif_orientation(image_bytes)))
}

// ═══════════════════════════════════════════════════════════
// Bottom-half pass
// ═══════════════════════════════════════════════════════════

/// Crop the lower half, upscale, grayscale and threshold.
pub fn bottom_half_pass(img: &DynamicImage, config: &PassConfig) -> GrayImage {
    let (w, h) = img.dimensions();
    let top = h / 2;
    let crop = img.crop_imm(0, top, w, (h - top).max(1)).to_luma8();

    let scale = upscale_for(&crop, config);
    let new_w = ((crop.width() as f32 * scale).round() as u32).max(1);
    let new_h = ((crop.height() as f32 * scale).round() as u32).max(1);
    let upscaled = image::imageops::resize(&crop, new_w, new_h, FilterType::CatmullRom);

    adaptive_threshold(&upscaled, config.threshold_sigma, config.threshold_offset)
}

/// Effective upscale: the configured factor, reduced so the longest side
/// stays within `max_upscaled_dimension`. Never below 1.0.
fn upscale_for(crop: &GrayImage, config: &PassConfig) -> f32 {
    let longest = crop.width().max(crop.height()).max(1) as f32;
    let cap = config.max_upscaled_dimension as f32 / longest;
    let scale = config.upscale_factor.min(cap).max(1.0);
    if scale < config.upscale_factor {
        debug!(
            requested = config.upscale_factor,
            applied = scale,
            "Capping bottom-pass upscale"
        );
    }
    scale
}

/// Binarize against a Gaussian-weighted local mean.
///
/// A pixel becomes white when it is brighter than `mean - offset`, black
/// otherwise. Uniform regions therefore come out white.
pub fn adaptive_threshold(gray: &GrayImage, sigma: f32, offset: i16) -> GrayImage {
    let local_mean = local_mean(gray, sigma);
    let mut out = GrayImage::new(gray.width(), gray.height());
    for (x, y, pixel) in gray.enumerate_pixels() {
        let mean = local_mean.get_pixel(x, y)[0] as i16;
        let value = if pixel[0] as i16 > mean - offset { 255 } else { 0 };
        out.put_pixel(x, y, Luma([value]));
    }
    out
}

fn local_mean(gray: &GrayImage, sigma: f32) -> Cow<'_, GrayImage> {
    if sigma <= 0.0 {
        return Cow::Borrowed(gray);
    }
    Cow::Owned(image::imageops::blur(gray, sigma))
}

// ═══════════════════════════════════════════════════════════
// Pure helper functions
// ═══════════════════════════════════════════════════════════

/// Validate image bytes before decoding.
pub fn validate_image_bytes(bytes: &[u8]) -> Result<(), ScanError> {
    if bytes.len() < MIN_IMAGE_BYTES {
        return Err(ScanError::ImageProcessing(
            "Image data too small to be valid".into(),
        ));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ScanError::ImageProcessing(format!(
            "Image data exceeds {}MB limit",
            MAX_IMAGE_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

/// Read EXIF orientation tag from raw image bytes.
/// Returns 1 (normal) if no EXIF data or tag not present.
pub fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let reader = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(r) => r,
        Err(_) => return 1,
    };

    reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

/// Rotate/flip per EXIF orientation (1..=8). Unknown values are identity.
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Encode as PNG. Pass inputs are transient, default compression is fine.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, ScanError> {
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, ImageOutputFormat::Png)
        .map_err(|e| ScanError::ImageProcessing(format!("PNG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}
