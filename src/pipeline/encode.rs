//! Image normalisation: section bitmap → bounded, JPEG-encoded transport form.
//!
//! Vision APIs bill and rate-limit by image size, and a 2000-row slice
//! of a 100 DPI page carries far more pixels than the model needs to read it.
//! Each section is therefore fitted into a fixed bounding box (never
//! upscaled), flattened to RGB, and JPEG-encoded at a fixed quality with
//! optimised Huffman tables. The encoded size is then bounded by the box
//! area, independent of the source.

use crate::error::TranscribeError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use jpeg_encoder::{ColorType, Encoder};
use tracing::debug;

pub const JPEG_MIME: &str = "image/jpeg";

/// The size-bounded transport form of one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSection {
    /// 1-based page number.
    pub page_num: usize,
    /// 0-based section index within the page.
    pub index: usize,
    pub width: u32,
    pub height: u32,
    /// Compressed image bytes.
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

impl EncodedSection {
    /// Base64 text of the image bytes, as embedded in request bodies.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

/// Dimensions of `(width, height)` after fitting into `(max_w, max_h)`.
///
/// Preserves aspect ratio up to integer truncation and never upscales.
pub fn fit_within(width: u32, height: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if width <= max_w && height <= max_h {
        return (width, height);
    }
    let (w, h, max_w, max_h) = (width as u64, height as u64, max_w as u64, max_h as u64);
    // Whichever side has the tighter ratio lands exactly on its bound.
    let (fw, fh) = if max_w * h <= max_h * w {
        (max_w, h * max_w / w)
    } else {
        (w * max_h / h, max_h)
    };
    (fw.max(1) as u32, fh.max(1) as u32)
}

/// Resize, flatten and JPEG-encode one section.
///
/// # Errors
/// [`TranscribeError::InvalidImage`] for a zero-area bitmap,
/// [`TranscribeError::ImageEncode`] if the encoder rejects the image.
pub fn encode_section(
    img: &DynamicImage,
    page_num: usize,
    index: usize,
    max_size: (u32, u32),
    quality: u8,
) -> Result<EncodedSection, TranscribeError> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(TranscribeError::InvalidImage {
            page: page_num,
            section: index,
            detail: format!("bitmap has zero area ({width}×{height})"),
        });
    }

    let (target_w, target_h) = fit_within(width, height, max_size.0, max_size.1);
    let rgb = if (target_w, target_h) == (width, height) {
        img.to_rgb8()
    } else {
        img.resize_exact(target_w, target_h, FilterType::Triangle)
            .to_rgb8()
    };

    let encode_error = |detail: String| TranscribeError::ImageEncode {
        page: page_num,
        section: index,
        detail,
    };
    let (jpeg_w, jpeg_h) = match (u16::try_from(target_w), u16::try_from(target_h)) {
        (Ok(w), Ok(h)) => (w, h),
        _ => {
            return Err(encode_error(format!(
                "{target_w}×{target_h} exceeds the JPEG limit of 65535 px per side"
            )))
        }
    };

    let mut bytes = Vec::new();
    let mut encoder = Encoder::new(&mut bytes, quality);
    encoder.set_optimized_huffman_tables(true);
    encoder
        .encode(rgb.as_raw(), jpeg_w, jpeg_h, ColorType::Rgb)
        .map_err(|e| encode_error(e.to_string()))?;

    debug!(
        "Page {} section {}: {}x{} → {}x{} JPEG, {} bytes",
        page_num,
        index,
        width,
        height,
        target_w,
        target_h,
        bytes.len()
    );

    Ok(EncodedSection {
        page_num,
        index,
        width: target_w,
        height: target_h,
        bytes,
        mime_type: JPEG_MIME,
    })
}
