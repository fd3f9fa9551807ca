use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::imageops::FilterType;
use image::io::Reader as ImageReader;
use image::{DynamicImage, ImageOutputFormat, RgbImage};

use super::PreprocessError;

/// Upper bound on decoded upload size.
const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// Smallest valid PNG is ~67 bytes.
const MIN_IMAGE_BYTES: usize = 67;

/// Largest declared width × height accepted before decoding.
pub const MAX_IMAGE_PIXELS: u64 = 24_000_000;

/// Longest side sent to the model (MedGemma's vision encoder works at 896px).
pub const MAX_MODEL_DIMENSION: u32 = 896;

/// A decoded upload, normalized to RGB and re-encoded as PNG for Ollama.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// Standard base64 PNG, ready for an Ollama `images` entry.
    pub png_base64: String,
}

/// Decode an uploaded image. Empty input is `None`; malformed input is
/// logged (without content) and also yields `None`.
pub fn decode_image(encoded: Option<&str>) -> Option<DecodedImage> {
    match try_decode_image(encoded) {
        Ok(image) => image,
        Err(e) => {
            tracing::warn!(error = %e, "Discarding unreadable image upload");
            None
        }
    }
}

pub fn try_decode_image(encoded: Option<&str>) -> Result<Option<DecodedImage>, PreprocessError> {
    let Some(raw) = encoded.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    let payload = strip_data_uri(raw);
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| PreprocessError::InvalidBase64(e.to_string()))?;
    validate_size(&bytes)?;
    validate_dimensions(&bytes)?;

    let decoded = image::load_from_memory(&bytes)
        .map_err(|e| PreprocessError::UnsupportedImage(e.to_string()))?;
    let rgb = fit_within(decoded.to_rgb8(), MAX_MODEL_DIMENSION);
    let (width, height) = rgb.dimensions();

    let mut png = Vec::new();
    DynamicImage::ImageRgb8(rgb)
        .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
        .map_err(|e| PreprocessError::Encoding(e.to_string()))?;

    tracing::debug!(width, height, png_bytes = png.len(), "Image normalized for model input");

    Ok(Some(DecodedImage {
        width,
        height,
        png_base64: STANDARD.encode(png),
    }))
}

/// `data:image/png;base64,AAAA` → `AAAA`.
fn strip_data_uri(raw: &str) -> &str {
    match raw.find("base64,") {
        Some(pos) => &raw[pos + "base64,".len()..],
        None => raw,
    }
}

fn validate_size(bytes: &[u8]) -> Result<(), PreprocessError> {
    if bytes.len() < MIN_IMAGE_BYTES {
        return Err(PreprocessError::UnsupportedImage(format!(
            "image data too small ({} bytes)",
            bytes.len()
        )));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(PreprocessError::ImageTooLarge(bytes.len()));
    }
    Ok(())
}

/// Read only the header and reject images whose pixel buffer would be too large.
fn validate_dimensions(bytes: &[u8]) -> Result<(), PreprocessError> {
    let (width, height) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| PreprocessError::UnsupportedImage(e.to_string()))?
        .into_dimensions()
        .map_err(|e| PreprocessError::UnsupportedImage(e.to_string()))?;

    if u64::from(width) * u64::from(height) > MAX_IMAGE_PIXELS {
        return Err(PreprocessError::ImageDimensions { width, height });
    }
    Ok(())
}

/// Downscale so the longest side is at most `max_dim`, keeping aspect ratio.
fn fit_within(img: RgbImage, max_dim: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    let largest = w.max(h);
    if largest <= max_dim {
        return img;
    }

    let scale = max_dim as f32 / largest as f32;
    let new_w = ((w as f32 * scale).round() as u32).max(1);
    let new_h = ((h as f32 * scale).round() as u32).max(1);
    image::imageops::resize(&img, new_w, new_h, FilterType::Triangle)
}
