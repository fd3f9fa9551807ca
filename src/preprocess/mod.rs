//! Turn raw triage input (free text, vitals, optional image) into the
//! normalized form the classifier and the model consume.

pub mod prompt;
pub mod sanitize;
pub mod vision;

pub use prompt::build_triage_prompt;
pub use sanitize::{normalize_text, MAX_INPUT_CHARS};
pub use vision::{decode_image, try_decode_image, DecodedImage, MAX_IMAGE_PIXELS, MAX_MODEL_DIMENSION};

use thiserror::Error;

use crate::models::Vitals;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreprocessError {
    #[error("Image is not valid base64: {0}")]
    InvalidBase64(String),

    #[error("Unsupported or corrupt image: {0}")]
    UnsupportedImage(String),

    #[error("Image too large ({0} bytes), maximum is 20 MB")]
    ImageTooLarge(usize),

    #[error("Image dimensions {width}x{height} exceed the pixel limit")]
    ImageDimensions { width: u32, height: u32 },

    #[error("Failed to re-encode image: {0}")]
    Encoding(String),
}

/// Everything downstream needs from one triage submission.
#[derive(Debug, Clone)]
pub struct PreparedInput {
    pub text: String,
    pub vitals: Vitals,
    pub prompt: String,
    pub image: Option<DecodedImage>,
}

impl PreparedInput {
    /// Base64 PNGs for an Ollama `images` field.
    pub fn images(&self) -> Vec<String> {
        self.image
            .iter()
            .map(|img| img.png_base64.clone())
            .collect()
    }
}

/// Normalize text, decode the image and build the prompt.
pub fn prepare(text: &str, vitals: &Vitals, image_base64: Option<&str>) -> PreparedInput {
    let text = normalize_text(text);
    let prompt = build_triage_prompt(&text, vitals);
    let image = decode_image(image_base64);

    tracing::debug!(
        text_chars = text.chars().count(),
        has_image = image.is_some(),
        "Triage input prepared"
    );

    PreparedInput {
        text,
        vitals: *vitals,
        prompt,
        image,
    }
}
