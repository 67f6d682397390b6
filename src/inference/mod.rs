//! Thin clients for the hosted models the service delegates to.

pub mod gemini;
pub mod hf;

use std::future::Future;

use base64::{engine::general_purpose, Engine as _};
use image::DynamicImage;
use serde::Deserialize;

pub use gemini::GeminiClient;
pub use hf::{HfClient, HfVision};

/// Characters of a response body kept in logs and errors.
const LOG_BODY_CHARS: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("unexpected response: {0}")]
    Malformed(String),
    #[error("could not encode image: {0}")]
    Encode(#[from] image::ImageError),
}

/// One entry of an image classifier's ranked output.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

/// Visual question answering plus captioning over a decoded photo.
pub trait VisionModel {
    fn answer(
        &self,
        image: &DynamicImage,
        question: &str,
    ) -> impl Future<Output = Result<String, InferenceError>> + Send;

    fn caption(
        &self,
        image: &DynamicImage,
    ) -> impl Future<Output = Result<String, InferenceError>> + Send;
}

/// Re-encode as RGB JPEG, quality 85, for upload to a remote model.
pub fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>, InferenceError> {
    let mut jpeg_bytes = Vec::new();
    DynamicImage::ImageRgb8(img.to_rgb8()).write_to(
        &mut std::io::Cursor::new(&mut jpeg_bytes),
        image::ImageOutputFormat::Jpeg(85),
    )?;
    Ok(jpeg_bytes)
}

pub fn encode_jpeg_base64(img: &DynamicImage) -> Result<String, InferenceError> {
    Ok(general_purpose::STANDARD.encode(encode_jpeg(img)?))
}

pub(crate) fn truncate_for_log(body: &str) -> String {
    body.chars().take(LOG_BODY_CHARS).collect()
}
