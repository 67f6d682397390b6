//! Google Gemini `generateContent` client for instruction-tuned multimodal
//! generation.

use image::DynamicImage;
use serde_json::Value;
use tracing::debug;

use super::{encode_jpeg_base64, truncate_for_log, InferenceError};
use crate::config::ModelConfig;

pub(crate) const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model,
            base_url: GEMINI_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// `None` when no API key is configured.
    pub fn from_config(models: &ModelConfig) -> Option<Self> {
        models.gemini_api_key.clone().map(|key| {
            Self::new(key, models.gemini_model.clone()).with_base_url(&models.gemini_api_base)
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    pub async fn generate(
        &self,
        system: &str,
        prompt: &str,
        image: Option<&DynamicImage>,
        max_output_tokens: u32,
    ) -> Result<String, InferenceError> {
        let mut parts = vec![serde_json::json!({ "text": prompt })];
        if let Some(img) = image {
            parts.push(serde_json::json!({
                "inline_data": {
                    "mime_type": "image/jpeg",
                    "data": encode_jpeg_base64(img)?
                }
            }));
        }

        let payload = serde_json::json!({
            "systemInstruction": { "parts": [{ "text": system }] },
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": { "maxOutputTokens": max_output_tokens }
        });

        debug!(model = %self.model, with_image = image.is_some(), "Sending request to Gemini");

        let response = self
            .http
            .post(self.url())
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;
        debug!(%status, body = %truncate_for_log(&response_text), "Gemini replied");

        if !status.is_success() {
            return Err(InferenceError::Api {
                status: status.as_u16(),
                body: truncate_for_log(&response_text),
            });
        }

        let result: Value = serde_json::from_str(&response_text)
            .map_err(|e| InferenceError::Malformed(e.to_string()))?;
        extract_text(&result)
            .ok_or_else(|| InferenceError::Malformed("no text in response".to_string()))
    }
}

fn extract_text(result: &Value) -> Option<String> {
    result["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .map(|s| s.to_string())
}
