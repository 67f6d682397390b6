//! Hosted inference API client (Hugging Face Inference API shape):
//! `POST {base}/models/{model_id}` with an optional bearer token.

use image::DynamicImage;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{encode_jpeg, encode_jpeg_base64, truncate_for_log, InferenceError, LabelScore, VisionModel};
use crate::config::ModelConfig;

const CAPTION_NUM_BEAMS: u32 = 3;
const TEXT_REPETITION_PENALTY: f32 = 1.05;

#[derive(Deserialize)]
struct GeneratedText {
    #[serde(default)]
    generated_text: String,
}

#[derive(Deserialize)]
struct VqaAnswer {
    answer: String,
}

/// Feature-extraction output: a single vector, or one row per input.
#[derive(Deserialize)]
#[serde(untagged)]
enum FeatureVector {
    Flat(Vec<f32>),
    Rows(Vec<Vec<f32>>),
}

#[derive(Clone)]
pub struct HfClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HfClient {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn from_config(models: &ModelConfig) -> Self {
        Self::new(&models.hf_api_base, models.hf_api_token.clone())
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}", self.base_url, model)
    }

    fn post(&self, model: &str) -> RequestBuilder {
        let req = self.http.post(self.endpoint(model));
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        model: &str,
        req: RequestBuilder,
    ) -> Result<T, InferenceError> {
        debug!(model, "Calling hosted model");
        let response = req.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(model, %status, body = %truncate_for_log(&body), "Hosted model replied");

        if !status.is_success() {
            return Err(InferenceError::Api {
                status: status.as_u16(),
                body: truncate_for_log(&body),
            });
        }
        serde_json::from_str(&body).map_err(|e| InferenceError::Malformed(e.to_string()))
    }

    /// Ranked labels for the photo, best first.
    pub async fn classify_image(
        &self,
        model: &str,
        img: &DynamicImage,
    ) -> Result<Vec<LabelScore>, InferenceError> {
        let req = self
            .post(model)
            .header("Content-Type", "application/octet-stream")
            .body(encode_jpeg(img)?);
        self.send(model, req).await
    }

    /// Image embedding from a feature-extraction model, flattened.
    pub async fn embed_image(
        &self,
        model: &str,
        img: &DynamicImage,
    ) -> Result<Vec<f32>, InferenceError> {
        let req = self
            .post(model)
            .header("Content-Type", "application/octet-stream")
            .body(encode_jpeg(img)?);
        into_embedding(self.send(model, req).await?)
    }

    pub async fn image_to_text(
        &self,
        model: &str,
        img: &DynamicImage,
        max_new_tokens: u32,
    ) -> Result<String, InferenceError> {
        let payload = json!({
            "inputs": encode_jpeg_base64(img)?,
            "parameters": {
                "max_new_tokens": max_new_tokens,
                "num_beams": CAPTION_NUM_BEAMS,
            }
        });
        let out: Vec<GeneratedText> = self.send(model, self.post(model).json(&payload)).await?;
        first_generated_text(out)
    }

    pub async fn visual_question(
        &self,
        model: &str,
        img: &DynamicImage,
        question: &str,
    ) -> Result<String, InferenceError> {
        let payload = json!({
            "inputs": {
                "image": encode_jpeg_base64(img)?,
                "question": question,
            }
        });
        let out: Vec<VqaAnswer> = self.send(model, self.post(model).json(&payload)).await?;
        out.into_iter()
            .next()
            .map(|a| a.answer)
            .ok_or_else(|| InferenceError::Malformed("empty answer list".to_string()))
    }

    /// Greedy completion; the returned text includes the prompt.
    pub async fn text_generation(
        &self,
        model: &str,
        prompt: &str,
        max_new_tokens: u32,
    ) -> Result<String, InferenceError> {
        let payload = json!({
            "inputs": prompt,
            "parameters": {
                "max_new_tokens": max_new_tokens,
                "do_sample": false,
                "repetition_penalty": TEXT_REPETITION_PENALTY,
                "return_full_text": true,
            }
        });
        let out: Vec<GeneratedText> = self.send(model, self.post(model).json(&payload)).await?;
        first_generated_text(out)
    }
}

fn first_generated_text(out: Vec<GeneratedText>) -> Result<String, InferenceError> {
    out.into_iter()
        .next()
        .map(|g| g.generated_text)
        .ok_or_else(|| InferenceError::Malformed("empty generation list".to_string()))
}

fn into_embedding(out: FeatureVector) -> Result<Vec<f32>, InferenceError> {
    let embedding: Vec<f32> = match out {
        FeatureVector::Flat(v) => v,
        FeatureVector::Rows(rows) => rows.into_iter().flatten().collect(),
    };
    if embedding.is_empty() {
        return Err(InferenceError::Malformed("empty embedding".to_string()));
    }
    Ok(embedding)
}

/// VQA and captioning models served by the hosted API.
#[derive(Clone)]
pub struct HfVision {
    client: HfClient,
    vqa_model: String,
    caption_model: String,
    max_new_tokens: u32,
}

impl HfVision {
    pub fn from_config(models: &ModelConfig) -> Self {
        Self {
            client: HfClient::from_config(models),
            vqa_model: models.vqa_model_id.clone(),
            caption_model: models.caption_model_id.clone(),
            max_new_tokens: models.caption_max_new_tokens,
        }
    }
}

impl VisionModel for HfVision {
    async fn answer(&self, image: &DynamicImage, question: &str) -> Result<String, InferenceError> {
        self.client
            .visual_question(&self.vqa_model, image, question)
            .await
    }

    async fn caption(&self, image: &DynamicImage) -> Result<String, InferenceError> {
        self.client
            .image_to_text(&self.caption_model, image, self.max_new_tokens)
            .await
    }
}
