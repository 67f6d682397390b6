//! Explanation backends: the local heuristic paragraph, a text-only LLM, or
//! an instruction-tuned multimodal model.

use image::DynamicImage;
use tracing::warn;

use crate::compose;
use crate::config::{ConfigError, ExplainerBackend, ExplanationLength, ModelConfig};
use crate::imaging::Prediction;
use crate::inference::{GeminiClient, HfClient};

const TEXT_PROMPT_PREAMBLE: &str = "You are a careful dermatologist. Be concise and non-diagnostic. \
     List most likely causes, self-care, and red flags for in-person care.";

const ANSWER_MARKER: &str = "Answer:";

const TEXT_ONLY_PHOTO_NOTE: &str =
    "\n\nNote: A photo was provided, but this explanation is text-only.";

const MULTIMODAL_SYSTEM: &str = "You are a careful dermatologist assistant.";
const MULTIMODAL_REQUEST: &str = "Describe key features and provide non-diagnostic guidance.";

pub enum Explainer {
    Heuristic {
        length: ExplanationLength,
    },
    TextModel {
        client: HfClient,
        model: String,
        max_new_tokens: u32,
    },
    Multimodal {
        client: GeminiClient,
        max_new_tokens: u32,
    },
}

impl Explainer {
    pub fn from_config(
        backend: ExplainerBackend,
        length: ExplanationLength,
        models: &ModelConfig,
    ) -> Result<Self, ConfigError> {
        Ok(match backend {
            ExplainerBackend::Heuristic => Explainer::Heuristic { length },
            ExplainerBackend::TextModel => Explainer::TextModel {
                client: HfClient::from_config(models),
                model: models.text_model_id.clone(),
                max_new_tokens: models.text_max_new_tokens,
            },
            ExplainerBackend::Multimodal => Explainer::Multimodal {
                client: GeminiClient::from_config(models)
                    .ok_or(ConfigError::Missing("GEMINI_API_KEY"))?,
                max_new_tokens: models.multimodal_max_new_tokens,
            },
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Explainer::Heuristic { .. } => "heuristic",
            Explainer::TextModel { model, .. } => model,
            Explainer::Multimodal { client, .. } => client.model(),
        }
    }

    /// Model failures are folded into the returned text so the rest of the
    /// response still goes out.
    pub async fn explain(
        &self,
        img: Option<&DynamicImage>,
        symptom_text: &str,
        hint: Option<&Prediction>,
    ) -> String {
        match self {
            Explainer::Heuristic { length } => {
                compose::analyze_symptoms(img, symptom_text, hint, *length)
            }
            Explainer::TextModel {
                client,
                model,
                max_new_tokens,
            } => {
                let text = symptom_text.trim();
                if text.is_empty() && img.is_none() {
                    return String::new();
                }
                let prompt = text_prompt(text);
                let mut answer = match client.text_generation(model, &prompt, *max_new_tokens).await {
                    Ok(generated) => extract_answer(&generated),
                    Err(e) => {
                        warn!("Text model failed: {e}");
                        return format!("(text-only model unavailable: {e})");
                    }
                };
                if img.is_some() {
                    answer.push_str(TEXT_ONLY_PHOTO_NOTE);
                }
                answer
            }
            Explainer::Multimodal {
                client,
                max_new_tokens,
            } => {
                let prompt = multimodal_prompt(symptom_text.trim());
                match client
                    .generate(MULTIMODAL_SYSTEM, &prompt, img, *max_new_tokens)
                    .await
                {
                    Ok(answer) => answer.trim().to_string(),
                    Err(e) => {
                        warn!("Multimodal model failed: {e}");
                        format!("(multimodal model unavailable: {e})")
                    }
                }
            }
        }
    }
}

fn text_prompt(symptoms: &str) -> String {
    format!("{TEXT_PROMPT_PREAMBLE}\nSymptoms: {symptoms}\n{ANSWER_MARKER}")
}

fn multimodal_prompt(symptoms: &str) -> String {
    if symptoms.is_empty() {
        MULTIMODAL_REQUEST.to_string()
    } else {
        format!("{MULTIMODAL_REQUEST}\nReported symptoms: {symptoms}")
    }
}

/// Text after the first answer marker, which closes the prompt; the whole
/// output when there is none.
fn extract_answer(generated: &str) -> String {
    generated
        .split_once(ANSWER_MARKER)
        .map_or(generated, |(_, answer)| answer)
        .trim()
        .to_string()
}
