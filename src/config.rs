//! Runtime configuration read from the environment (and `.env`).

use std::net::SocketAddr;
use std::str::FromStr;

use crate::inference::gemini::GEMINI_API_BASE;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} is not a valid value: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("{0} must be set for the selected backend")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierBackend {
    Heuristic,
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplainerBackend {
    Heuristic,
    TextModel,
    Multimodal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionBackend {
    None,
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplanationLength {
    Short,
    Long,
}

impl FromStr for ClassifierBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "heuristic" => Ok(Self::Heuristic),
            "remote" => Ok(Self::Remote),
            _ => Err(()),
        }
    }
}

impl FromStr for ExplainerBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "heuristic" => Ok(Self::Heuristic),
            "text-model" => Ok(Self::TextModel),
            "multimodal" => Ok(Self::Multimodal),
            _ => Err(()),
        }
    }
}

impl FromStr for CaptionBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "remote" => Ok(Self::Remote),
            _ => Err(()),
        }
    }
}

impl FromStr for ExplanationLength {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "short" => Ok(Self::Short),
            "long" | "longer" => Ok(Self::Long),
            _ => Err(()),
        }
    }
}

/// Hosted model ids and generation limits.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub hf_api_base: String,
    pub hf_api_token: Option<String>,
    pub classifier_model_id: String,
    pub vqa_model_id: String,
    pub caption_model_id: String,
    pub text_model_id: String,
    pub embed_model_id: String,
    pub caption_max_new_tokens: u32,
    pub text_max_new_tokens: u32,
    pub gemini_api_base: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub multimodal_max_new_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub body_limit_bytes: usize,
    pub classifier: ClassifierBackend,
    pub explainer: ExplainerBackend,
    pub caption: CaptionBackend,
    pub explanation_length: ExplanationLength,
    pub use_classifier_hint: bool,
    pub models: ModelConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let models = ModelConfig {
            hf_api_base: or("HF_API_BASE", "https://api-inference.huggingface.co")
                .trim_end_matches('/')
                .to_string(),
            hf_api_token: get("HF_API_TOKEN"),
            classifier_model_id: or(
                "CLASSIFIER_MODEL_ID",
                "pharmapsychotic/dermatology-disease-classifier",
            ),
            vqa_model_id: or("VQA_MODEL_ID", "Salesforce/blip-vqa-base"),
            caption_model_id: or("CAP_MODEL_ID1", "Salesforce/blip-image-captioning-base"),
            text_model_id: or("TEXT_MODEL_ID", "TinyLlama/TinyLlama-1.1B-Chat-v1.0"),
            embed_model_id: or("EMBED_MODEL_ID", "google/derm-foundation"),
            caption_max_new_tokens: typed(&get, "CAPTION_MAX_NEW_TOKENS", "128")?,
            text_max_new_tokens: typed(&get, "TEXT_MAX_NEW_TOKENS", "80")?,
            gemini_api_base: or("GEMINI_API_BASE", GEMINI_API_BASE),
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: or("GEMINI_MODEL", "gemini-2.5-flash"),
            multimodal_max_new_tokens: typed(&get, "MULTIMODAL_MAX_NEW_TOKENS", "200")?,
        };

        let config = Config {
            bind_addr: typed(&get, "BIND_ADDR", "127.0.0.1:5050")?,
            body_limit_bytes: typed(&get, "BODY_LIMIT_BYTES", "10485760")?,
            classifier: typed(&get, "CLASSIFIER_BACKEND", "heuristic")?,
            explainer: typed(&get, "EXPLAINER_BACKEND", "heuristic")?,
            caption: typed(&get, "CAPTION_BACKEND", "none")?,
            explanation_length: typed(&get, "EXPLANATION_LENGTH", "short")?,
            use_classifier_hint: typed(&get, "EXPLANATION_USE_CLASSIFIER_HINT", "false")?,
            models,
        };

        if config.explainer == ExplainerBackend::Multimodal && config.models.gemini_api_key.is_none()
        {
            return Err(ConfigError::Missing("GEMINI_API_KEY"));
        }

        Ok(config)
    }
}

fn typed<T: FromStr>(
    get: &dyn Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<T, ConfigError> {
    let value = get(key).unwrap_or_else(|| default.to_string());
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value })
}
