//! Image classifier backends behind the `/detect` and `/api/analyze` routes.

use image::DynamicImage;

use crate::config::{ClassifierBackend, ModelConfig};
use crate::imaging::{self, Prediction};
use crate::inference::{HfClient, InferenceError, LabelScore};

pub enum Classifier {
    /// Redness heuristic, no network.
    Heuristic,
    Remote { client: HfClient, model: String },
}

impl Classifier {
    pub fn from_config(backend: ClassifierBackend, models: &ModelConfig) -> Self {
        match backend {
            ClassifierBackend::Heuristic => Classifier::Heuristic,
            ClassifierBackend::Remote => Classifier::Remote {
                client: HfClient::from_config(models),
                model: models.classifier_model_id.clone(),
            },
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Classifier::Heuristic => "redness-heuristic",
            Classifier::Remote { model, .. } => model,
        }
    }

    /// Top label and its score in 0..1.
    pub async fn predict(&self, img: &DynamicImage) -> Result<Prediction, InferenceError> {
        match self {
            Classifier::Heuristic => Ok(imaging::predict_skin_condition(img)),
            Classifier::Remote { client, model } => {
                top_prediction(client.classify_image(model, img).await?)
            }
        }
    }
}

fn top_prediction(ranked: Vec<LabelScore>) -> Result<Prediction, InferenceError> {
    ranked
        .into_iter()
        .next()
        .map(|top| Prediction {
            label: top.label,
            score: top.score,
        })
        .ok_or_else(|| InferenceError::Malformed("Invalid response from model.".to_string()))
}
