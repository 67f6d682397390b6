//! HTTP surface: upload page, `/detect`, `/api/analyze` and a health check.

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use image::DynamicImage;
use serde::Serialize;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::caption;
use crate::classify::Classifier;
use crate::config::{CaptionBackend, Config, ConfigError};
use crate::error::AppError;
use crate::explain::Explainer;
use crate::inference::HfVision;

const RECOMMENDATION: &str = "Please consult a dermatologist for confirmation.";

pub struct AppState {
    pub classifier: Classifier,
    pub explainer: Explainer,
    pub vision: Option<HfVision>,
    pub use_classifier_hint: bool,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            classifier: Classifier::from_config(config.classifier, &config.models),
            explainer: Explainer::from_config(
                config.explainer,
                config.explanation_length,
                &config.models,
            )?,
            vision: match config.caption {
                CaptionBackend::None => None,
                CaptionBackend::Remote => Some(HfVision::from_config(&config.models)),
            },
            use_classifier_hint: config.use_classifier_hint,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub disease: Option<String>,
    pub accuracy: Option<f32>,
    pub symptom_analysis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_caption: Option<String>,
    pub processing_time_ms: u128,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub condition: String,
    /// Percent, 0..100.
    pub confidence: f32,
    pub recommendation: &'static str,
}

pub fn router(state: Arc<AppState>, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/detect", post(detect))
        .route("/api/analyze", post(analyze))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    AppError::Internal(detail).into_response()
}

/// Uploaded photo bytes, present only when the part carried a file name.
async fn read_file_part(field: axum::extract::multipart::Field<'_>) -> Result<Option<Bytes>, AppError> {
    let named = field.file_name().is_some_and(|n| !n.is_empty());
    let data = field.bytes().await?;
    Ok(named.then_some(data))
}

fn decode_image(data: &[u8]) -> Result<DynamicImage, AppError> {
    image::load_from_memory(data)
        .map_err(|e| AppError::BadRequest(format!("Could not read image: {e}")))
}

async fn detect(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<DetectResponse>, AppError> {
    let start = Instant::now();
    info!("HIT /detect");

    let mut file = None;
    let mut symptom_text = String::new();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                if let Some(data) = read_file_part(field).await? {
                    file = Some(data);
                }
            }
            Some("symptom") => symptom_text = field.text().await?,
            _ => {}
        }
    }
    let symptom_text = symptom_text.trim();
    let has_text = !symptom_text.is_empty();

    if file.is_none() && !has_text {
        return Err(AppError::BadRequest(
            "Provide an image or write symptoms.".to_string(),
        ));
    }

    let img = file.as_deref().map(decode_image).transpose()?;

    let prediction = match &img {
        Some(img) => Some(state.classifier.predict(img).await?),
        None => None,
    };

    let symptom_analysis = if has_text {
        let hint = prediction.as_ref().filter(|_| state.use_classifier_hint);
        Some(
            state
                .explainer
                .explain(img.as_ref(), symptom_text, hint)
                .await,
        )
    } else {
        None
    };

    let image_caption = match (&state.vision, &img) {
        (Some(vision), Some(img)) => caption::caption_image(vision, img).await,
        _ => None,
    };

    let (disease, accuracy) = match prediction {
        Some(p) => (Some(p.label), Some(p.score)),
        None => (None, None),
    };

    Ok(Json(DetectResponse {
        disease,
        accuracy,
        symptom_analysis,
        image_caption,
        processing_time_ms: start.elapsed().as_millis(),
    }))
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, AppError> {
    info!("Request received on /api/analyze");

    let mut file = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("image") {
            if let Some(data) = read_file_part(field).await? {
                file = Some(data);
            }
        }
    }
    let data = file.ok_or_else(|| AppError::BadRequest("No image provided.".to_string()))?;
    let img = decode_image(&data)?;
    let top = state.classifier.predict(&img).await?;

    Ok(Json(AnalyzeResponse {
        condition: top.label,
        confidence: top.score * 100.0,
        recommendation: RECOMMENDATION,
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "OK" }))
}

async fn index() -> Html<&'static str> {
    Html(
        r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Skin Check</title>
    <style>
        * {
            margin: 0;
            padding: 0;
            box-sizing: border-box;
        }

        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, Cantarell, sans-serif;
            background: linear-gradient(135deg, #e8a49c 0%, #8c5e8f 100%);
            min-height: 100vh;
            display: flex;
            align-items: center;
            justify-content: center;
            padding: 20px;
        }

        .container {
            background: white;
            border-radius: 20px;
            box-shadow: 0 20px 60px rgba(0,0,0,0.3);
            max-width: 800px;
            width: 100%;
            padding: 40px;
        }

        h1 {
            color: #333;
            margin-bottom: 10px;
            font-size: 2em;
        }

        .subtitle {
            color: #666;
            margin-bottom: 30px;
            font-size: 0.9em;
        }

        label {
            display: block;
            color: #8c5e8f;
            font-weight: 600;
            margin: 20px 0 8px;
        }

        textarea {
            width: 100%;
            min-height: 100px;
            border: 2px solid #e0d0e0;
            border-radius: 10px;
            padding: 12px;
            font: inherit;
        }

        button {
            margin-top: 20px;
            background: #8c5e8f;
            color: white;
            border: none;
            border-radius: 20px;
            padding: 12px 28px;
            font-weight: 600;
            cursor: pointer;
        }

        button:disabled {
            opacity: 0.6;
            cursor: wait;
        }

        .result {
            background: #fbf6fb;
            border-radius: 10px;
            padding: 20px;
            margin-top: 30px;
            line-height: 1.6;
            color: #333;
        }

        .hidden {
            display: none;
        }

        .disclaimer {
            margin-top: 30px;
            color: #999;
            font-size: 0.8em;
        }
    </style>
</head>
<body>
    <div class="container">
        <h1>Skin Check</h1>
        <p class="subtitle">Upload a photo and/or describe your symptoms for a non-diagnostic explanation.</p>

        <form id="input-form">
            <label for="image-input">Photo</label>
            <input type="file" id="image-input" accept="image/*">

            <label for="symptom-input">Symptoms</label>
            <textarea id="symptom-input" placeholder="e.g. itchy, scaly patches on both elbows for two months"></textarea>

            <button type="submit" id="submit-btn">Analyze</button>
        </form>

        <p id="loading" class="hidden">Analyzing...</p>
        <div id="result-container" class="result hidden"></div>

        <p class="disclaimer">This tool does not provide a diagnosis. See a clinician for any concern.</p>
    </div>

    <script>
        const form = document.getElementById('input-form');
        const fileInput = document.getElementById('image-input');
        const symptomInput = document.getElementById('symptom-input');
        const submitBtn = document.getElementById('submit-btn');
        const loading = document.getElementById('loading');
        const resultContainer = document.getElementById('result-container');

        function showLoading(on) {
            loading.classList.toggle('hidden', !on);
            submitBtn.disabled = on;
        }

        function escapeHtml(s) {
            const div = document.createElement('div');
            div.textContent = s;
            return div.innerHTML;
        }

        function renderResults(data) {
            let html = '';
            if (data.disease) {
                const conf = typeof data.accuracy === 'number'
                    ? (data.accuracy <= 1 ? (data.accuracy * 100).toFixed(2) : data.accuracy.toFixed(2)) + '%'
                    : '—';
                html += `<p><strong>Disease:</strong> ${escapeHtml(data.disease)}</p>`;
                html += `<p><strong>Confidence:</strong> ${conf}</p>`;
            }
            if (data.image_caption) {
                html += `<p><strong>Photo:</strong> ${escapeHtml(data.image_caption)}</p>`;
            }
            if (data.symptom_analysis) {
                html += `<hr><p><strong>Explanation:</strong></p><div>${escapeHtml(data.symptom_analysis)}</div>`;
            }
            if (!html) {
                html = '<p>No information available.</p>';
            }
            resultContainer.innerHTML = html;
            resultContainer.classList.remove('hidden');
        }

        function renderError(message) {
            resultContainer.innerHTML = `<p style="color:red;"><strong>Error:</strong> ${escapeHtml(message)}</p>`;
            resultContainer.classList.remove('hidden');
        }

        form.addEventListener('submit', async (e) => {
            e.preventDefault();

            const file = fileInput.files[0];
            const symptom = symptomInput.value || '';
            if (!file && !symptom.trim()) {
                renderError('Provide an image or write symptoms.');
                return;
            }

            const formData = new FormData();
            if (file) {
                formData.append('file', file);
            }
            formData.append('symptom', symptom);

            resultContainer.classList.add('hidden');
            showLoading(true);

            try {
                const res = await fetch('/detect', { method: 'POST', body: formData });
                const raw = await res.text();
                if (!res.ok) {
                    try {
                        renderError(JSON.parse(raw).message || `HTTP ${res.status}`);
                    } catch {
                        renderError(`HTTP ${res.status}: ${raw}`);
                    }
                    return;
                }
                renderResults(JSON.parse(raw));
            } catch (err) {
                renderError(`Network error: ${err.message}`);
            } finally {
                showLoading(false);
            }
        });
    </script>
</body>
</html>
        "#,
    )
}
