use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::inference::InferenceError;

/// Request-level failures, rendered as `{"message": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    /// Carries axum's own status, e.g. 413 when the body limit is hit.
    #[error("Malformed form data: {0}")]
    Form(#[from] MultipartError),
    #[error("Image model error: {0}")]
    ImageModel(#[from] InferenceError),
    #[error("Unhandled server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Form(err) => err.status(),
            AppError::ImageModel(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!(%message, "Request failed");
        } else {
            tracing::warn!(%message, "Rejected request");
        }
        (status, Json(json!({ "message": message }))).into_response()
    }
}
