use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Failures surfaced to the client. Everything except `Internal` is a
/// request fault and maps to 400.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(
        "Unsupported target format: {0}. Supported output formats: PNG, JPG, JPEG, GIF, WEBP"
    )]
    UnsupportedFormat(String),

    #[error("HEIC output is not supported; HEIC can only be used as an input format. Supported output formats: PNG, JPG, JPEG, GIF, WEBP")]
    HeicOutput,

    #[error("Error processing {filename}: {message}")]
    Decode { filename: String, message: String },

    #[error("Error processing {filename}: {message}")]
    Encode { filename: String, message: String },

    #[error("{0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    pub fn status(&self) -> StatusCode {
        match self {
            ConvertError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ConvertError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.to_string();

        if status.is_server_error() {
            tracing::error!("{detail}");
        } else {
            tracing::debug!("rejecting request: {detail}");
        }

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
