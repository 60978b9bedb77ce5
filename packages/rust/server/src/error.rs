//! Mapping from [`FlowError`] to HTTP responses.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use minilangflow_shared::FlowError;

/// Body sent with every 500; the cause only goes to the diagnostics log.
pub const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

/// A [`FlowError`] leaving a handler.
#[derive(Debug)]
pub struct ApiError(pub FlowError);

impl From<FlowError> for ApiError {
    fn from(err: FlowError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(FlowError::validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            FlowError::Validation { message } => {
                tracing::debug!(%message, "request rejected");
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            err => {
                tracing::error!(error = %err, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": INTERNAL_ERROR_MESSAGE })),
                )
                    .into_response()
            }
        }
    }
}
