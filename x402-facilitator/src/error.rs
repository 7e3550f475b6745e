//! HTTP error mapping for the facilitator surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Errors surfaced by HTTP handlers.
///
/// Schema failures map to `400` with an `invalidReason`; everything
/// unexpected maps to `500` with the error message and no stack trace.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request body failed schema validation.
    #[error("{0}")]
    BadRequest(String),
    /// An unexpected internal failure.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Convenience constructor for schema failures.
    #[must_use]
    pub fn bad_request(reason: impl std::fmt::Display) -> Self {
        Self::BadRequest(reason.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(reason) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "invalidReason": reason, "error": reason })),
            )
                .into_response(),
            Self::Internal(message) => {
                tracing::error!(error = %message, "internal facilitator error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": message })),
                )
                    .into_response()
            }
        }
    }
}
