//! Request-ID stamping and token-bucket rate limiting.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use crate::state::AppState;

/// Name of the response header carrying the request ID.
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Stamps every response with a random `X-Request-ID`.
pub async fn request_id(req: Request, next: Next) -> Response {
    let id = Uuid::new_v4().to_string();
    let mut response = next.run(req).await;
    response.headers_mut().insert(
        REQUEST_ID_HEADER,
        HeaderValue::from_str(&id).expect("uuid is a valid header value"),
    );
    response
}

/// Rejects over-limit traffic with `429` before it reaches a handler.
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    if let Some(bucket) = &state.rate_limiter {
        if !bucket.try_consume(1) {
            tracing::warn!(path = %req.uri().path(), "rate limit exceeded");
            return (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": "Rate limit exceeded" })),
            )
                .into_response();
        }
    }
    next.run(req).await
}
