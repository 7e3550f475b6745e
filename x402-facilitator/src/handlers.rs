//! Axum route handlers for the facilitator service.
//!
//! Endpoints:
//! - `GET /health` — liveness, version, uptime, operator address
//! - `GET /status` — verifier/settler metrics, revenue, rate-limit tokens
//! - `GET /metrics` — Prometheus text exposition
//! - `GET /supported` — advertised (scheme, network) kinds
//! - `POST /verify` — verify a payment header against requirements
//! - `POST /settle` — settle a payment on-chain
//! - `POST /estimate-gas` — gas estimate for a prospective settlement

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use x402::facilitator::Facilitator;
use x402::proto::{SettleRequest, SettleResponse, SupportedResponse, VerifyRequest, VerifyResponse};
use x402::validation::validate_requirements;

use crate::error::ApiError;
use crate::metrics;
use crate::middleware::{rate_limit, request_id};
use crate::settle::EstimateError;
use crate::state::AppState;

/// Builds the facilitator router with rate limiting and request IDs.
pub fn facilitator_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/status", get(get_status))
        .route("/metrics", get(get_metrics))
        .route("/supported", get(get_supported))
        .route("/verify", post(post_verify))
        .route("/settle", post(post_settle))
        .route("/estimate-gas", post(post_estimate_gas))
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state),
            rate_limit,
        ))
        .layer(axum::middleware::from_fn(request_id))
        .with_state(state)
}

async fn get_health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime": state.uptime_secs(),
        "facilitator": state.operator,
    }))
}

async fn get_status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let settler = state.facilitator.settler().stats().snapshot();
    Json(json!({
        "verifier": state.facilitator.verifier().stats().snapshot(),
        "settler": settler,
        "nonceCache": {
            "size": state.nonces.len(),
            "replaysBlocked": state.nonces.replays_blocked(),
        },
        "rateLimit": {
            "availableTokens": state.rate_limiter.as_ref().map(|b| b.available_tokens()),
        },
        "uptime": state.uptime_secs(),
    }))
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> Response {
    if !state.metrics_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }
    metrics::UPTIME.set(state.uptime_secs() as i64);
    metrics::NONCE_CACHE_SIZE.set(state.nonces.len() as i64);
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::metrics_output(),
    )
        .into_response()
}

async fn get_supported(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SupportedResponse>, ApiError> {
    let supported = state
        .facilitator
        .supported()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(supported))
}

async fn post_verify(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let request: VerifyRequest =
        serde_json::from_value(body).map_err(ApiError::bad_request)?;
    validate_requirements(&request.payment_requirements).map_err(ApiError::bad_request)?;

    let response = state
        .facilitator
        .verify(request)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(response))
}

async fn post_settle(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<SettleResponse>, ApiError> {
    let request: SettleRequest =
        serde_json::from_value(body).map_err(ApiError::bad_request)?;
    validate_requirements(&request.payment_requirements).map_err(ApiError::bad_request)?;

    let response = state
        .facilitator
        .settle(request)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(response))
}

async fn post_estimate_gas(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, ApiError> {
    let request: VerifyRequest =
        serde_json::from_value(body).map_err(ApiError::bad_request)?;
    validate_requirements(&request.payment_requirements).map_err(ApiError::bad_request)?;

    match state
        .facilitator
        .settler()
        .estimate_gas(&request.payment_header, &request.payment_requirements)
        .await
    {
        Ok(estimate) => Ok(Json(estimate).into_response()),
        Err(EstimateError::Rejected(reason)) => Err(ApiError::BadRequest(reason)),
        Err(EstimateError::Chain(reason)) => Err(ApiError::Internal(reason)),
    }
}
