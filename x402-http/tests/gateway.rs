//! Gateway middleware tests, driven through `tower::ServiceExt::oneshot`.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::routing::get;
use axum::{middleware, Json, Router};
use http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use x402::proto::{decode_payment, SettleResponse};
use x402::Network;
use x402_evm::HolderWallet;
use x402_http::server::{payment_gate, PaymentGate};

use common::{requirements, MockFacilitator};

fn gated_app(gate: PaymentGate) -> Router {
    Router::new()
        .route("/paid", get(|| async { Json(serde_json::json!({"report": "sunny"})) }))
        .route_layer(middleware::from_fn_with_state(Arc::new(gate), payment_gate))
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn missing_header_yields_402_with_offers() {
    let facilitator = Arc::new(MockFacilitator::accepting());
    let app = gated_app(
        PaymentGate::new(facilitator, requirements(Network::BaseSepolia))
            .with_requirement(requirements(Network::BaseMainnet)),
    );

    let response = app
        .oneshot(Request::builder().uri("/paid").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let json = body_json(response).await;
    assert_eq!(json["x402Version"], 1);
    assert_eq!(json["error"], "Payment required");
    assert_eq!(json["accepts"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn valid_payment_serves_and_fires_hook_once() {
    let facilitator = Arc::new(MockFacilitator::accepting());
    let hook_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hook_calls);
    let app = gated_app(
        PaymentGate::new(Arc::clone(&facilitator) as _, requirements(Network::BaseSepolia))
            .on_payment(move |_, settlement| {
                assert!(settlement.is_none());
                counter.fetch_add(1, Ordering::SeqCst);
            }),
    );

    let wallet = HolderWallet::random();
    let header = wallet
        .sign_payment_header(&requirements(Network::BaseSepolia))
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/paid")
                .header("X-PAYMENT", header)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(hook_calls.load(Ordering::SeqCst), 1);
    assert_eq!(facilitator.verify_requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_payment_yields_400_with_reason() {
    let facilitator = Arc::new(MockFacilitator::rejecting("nonce already used (replay detected)"));
    let app = gated_app(PaymentGate::new(facilitator, requirements(Network::BaseSepolia)));

    let wallet = HolderWallet::random();
    let header = wallet
        .sign_payment_header(&requirements(Network::BaseSepolia))
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/paid")
                .header("X-PAYMENT", header)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("replay"));
}

#[tokio::test]
async fn settle_then_serve_attaches_receipt_header() {
    let facilitator = Arc::new(MockFacilitator::accepting());
    let app = gated_app(
        PaymentGate::new(Arc::clone(&facilitator) as _, requirements(Network::BaseSepolia))
            .settle_then_respond(),
    );

    let wallet = HolderWallet::random();
    let header = wallet
        .sign_payment_header(&requirements(Network::BaseSepolia))
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/paid")
                .header("X-PAYMENT", header)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let receipt_header = response.headers()["X-PAYMENT-RESPONSE"].to_str().unwrap();
    let receipt: SettleResponse = decode_payment(receipt_header).unwrap();
    assert!(receipt.success);
    assert_eq!(receipt.network_id, Some(Network::BaseSepolia));
    assert!(receipt.tx_hash.is_some());
    assert_eq!(facilitator.settle_requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn failed_settlement_yields_400() {
    let facilitator = Arc::new(MockFacilitator::rejecting("insufficient funds"));
    let app = gated_app(
        PaymentGate::new(facilitator, requirements(Network::BaseSepolia)).settle_then_respond(),
    );

    let wallet = HolderWallet::random();
    let header = wallet
        .sign_payment_header(&requirements(Network::BaseSepolia))
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/paid")
                .header("X-PAYMENT", header)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn gate_matches_the_option_the_client_signed_for() {
    let facilitator = Arc::new(MockFacilitator::accepting());
    let app = gated_app(
        PaymentGate::new(Arc::clone(&facilitator) as _, requirements(Network::BaseSepolia))
            .with_requirement(requirements(Network::BaseMainnet)),
    );

    let wallet = HolderWallet::random();
    let header = wallet
        .sign_payment_header(&requirements(Network::BaseMainnet))
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/paid")
                .header("X-PAYMENT", header)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let seen = facilitator.verify_requests.lock().unwrap();
    assert_eq!(seen[0].payment_requirements.network, Network::BaseMainnet);
}
