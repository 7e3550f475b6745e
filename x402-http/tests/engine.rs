//! End-to-end client engine tests against a live in-process gateway.
//!
//! An axum server is bound to an ephemeral port with the payment gate in
//! front of the handler and a scriptable facilitator behind it, so the
//! whole 402 → sign → retry → receipt loop runs over real HTTP without
//! touching a chain.

mod common;

use std::sync::Arc;

use axum::routing::get;
use axum::{middleware, Json, Router};
use futures_util::TryStreamExt;

use x402::{Network, TokenAmount};
use x402_evm::HolderWallet;
use x402_http::client::{PaymentClient, RequestOptions, ResponseBody};
use x402_http::server::{payment_gate, PaymentGate};
use x402_http::ClientError;

use common::{requirements, MockFacilitator};

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn spawn_gated(gate: PaymentGate) -> String {
    let app = Router::new()
        .route(
            "/paid",
            get(|| async { Json(serde_json::json!({"report": "sunny"})) }),
        )
        .route_layer(middleware::from_fn_with_state(Arc::new(gate), payment_gate));
    spawn(app).await
}

fn client() -> PaymentClient {
    PaymentClient::new(Arc::new(HolderWallet::random()))
}

#[tokio::test]
async fn pays_for_a_402_in_verify_only_mode() {
    let facilitator = Arc::new(MockFacilitator::accepting());
    let base = spawn_gated(PaymentGate::new(
        facilitator,
        requirements(Network::BaseSepolia),
    ))
    .await;

    let response = client()
        .request(&format!("{base}/paid"), RequestOptions::default())
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert!(response.paid);
    assert_eq!(response.amount_paid, Some(TokenAmount::from(10_000u64)));
    assert_eq!(response.tx_hash, None);
    assert_eq!(
        response.body,
        ResponseBody::Json(serde_json::json!({"report": "sunny"}))
    );
}

#[tokio::test]
async fn surfaces_the_receipt_in_settle_mode() {
    let facilitator = Arc::new(MockFacilitator::accepting());
    let base = spawn_gated(
        PaymentGate::new(facilitator, requirements(Network::BaseSepolia)).settle_then_respond(),
    )
    .await;

    let response = client()
        .request(&format!("{base}/paid"), RequestOptions::default())
        .await
        .unwrap();

    assert!(response.paid);
    assert!(response.tx_hash.is_some());
    assert_eq!(response.amount_paid, Some(TokenAmount::from(10_000u64)));
}

#[tokio::test]
async fn non_402_responses_pass_through_unpaid() {
    let base = spawn(Router::new().route("/free", get(|| async { "gratis" }))).await;

    let response = client()
        .request(&format!("{base}/free"), RequestOptions::default())
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert!(!response.paid);
    assert_eq!(response.amount_paid, None);
    assert_eq!(response.body, ResponseBody::Text("gratis".to_owned()));
}

#[tokio::test]
async fn declined_decision_aborts_before_signing() {
    let facilitator = Arc::new(MockFacilitator::accepting());
    let base = spawn_gated(PaymentGate::new(
        facilitator,
        requirements(Network::BaseSepolia),
    ))
    .await;

    let paying = client().with_payment_decision(|_| async { false });
    let err = paying
        .request(&format!("{base}/paid"), RequestOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Declined));
}

#[tokio::test]
async fn over_budget_price_is_refused() {
    let facilitator = Arc::new(MockFacilitator::accepting());
    let base = spawn_gated(PaymentGate::new(
        facilitator,
        requirements(Network::BaseSepolia),
    ))
    .await;

    let thrifty = client().with_max_amount(TokenAmount::from(5_000u64));
    let err = thrifty
        .request(&format!("{base}/paid"), RequestOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::PriceExceedsMax { .. }));
}

#[tokio::test]
async fn empty_offer_list_is_an_error() {
    let app = Router::new().route(
        "/broke",
        get(|| async {
            (
                http::StatusCode::PAYMENT_REQUIRED,
                Json(serde_json::json!({"x402Version": 1, "accepts": []})),
            )
        }),
    );
    let base = spawn(app).await;

    let err = client()
        .request(&format!("{base}/broke"), RequestOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NoPaymentOptions));
}

#[tokio::test]
async fn streams_a_paid_body_as_utf8_chunks() {
    let facilitator = Arc::new(MockFacilitator::accepting());
    let base = spawn_gated(PaymentGate::new(
        facilitator,
        requirements(Network::BaseSepolia),
    ))
    .await;

    let streaming = client()
        .request_stream(&format!("{base}/paid"), RequestOptions::default())
        .await
        .unwrap();
    assert!(streaming.paid);
    assert_eq!(streaming.status, 200);

    let chunks: Vec<String> = streaming.try_collect().await.unwrap();
    let body = chunks.concat();
    assert!(body.contains("sunny"));
}
