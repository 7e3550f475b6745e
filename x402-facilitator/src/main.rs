//! x402 facilitator HTTP server.
//!
//! # Usage
//!
//! ```bash
//! FACILITATOR_PRIVATE_KEY=0x... cargo run -p x402-facilitator --release
//! ```
//!
//! Exits non-zero when the operating key is missing or startup fails.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use alloy_signer_local::PrivateKeySigner;
use axum::http::Method;
use tower_http::cors;
use tracing_subscriber::EnvFilter;

use x402::events::{EventBus, EventKind};
use x402::resilience::TokenBucket;
use x402_evm::{ChainReader, ChainWriter, RpcEndpoints};

use x402_facilitator::config::FacilitatorConfig;
use x402_facilitator::handlers::facilitator_router;
use x402_facilitator::local::FacilitatorLocal;
use x402_facilitator::nonce::{spawn_sweeper, NonceCache, SWEEP_INTERVAL};
use x402_facilitator::settle::Settler;
use x402_facilitator::state::AppState;
use x402_facilitator::verify::Verifier;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("facilitator failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = FacilitatorConfig::from_env()?;
    tracing::info!(?config, "loaded configuration");

    let signer: PrivateKeySigner = config
        .private_key
        .trim()
        .parse()
        .map_err(|e| format!("invalid FACILITATOR_PRIVATE_KEY: {e}"))?;
    let operator = signer.address();

    let endpoints = RpcEndpoints::from_env();
    let reader = Arc::new(ChainReader::new(endpoints.clone()));
    let writer = Arc::new(ChainWriter::new(signer, endpoints));

    let nonces = Arc::new(NonceCache::new(config.nonce_ttl));
    spawn_sweeper(Arc::clone(&nonces), SWEEP_INTERVAL);

    let events = EventBus::new();
    // Keep the subscription alive for the process lifetime; dropping the
    // handle does not unsubscribe.
    let _settled_log = events.on(EventKind::Settled, |event| {
        tracing::info!(
            network = ?event.network,
            tx = ?event.tx_hash,
            amount = ?event.amount,
            "payment settled"
        );
    });

    let rate_limiter = config
        .rate_limit_enabled
        .then(|| TokenBucket::new(config.rate_limit, f64::from(config.rate_limit)));

    let state = Arc::new(AppState {
        facilitator: FacilitatorLocal::new(
            Verifier::new(Arc::clone(&nonces), reader, events.clone()),
            Settler::new(writer, events.clone()),
        ),
        nonces,
        events,
        rate_limiter,
        metrics_enabled: config.metrics_enabled,
        started_at: Instant::now(),
        operator,
    });

    let app = facilitator_router(state).layer(
        cors::CorsLayer::new()
            .allow_origin(cors::Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(cors::Any),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(operator = %operator, "facilitator listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("facilitator shut down gracefully");
    Ok(())
}

/// Waits for Ctrl-C or SIGTERM (Unix) to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => tracing::info!("received Ctrl-C, shutting down..."),
            _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down..."),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for Ctrl-C");
        tracing::info!("received Ctrl-C, shutting down...");
    }
}
