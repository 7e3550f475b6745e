//! Shared application state for the facilitator service.

use std::sync::Arc;
use std::time::Instant;

use alloy_primitives::Address;

use x402::events::EventBus;
use x402::resilience::TokenBucket;

use crate::local::FacilitatorLocal;
use crate::nonce::NonceCache;

/// State threaded through every HTTP handler.
pub struct AppState {
    /// The local verify/settle pipelines behind the `Facilitator` trait.
    pub facilitator: FacilitatorLocal,
    /// The replay cache (owned by the verifier, surfaced for `/status`).
    pub nonces: Arc<NonceCache>,
    /// The process-wide event bus.
    pub events: EventBus,
    /// The global rate limiter, absent when disabled.
    pub rate_limiter: Option<TokenBucket>,
    /// Whether `/metrics` is served.
    pub metrics_enabled: bool,
    /// Process start time, for uptime reporting.
    pub started_at: Instant,
    /// The operating key's address.
    pub operator: Address,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("operator", &self.operator)
            .field("metrics_enabled", &self.metrics_enabled)
            .field("rate_limited", &self.rate_limiter.is_some())
            .finish()
    }
}

impl AppState {
    /// Seconds since the service started.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
