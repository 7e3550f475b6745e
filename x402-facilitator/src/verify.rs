//! Payment verification.
//!
//! Verification is off-chain except for a single balance read, and that
//! read is soft: an RPC failure is logged but does not block an
//! otherwise-valid authorization, because on-chain settlement is the
//! authoritative balance check.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use x402::events::{EventBus, EventKind, PaymentEvent};
use x402::proto::{
    decode_payment, PaymentPayload, PaymentRequirements, PaymentVerificationError, VerifyResponse,
};
use x402::validation::validate_payload;
use x402::UnixTimestamp;
use x402_evm::eip712::{payment_domain, verify_authorization_signature, SignatureError};
use x402_evm::ChainReader;

use crate::metrics;
use crate::nonce::NonceCache;

/// Running verifier counters, exposed by `/status`.
#[derive(Debug, Default)]
pub struct VerifierStats {
    total: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    latency_ms_total: AtomicU64,
}

/// Point-in-time snapshot of [`VerifierStats`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifierStatsSnapshot {
    /// Total verification calls.
    pub total: u64,
    /// Calls that returned `isValid = true`.
    pub successes: u64,
    /// Calls that returned `isValid = false`.
    pub failures: u64,
    /// Mean latency across all calls, in milliseconds.
    pub avg_latency_ms: u64,
}

impl VerifierStats {
    fn observe(&self, valid: bool, latency_ms: u64) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if valid {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        self.latency_ms_total.fetch_add(latency_ms, Ordering::Relaxed);
    }

    /// Takes a snapshot of the counters.
    #[must_use]
    pub fn snapshot(&self) -> VerifierStatsSnapshot {
        let total = self.total.load(Ordering::Relaxed);
        VerifierStatsSnapshot {
            total,
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            avg_latency_ms: if total == 0 {
                0
            } else {
                self.latency_ms_total.load(Ordering::Relaxed) / total
            },
        }
    }
}

/// Outcome of one verification call.
#[derive(Debug, Clone)]
pub struct Verification {
    /// Whether the payment satisfies the requirements.
    pub is_valid: bool,
    /// Rejection reason when invalid.
    pub invalid_reason: Option<String>,
    /// Wall-clock latency of the call.
    pub latency_ms: u64,
}

impl From<Verification> for VerifyResponse {
    fn from(v: Verification) -> Self {
        Self {
            is_valid: v.is_valid,
            invalid_reason: v.invalid_reason,
        }
    }
}

/// The facilitator's verifier. Owns the nonce cache.
pub struct Verifier {
    nonces: Arc<NonceCache>,
    chain: Arc<ChainReader>,
    events: EventBus,
    stats: VerifierStats,
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("nonces", &self.nonces)
            .finish()
    }
}

impl Verifier {
    /// Creates a verifier.
    #[must_use]
    pub fn new(nonces: Arc<NonceCache>, chain: Arc<ChainReader>, events: EventBus) -> Self {
        Self {
            nonces,
            chain,
            events,
            stats: VerifierStats::default(),
        }
    }

    /// The running counters.
    #[must_use]
    pub fn stats(&self) -> &VerifierStats {
        &self.stats
    }

    /// Verifies a payment header against requirements.
    ///
    /// Never fails across this boundary; all rejections fold into the
    /// returned [`Verification`].
    pub async fn verify(
        &self,
        payment_header: &str,
        requirements: &PaymentRequirements,
    ) -> Verification {
        let started = Instant::now();
        let result = self.check(payment_header, requirements).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        self.stats.observe(result.is_ok(), latency_ms);
        metrics::VERIFICATION_LATENCY.observe(latency_ms as f64);
        metrics::NONCE_CACHE_SIZE.set(self.nonces.len() as i64);

        match result {
            Ok(payload) => {
                metrics::VERIFICATIONS.with_label_values(&["valid"]).inc();
                self.events.emit(
                    PaymentEvent::now(EventKind::Verified)
                        .with_network(payload.network)
                        .with_amount(payload.payload.authorization.value)
                        .with_url(requirements.resource.clone()),
                );
                Verification {
                    is_valid: true,
                    invalid_reason: None,
                    latency_ms,
                }
            }
            Err(reason) => {
                metrics::VERIFICATIONS.with_label_values(&["invalid"]).inc();
                if matches!(reason, PaymentVerificationError::Replay) {
                    metrics::REPLAYS_BLOCKED.inc();
                }
                tracing::debug!(reason = %reason, "payment rejected");
                Verification {
                    is_valid: false,
                    invalid_reason: Some(reason.to_string()),
                    latency_ms,
                }
            }
        }
    }

    /// The fail-fast verification sequence.
    async fn check(
        &self,
        payment_header: &str,
        requirements: &PaymentRequirements,
    ) -> Result<PaymentPayload, PaymentVerificationError> {
        let payload: PaymentPayload = decode_payment(payment_header)
            .map_err(|e| PaymentVerificationError::Malformed(e.to_string()))?;
        validate_payload(&payload)
            .map_err(|e| PaymentVerificationError::Malformed(e.to_string()))?;

        if payload.scheme != requirements.scheme {
            return Err(PaymentVerificationError::SchemeMismatch {
                payload: payload.scheme,
                required: requirements.scheme,
            });
        }
        if payload.network != requirements.network {
            return Err(PaymentVerificationError::NetworkMismatch {
                payload: payload.network,
                required: requirements.network,
            });
        }

        // Both schemes share the authorization checks: the permission to
        // settle for less never weakens the signature or window checks.
        let authorization = payload.payload.authorization;
        let network = payload.network;

        if self.nonces.is_replay(network, authorization.nonce) {
            return Err(PaymentVerificationError::Replay);
        }

        if authorization.to != requirements.pay_to {
            return Err(PaymentVerificationError::RecipientMismatch {
                authorized: authorization.to,
                required: requirements.pay_to,
            });
        }

        if authorization.value < requirements.max_amount_required {
            return Err(PaymentVerificationError::InsufficientAmount {
                value: authorization.value,
                required: requirements.max_amount_required,
            });
        }

        let now = UnixTimestamp::now();
        if authorization.valid_after > now {
            return Err(PaymentVerificationError::NotYetValid);
        }
        if authorization.valid_before < now {
            return Err(PaymentVerificationError::Expired);
        }

        let domain = payment_domain(requirements);
        verify_authorization_signature(&authorization, &payload.payload.signature, &domain)
            .map_err(|e| match e {
                SignatureError::SignerMismatch { recovered, expected } => {
                    PaymentVerificationError::SignerMismatch { recovered, expected }
                }
                other => PaymentVerificationError::InvalidSignature(other.to_string()),
            })?;

        // Soft balance check: an RPC failure must not block an otherwise
        // valid authorization; settlement is the authoritative check.
        match self
            .chain
            .balance_of(network, requirements.asset, authorization.from)
            .await
        {
            Ok(balance) if balance < authorization.value.as_u256() => {
                return Err(PaymentVerificationError::InsufficientFunds {
                    balance: balance.into(),
                    value: authorization.value,
                });
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    network = %network,
                    holder = %authorization.from,
                    "balance check skipped, RPC unavailable: {e}"
                );
            }
        }

        self.nonces.record(network, authorization.nonce);
        Ok(payload)
    }
}
