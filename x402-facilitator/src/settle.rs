//! On-chain settlement.
//!
//! The pipeline is decode → scheme dispatch → signature split →
//! simulate → submit → await one confirmation. Simulation runs first so
//! a revert never costs the operating key any gas. The whole pipeline
//! retries transient RPC failures with exponential backoff; reverts and
//! consumed nonces are terminal.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy_primitives::{B256, U256};
use parking_lot::Mutex;
use serde::Serialize;

use x402::amount::format_usdc;
use x402::events::{EventBus, EventKind, PaymentEvent};
use x402::proto::{decode_payment, PaymentPayload, PaymentRequirements, SettleResponse};
use x402::resilience::{retry, RetryPolicy};
use x402::validation::validate_payload;
use x402::{Network, Scheme, TokenAmount};
use x402_evm::eip712::split_signature;
use x402_evm::{ChainError, ChainWriter, SettlementReceipt};

use crate::metrics;

/// Settlement retry schedule: 3 attempts, 2 s base delay.
const SETTLE_RETRY_BASE: Duration = Duration::from_secs(2);
const SETTLE_RETRY_ATTEMPTS: u32 = 3;

/// Rough Base-mainnet cost per gas unit in USD at typical prices; scaled
/// by each network's gas multiplier for `/estimate-gas`.
const APPROX_USD_PER_GAS: f64 = 1.5e-7;

/// Running settler counters and per-network revenue, exposed by `/status`.
#[derive(Debug, Default)]
pub struct SettlerStats {
    total: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    latency_ms_total: AtomicU64,
    revenue: Mutex<HashMap<Network, U256>>,
}

/// Point-in-time snapshot of [`SettlerStats`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlerStatsSnapshot {
    /// Total settlement calls.
    pub total: u64,
    /// Confirmed settlements.
    pub successes: u64,
    /// Failed settlements.
    pub failures: u64,
    /// Mean latency across all calls, in milliseconds.
    pub avg_latency_ms: u64,
    /// Settled volume per network, formatted at USDC scale.
    pub revenue: HashMap<String, String>,
}

impl SettlerStats {
    fn observe(&self, success: bool, latency_ms: u64) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        self.latency_ms_total.fetch_add(latency_ms, Ordering::Relaxed);
    }

    fn add_revenue(&self, network: Network, amount: TokenAmount) {
        let mut revenue = self.revenue.lock();
        let entry = revenue.entry(network).or_insert(U256::ZERO);
        *entry += amount.as_u256();
    }

    /// Takes a snapshot of the counters.
    #[must_use]
    pub fn snapshot(&self) -> SettlerStatsSnapshot {
        let total = self.total.load(Ordering::Relaxed);
        let revenue = self
            .revenue
            .lock()
            .iter()
            .map(|(network, amount)| {
                (network.to_string(), format_usdc(TokenAmount::from(*amount)))
            })
            .collect();
        SettlerStatsSnapshot {
            total,
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            avg_latency_ms: if total == 0 {
                0
            } else {
                self.latency_ms_total.load(Ordering::Relaxed) / total
            },
            revenue,
        }
    }
}

/// Outcome of one settlement call.
#[derive(Debug, Clone)]
pub struct Settlement {
    /// Whether the transfer confirmed on-chain.
    pub success: bool,
    /// The transaction hash, when one was broadcast.
    pub tx_hash: Option<B256>,
    /// The network settled on.
    pub network_id: Option<Network>,
    /// Error text on failure.
    pub error: Option<String>,
    /// The amount charged to the payer's account.
    pub actual_amount: Option<TokenAmount>,
    /// Gas consumed by the confirmed transaction.
    pub gas_used: Option<u64>,
    /// Wall-clock latency of the call.
    pub latency_ms: u64,
}

impl From<Settlement> for SettleResponse {
    fn from(s: Settlement) -> Self {
        Self {
            success: s.success,
            tx_hash: s.tx_hash,
            network_id: s.network_id,
            actual_amount: s.actual_amount,
            error: s.error,
        }
    }
}

/// Gas estimate for a prospective settlement.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimate {
    /// Estimated gas units.
    pub gas_estimate: u64,
    /// Approximate settlement cost in USD.
    pub gas_cost_usd: f64,
}

/// Why a gas estimate could not be produced.
#[derive(Debug, thiserror::Error)]
pub enum EstimateError {
    /// The payment itself is unusable (malformed, mismatched).
    #[error("{0}")]
    Rejected(String),
    /// The chain-side estimation call failed.
    #[error("{0}")]
    Chain(String),
}

/// The facilitator's settler. Sole owner of the operating key.
pub struct Settler {
    chain: Arc<ChainWriter>,
    events: EventBus,
    stats: SettlerStats,
    policy: RetryPolicy,
}

impl std::fmt::Debug for Settler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settler")
            .field("operator", &self.chain.operator())
            .finish()
    }
}

impl Settler {
    /// Creates a settler around the chain writer.
    #[must_use]
    pub fn new(chain: Arc<ChainWriter>, events: EventBus) -> Self {
        Self {
            chain,
            events,
            stats: SettlerStats::default(),
            policy: RetryPolicy::new(SETTLE_RETRY_ATTEMPTS, SETTLE_RETRY_BASE),
        }
    }

    /// The running counters.
    #[must_use]
    pub fn stats(&self) -> &SettlerStats {
        &self.stats
    }

    /// The operating key's address.
    #[must_use]
    pub fn operator(&self) -> alloy_primitives::Address {
        self.chain.operator()
    }

    /// Settles a payment header on-chain.
    ///
    /// For `upto`, `actual_amount` is the charge to record; it defaults
    /// to `maxAmountRequired` and must not exceed the signed value. The
    /// on-chain transfer always moves the signed value — the signature
    /// covers exactly that amount — so `actual_amount` is a
    /// facilitator-side accounting commitment reported in the receipt.
    ///
    /// Never fails across this boundary; all failures fold into the
    /// returned [`Settlement`].
    pub async fn settle(
        &self,
        payment_header: &str,
        requirements: &PaymentRequirements,
        actual_amount: Option<TokenAmount>,
    ) -> Settlement {
        let started = Instant::now();
        let result = self
            .execute(payment_header, requirements, actual_amount)
            .await;
        let latency_ms = started.elapsed().as_millis() as u64;
        self.stats.observe(result.is_ok(), latency_ms);
        metrics::SETTLEMENT_LATENCY.observe(latency_ms as f64);

        match result {
            Ok((receipt, network, charged)) => {
                metrics::SETTLEMENTS.with_label_values(&["success"]).inc();
                metrics::GAS_USED.inc_by(receipt.gas_used);
                self.stats.add_revenue(network, charged);
                tracing::info!(
                    network = %network,
                    tx = %receipt.tx_hash,
                    amount = %format_usdc(charged),
                    gas = receipt.gas_used,
                    "settlement confirmed"
                );
                self.events.emit(
                    PaymentEvent::now(EventKind::Settled)
                        .with_network(network)
                        .with_amount(charged)
                        .with_tx_hash(receipt.tx_hash),
                );
                Settlement {
                    success: true,
                    tx_hash: Some(receipt.tx_hash),
                    network_id: Some(network),
                    error: None,
                    actual_amount: Some(charged),
                    gas_used: Some(receipt.gas_used),
                    latency_ms,
                }
            }
            Err(error) => {
                metrics::SETTLEMENTS.with_label_values(&["failed"]).inc();
                tracing::warn!(error = %error.message, "settlement failed");
                self.events.emit(
                    PaymentEvent::now(EventKind::Failed)
                        .with_network(requirements.network)
                        .with_error(error.message.clone()),
                );
                Settlement {
                    success: false,
                    tx_hash: error.tx_hash,
                    network_id: Some(requirements.network),
                    error: Some(error.message),
                    actual_amount: None,
                    gas_used: None,
                    latency_ms,
                }
            }
        }
    }

    async fn execute(
        &self,
        payment_header: &str,
        requirements: &PaymentRequirements,
        actual_amount: Option<TokenAmount>,
    ) -> Result<(SettlementReceipt, Network, TokenAmount), SettleFailure> {
        let payload = decode_and_match(payment_header, requirements)?;
        let authorization = payload.payload.authorization;
        let network = payload.network;

        let charged = match payload.scheme {
            Scheme::Exact => authorization.value,
            Scheme::Upto => {
                let requested = actual_amount.unwrap_or(requirements.max_amount_required);
                if requested > authorization.value {
                    return Err(SettleFailure::terminal(format!(
                        "charge amount exceeds authorized max: {requested} > {}",
                        authorization.value
                    )));
                }
                requested
            }
        };

        let signature = split_signature(&payload.payload.signature)
            .map_err(|e| SettleFailure::terminal(e.to_string()))?;

        let receipt_timeout = Duration::from_secs(requirements.max_timeout_seconds);
        let token = requirements.asset;

        // Transient RPC failures are retried with backoff; anything that
        // mentions a consumed nonce or missing funds is definitively
        // rejected and must not be resubmitted.
        let chain = Arc::clone(&self.chain);
        let receipt = retry(&self.policy, is_retryable_settle_error, move || {
            let chain = Arc::clone(&chain);
            async move {
                chain
                    .simulate_transfer(network, token, &authorization, signature)
                    .await?;
                chain
                    .submit_transfer(network, token, &authorization, signature, receipt_timeout)
                    .await
            }
        })
        .await
        .map_err(SettleFailure::from)?;

        Ok((receipt, network, charged))
    }

    /// Estimates settlement gas for a payment header.
    ///
    /// # Errors
    ///
    /// Returns [`EstimateError::Rejected`] for unusable payments and
    /// [`EstimateError::Chain`] when the estimation RPC fails.
    pub async fn estimate_gas(
        &self,
        payment_header: &str,
        requirements: &PaymentRequirements,
    ) -> Result<GasEstimate, EstimateError> {
        let payload = decode_and_match(payment_header, requirements)
            .map_err(|e| EstimateError::Rejected(e.message))?;
        let authorization = payload.payload.authorization;
        let signature = split_signature(&payload.payload.signature)
            .map_err(|e| EstimateError::Rejected(e.to_string()))?;

        let gas = self
            .chain
            .estimate_transfer_gas(payload.network, requirements.asset, &authorization, signature)
            .await
            .map_err(|e| EstimateError::Chain(e.to_string()))?;

        let gas_cost_usd =
            (gas as f64) * payload.network.gas_cost_multiplier() * APPROX_USD_PER_GAS;
        Ok(GasEstimate {
            gas_estimate: gas,
            gas_cost_usd,
        })
    }
}

/// Internal settlement failure with optional broadcast hash.
#[derive(Debug)]
struct SettleFailure {
    message: String,
    tx_hash: Option<B256>,
}

impl SettleFailure {
    fn terminal(message: String) -> Self {
        Self {
            message,
            tx_hash: None,
        }
    }
}

impl From<ChainError> for SettleFailure {
    fn from(err: ChainError) -> Self {
        Self {
            tx_hash: err.tx_hash(),
            message: err.to_string(),
        }
    }
}

fn is_retryable_settle_error(err: &ChainError) -> bool {
    let message = err.to_string().to_lowercase();
    err.is_retryable() && !message.contains("nonce") && !message.contains("insufficient")
}

fn decode_and_match(
    payment_header: &str,
    requirements: &PaymentRequirements,
) -> Result<PaymentPayload, SettleFailure> {
    let payload: PaymentPayload = decode_payment(payment_header)
        .map_err(|e| SettleFailure::terminal(e.to_string()))?;
    validate_payload(&payload).map_err(|e| SettleFailure::terminal(e.to_string()))?;
    if payload.scheme != requirements.scheme {
        return Err(SettleFailure::terminal(format!(
            "scheme mismatch: payment is '{}', requirements demand '{}'",
            payload.scheme, requirements.scheme
        )));
    }
    if payload.network != requirements.network {
        return Err(SettleFailure::terminal(format!(
            "network mismatch: payment is '{}', requirements demand '{}'",
            payload.network, requirements.network
        )));
    }
    Ok(payload)
}
