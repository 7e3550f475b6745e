//! Client engine error taxonomy.
//!
//! Policy refusals (declined, over budget) are terminal and never
//! retried; transport failures are retryable; a circuit-broken host
//! short-circuits without touching the network.

use x402::resilience::CircuitOpenError;
use x402::TokenAmount;
use x402_evm::WalletError;

/// Errors surfaced by the client payment engine.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request URL did not parse.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// The `paymentDecision` callback refused the payment.
    #[error("payment declined")]
    Declined,
    /// The cheapest offered option exceeds the caller's ceiling.
    #[error("price exceeds max willing to pay: {offered} > {limit}")]
    PriceExceedsMax {
        /// The offered price.
        offered: TokenAmount,
        /// The caller's ceiling.
        limit: TokenAmount,
    },
    /// The 402 response offered no payment options.
    #[error("402 response offered no payment options")]
    NoPaymentOptions,
    /// The 402 body did not parse as a payment-required document.
    #[error("invalid 402 response: {0}")]
    InvalidPaymentRequired(String),
    /// The per-host circuit breaker is open.
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),
    /// Transport-level failure (timeout, connect, TLS).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The holder wallet failed to sign.
    #[error(transparent)]
    Wallet(#[from] WalletError),
    /// The response stream failed mid-flight.
    #[error("stream failed: {0}")]
    Stream(String),
}

impl ClientError {
    /// Whether the engine's retry loop may re-attempt after this error.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}
