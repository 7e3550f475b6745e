//! HTTP integration for the x402 payment protocol.
//!
//! - [`client`] — The client payment engine: 402 detection, option
//!   selection, signing, retry with the payment header, receipt parsing,
//!   and a streaming variant; wrapped in per-host circuit breaking and
//!   exponential-backoff retry
//! - [`server`] — The resource-server gateway middleware: 402 emission,
//!   verify-only or settle-then-serve gating, payment hooks
//! - [`facilitator`] — A remote facilitator HTTP client implementing the
//!   [`x402::facilitator::Facilitator`] trait
//! - [`headers`] — Protocol header names

pub mod client;
pub mod error;
pub mod facilitator;
pub mod headers;
pub mod server;

pub use client::{PaidResponse, PaymentClient, RequestOptions, ResponseBody, StreamingResponse};
pub use error::ClientError;
pub use facilitator::FacilitatorClient;
pub use server::{payment_gate, PaymentGate};
