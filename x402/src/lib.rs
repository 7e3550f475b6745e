//! x402 Payment Protocol core types for Rust.
//!
//! This crate provides the wire format types and shared machinery for the
//! x402 payment protocol. It adds:
//!
//! - [`proto`] — Wire format types, base64 codec, and verification error reasons
//! - [`networks`] — The static table of supported networks and their USDC deployments
//! - [`events`] — Typed payment lifecycle events with a bounded ring buffer
//! - [`resilience`] — Exponential backoff, per-host circuit breaker, token bucket
//! - [`facilitator`] — The `Facilitator` trait for verify/settle/supported
//! - [`validation`] — Shape and range checks for all wire types

pub mod amount;
pub mod events;
pub mod facilitator;
pub mod networks;
pub mod proto;
pub mod resilience;
pub mod scheme;
pub mod timestamp;
pub mod validation;

pub use amount::TokenAmount;
pub use networks::Network;
pub use proto::*;
pub use scheme::Scheme;
pub use timestamp::UnixTimestamp;
