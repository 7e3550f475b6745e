//! Wire format types for the x402 payment protocol.
//!
//! # Key Types
//!
//! - [`PaymentPayload`] — signed payment authorization carried in `X-PAYMENT`
//! - [`PaymentRequirements`] — payment terms set by the resource server
//! - [`PaymentRequired`] — HTTP 402 response body
//! - [`PaymentResponse`] — settlement receipt carried in `X-PAYMENT-RESPONSE`
//! - [`VerifyRequest`] / [`VerifyResponse`] — facilitator verification messages
//! - [`SettleRequest`] / [`SettleResponse`] — facilitator settlement messages
//! - [`SupportedResponse`] — the (scheme, network) kinds a facilitator serves

pub mod encoding;
pub mod error;
mod v1;

pub use encoding::{decode_payment, encode_payment, safe_decode, Base64Bytes, CodecError};
pub use error::PaymentVerificationError;
pub use v1::*;
