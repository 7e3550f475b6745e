//! Core trait for x402 payment facilitators.
//!
//! The trait is dyn-compatible so that the resource-server gateway can
//! hold either a remote HTTP client or an in-process implementation
//! behind `Arc<dyn Facilitator>`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::proto::{SettleRequest, SettleResponse, SupportedResponse, VerifyRequest, VerifyResponse};

/// Errors from talking to a facilitator.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FacilitatorError {
    /// Transport-level failure reaching the facilitator.
    #[error("facilitator unreachable: {0}")]
    Transport(String),
    /// The facilitator answered with a non-success status.
    #[error("facilitator returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, if readable.
        body: String,
    },
    /// The facilitator's response body was not decodable.
    #[error("malformed facilitator response: {0}")]
    Decode(String),
}

/// Asynchronous verify/settle/supported interface of a facilitator.
pub trait Facilitator: Send + Sync {
    /// Verifies a payment header against requirements without touching
    /// chain state.
    fn verify(
        &self,
        request: VerifyRequest,
    ) -> Pin<Box<dyn Future<Output = Result<VerifyResponse, FacilitatorError>> + Send + '_>>;

    /// Settles a payment on-chain and reports the receipt.
    fn settle(
        &self,
        request: SettleRequest,
    ) -> Pin<Box<dyn Future<Output = Result<SettleResponse, FacilitatorError>> + Send + '_>>;

    /// The (scheme, network) kinds this facilitator serves.
    fn supported(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<SupportedResponse, FacilitatorError>> + Send + '_>>;
}

impl<T: Facilitator> Facilitator for Arc<T> {
    fn verify(
        &self,
        request: VerifyRequest,
    ) -> Pin<Box<dyn Future<Output = Result<VerifyResponse, FacilitatorError>> + Send + '_>> {
        self.as_ref().verify(request)
    }

    fn settle(
        &self,
        request: SettleRequest,
    ) -> Pin<Box<dyn Future<Output = Result<SettleResponse, FacilitatorError>> + Send + '_>> {
        self.as_ref().settle(request)
    }

    fn supported(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<SupportedResponse, FacilitatorError>> + Send + '_>> {
        self.as_ref().supported()
    }
}
