//! Local facilitator implementation.
//!
//! [`FacilitatorLocal`] wraps the verification and settlement pipelines
//! behind the [`Facilitator`] trait, so the HTTP handlers and an
//! in-process resource-server gateway drive payments through the same
//! interface as a remote facilitator client.
//!
//! Verification and settlement never fail across this boundary: both
//! pipelines fold rejections into their structured responses, so the
//! trait's error type only surfaces for remote implementations.

use std::future::Future;
use std::pin::Pin;

use x402::facilitator::{Facilitator, FacilitatorError};
use x402::proto::{
    SettleRequest, SettleResponse, SupportedResponse, VerifyRequest, VerifyResponse,
};

use crate::settle::Settler;
use crate::verify::Verifier;

/// A [`Facilitator`] backed by this process's verifier and settler.
pub struct FacilitatorLocal {
    verifier: Verifier,
    settler: Settler,
}

impl std::fmt::Debug for FacilitatorLocal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacilitatorLocal")
            .field("verifier", &self.verifier)
            .field("settler", &self.settler)
            .finish()
    }
}

impl FacilitatorLocal {
    /// Creates a local facilitator around the two pipelines.
    #[must_use]
    pub const fn new(verifier: Verifier, settler: Settler) -> Self {
        Self { verifier, settler }
    }

    /// The verification pipeline, for stats and direct access.
    #[must_use]
    pub const fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    /// The settlement pipeline, for stats and gas estimation.
    #[must_use]
    pub const fn settler(&self) -> &Settler {
        &self.settler
    }
}

impl Facilitator for FacilitatorLocal {
    fn verify(
        &self,
        request: VerifyRequest,
    ) -> Pin<Box<dyn Future<Output = Result<VerifyResponse, FacilitatorError>> + Send + '_>> {
        Box::pin(async move {
            let verification = self
                .verifier
                .verify(&request.payment_header, &request.payment_requirements)
                .await;
            Ok(verification.into())
        })
    }

    fn settle(
        &self,
        request: SettleRequest,
    ) -> Pin<Box<dyn Future<Output = Result<SettleResponse, FacilitatorError>> + Send + '_>> {
        Box::pin(async move {
            let settlement = self
                .settler
                .settle(
                    &request.payment_header,
                    &request.payment_requirements,
                    request.actual_amount,
                )
                .await;
            Ok(settlement.into())
        })
    }

    fn supported(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<SupportedResponse, FacilitatorError>> + Send + '_>>
    {
        Box::pin(async move { Ok(SupportedResponse::all_kinds()) })
    }
}
