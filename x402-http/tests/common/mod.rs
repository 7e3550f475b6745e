//! Shared test fixtures: a scriptable in-process facilitator and
//! canned payment requirements.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use alloy_primitives::{address, B256};

use x402::facilitator::{Facilitator, FacilitatorError};
use x402::proto::{
    PaymentRequirements, SettleRequest, SettleResponse, SupportedResponse, VerifyRequest,
    VerifyResponse,
};
use x402::{Network, Scheme, TokenAmount};

/// Facilitator double returning canned responses and recording requests.
pub struct MockFacilitator {
    pub verify_response: VerifyResponse,
    pub settle_response: SettleResponse,
    pub verify_requests: Mutex<Vec<VerifyRequest>>,
    pub settle_requests: Mutex<Vec<SettleRequest>>,
}

impl MockFacilitator {
    pub fn accepting() -> Self {
        Self {
            verify_response: VerifyResponse {
                is_valid: true,
                invalid_reason: None,
            },
            settle_response: SettleResponse {
                success: true,
                tx_hash: Some(B256::repeat_byte(0xab)),
                network_id: Some(Network::BaseSepolia),
                actual_amount: Some(TokenAmount::from(10_000u64)),
                error: None,
            },
            verify_requests: Mutex::new(Vec::new()),
            settle_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting(reason: &str) -> Self {
        let mut mock = Self::accepting();
        mock.verify_response = VerifyResponse {
            is_valid: false,
            invalid_reason: Some(reason.to_owned()),
        };
        mock.settle_response = SettleResponse {
            success: false,
            tx_hash: None,
            network_id: Some(Network::BaseSepolia),
            actual_amount: None,
            error: Some(reason.to_owned()),
        };
        mock
    }
}

impl Facilitator for MockFacilitator {
    fn verify(
        &self,
        request: VerifyRequest,
    ) -> Pin<Box<dyn Future<Output = Result<VerifyResponse, FacilitatorError>> + Send + '_>> {
        self.verify_requests.lock().unwrap().push(request);
        let response = self.verify_response.clone();
        Box::pin(async move { Ok(response) })
    }

    fn settle(
        &self,
        request: SettleRequest,
    ) -> Pin<Box<dyn Future<Output = Result<SettleResponse, FacilitatorError>> + Send + '_>> {
        self.settle_requests.lock().unwrap().push(request);
        let response = self.settle_response.clone();
        Box::pin(async move { Ok(response) })
    }

    fn supported(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<SupportedResponse, FacilitatorError>> + Send + '_>>
    {
        Box::pin(async move { Ok(SupportedResponse::all_kinds()) })
    }
}

/// Canned base-sepolia requirements for 10 000 atomic units.
pub fn requirements(network: Network) -> PaymentRequirements {
    PaymentRequirements {
        scheme: Scheme::Exact,
        network,
        max_amount_required: TokenAmount::from(10_000u64),
        resource: "https://api.example.com/weather".to_owned(),
        description: "Weather data".to_owned(),
        mime_type: "application/json".to_owned(),
        output_schema: None,
        pay_to: address!("0x1111111111111111111111111111111111111111"),
        max_timeout_seconds: 60,
        asset: network.usdc_address(),
        extra: None,
    }
}
