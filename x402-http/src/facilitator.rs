//! Remote facilitator HTTP client.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use url::Url;

use x402::facilitator::{Facilitator, FacilitatorError};
use x402::proto::{
    SettleRequest, SettleResponse, SupportedResponse, VerifyRequest, VerifyResponse,
};

/// Target latency budget for `/verify`.
const VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Budget for `/settle`, which waits on an on-chain confirmation.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

const SUPPORTED_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client for a remote facilitator service.
#[derive(Debug, Clone)]
pub struct FacilitatorClient {
    base_url: Url,
    http: reqwest::Client,
}

impl FacilitatorClient {
    /// Creates a client for the facilitator at `base_url`.
    #[must_use]
    pub fn new(mut base_url: Url) -> Self {
        // Keep joins relative to the service root.
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    /// The configured facilitator root.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, FacilitatorError> {
        self.base_url
            .join(path)
            .map_err(|e| FacilitatorError::Transport(e.to_string()))
    }

    async fn post_json<T: serde::Serialize, R: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        request: &T,
        timeout: Duration,
    ) -> Result<R, FacilitatorError> {
        let response = self
            .http
            .post(self.endpoint(path)?)
            .timeout(timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| FacilitatorError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FacilitatorError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json()
            .await
            .map_err(|e| FacilitatorError::Decode(e.to_string()))
    }
}

impl TryFrom<&str> for FacilitatorClient {
    type Error = url::ParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Ok(Self::new(value.parse()?))
    }
}

impl Facilitator for FacilitatorClient {
    fn verify(
        &self,
        request: VerifyRequest,
    ) -> Pin<Box<dyn Future<Output = Result<VerifyResponse, FacilitatorError>> + Send + '_>> {
        Box::pin(async move { self.post_json("verify", &request, VERIFY_TIMEOUT).await })
    }

    fn settle(
        &self,
        request: SettleRequest,
    ) -> Pin<Box<dyn Future<Output = Result<SettleResponse, FacilitatorError>> + Send + '_>> {
        Box::pin(async move { self.post_json("settle", &request, SETTLE_TIMEOUT).await })
    }

    fn supported(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<SupportedResponse, FacilitatorError>> + Send + '_>>
    {
        Box::pin(async move {
            let response = self
                .http
                .get(self.endpoint("supported")?)
                .timeout(SUPPORTED_TIMEOUT)
                .send()
                .await
                .map_err(|e| FacilitatorError::Transport(e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(FacilitatorError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            response
                .json()
                .await
                .map_err(|e| FacilitatorError::Decode(e.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_endpoints_relative_to_the_root() {
        let client = FacilitatorClient::try_from("http://localhost:4020").unwrap();
        assert_eq!(
            client.endpoint("verify").unwrap().as_str(),
            "http://localhost:4020/verify"
        );

        let nested = FacilitatorClient::try_from("http://localhost:4020/api").unwrap();
        assert_eq!(
            nested.endpoint("settle").unwrap().as_str(),
            "http://localhost:4020/api/settle"
        );
    }
}
