//! The client payment engine.
//!
//! Detects `402 Payment Required`, selects the cheapest viable option,
//! signs an authorization with the holder key, retries the request with
//! the `X-PAYMENT` header, and interprets the settlement receipt. The
//! whole pipeline runs under a per-host circuit breaker and
//! exponential-backoff retry.

mod select;
mod stream;

pub use select::select_payment_option;
pub use stream::StreamingResponse;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::B256;
use http::{HeaderMap, Method};
use url::Url;

use x402::events::{EventBus, EventKind, PaymentEvent};
use x402::proto::{safe_decode, PaymentRequired, PaymentRequirements, PaymentResponse};
use x402::resilience::{retry, BreakerConfig, CircuitBreakerSet, RetryPolicy};
use x402::TokenAmount;
use x402_evm::HolderWallet;

use crate::error::ClientError;
use crate::headers::{X_PAYMENT, X_PAYMENT_RESPONSE};

/// Default end-to-end timeout for a buffered request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Streaming requests get three times the buffered budget.
const STREAM_TIMEOUT_FACTOR: u32 = 3;

/// Asynchronous approval callback consulted before signing.
pub type PaymentDecision =
    Arc<dyn Fn(&PaymentRequirements) -> Pin<Box<dyn Future<Output = bool> + Send>> + Send + Sync>;

/// Per-request options.
#[derive(Clone)]
pub struct RequestOptions {
    /// HTTP method (default GET).
    pub method: Method,
    /// Extra request headers.
    pub headers: HeaderMap,
    /// Request body bytes.
    pub body: Option<Vec<u8>>,
    /// Per-request spend ceiling; overrides the client-level ceiling.
    pub max_amount: Option<TokenAmount>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
            max_amount: None,
        }
    }
}

impl std::fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOptions")
            .field("method", &self.method)
            .field("max_amount", &self.max_amount)
            .finish_non_exhaustive()
    }
}

/// A response body decoded per its content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// `application/json` bodies.
    Json(serde_json::Value),
    /// Textual bodies.
    Text(String),
    /// Everything else.
    Bytes(Vec<u8>),
}

/// Outcome of a (possibly paid) request.
#[derive(Debug, Clone)]
pub struct PaidResponse {
    /// Final HTTP status.
    pub status: u16,
    /// Decoded response body.
    pub body: ResponseBody,
    /// Whether a payment was made for this response.
    pub paid: bool,
    /// The amount paid, from the receipt or the signed value.
    pub amount_paid: Option<TokenAmount>,
    /// The settlement transaction hash, when the server settled.
    pub tx_hash: Option<B256>,
}

/// The result of the payment handshake, before body handling.
struct Exchange {
    response: reqwest::Response,
    paid: bool,
    amount_paid: Option<TokenAmount>,
    tx_hash: Option<B256>,
}

/// An HTTP client that pays for `402 Payment Required` responses.
pub struct PaymentClient {
    http: reqwest::Client,
    wallet: Arc<HolderWallet>,
    events: EventBus,
    breakers: CircuitBreakerSet,
    retry_policy: RetryPolicy,
    timeout: Duration,
    max_amount: Option<TokenAmount>,
    decision: Option<PaymentDecision>,
}

impl std::fmt::Debug for PaymentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentClient")
            .field("holder", &self.wallet.address())
            .field("max_amount", &self.max_amount)
            .finish_non_exhaustive()
    }
}

impl PaymentClient {
    /// Creates an engine around a holder wallet.
    #[must_use]
    pub fn new(wallet: Arc<HolderWallet>) -> Self {
        Self {
            http: reqwest::Client::new(),
            wallet,
            events: EventBus::new(),
            breakers: CircuitBreakerSet::new(BreakerConfig::default()),
            retry_policy: RetryPolicy::default(),
            timeout: REQUEST_TIMEOUT,
            max_amount: None,
            decision: None,
        }
    }

    /// Shares an event bus with the rest of the process.
    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Sets a client-wide spend ceiling.
    #[must_use]
    pub fn with_max_amount(mut self, max_amount: TokenAmount) -> Self {
        self.max_amount = Some(max_amount);
        self
    }

    /// Sets the approval callback consulted before signing.
    #[must_use]
    pub fn with_payment_decision<F, Fut>(mut self, decision: F) -> Self
    where
        F: Fn(&PaymentRequirements) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.decision = Some(Arc::new(move |reqs| Box::pin(decision(reqs))));
        self
    }

    /// Overrides the retry schedule.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Overrides the circuit-breaker configuration.
    #[must_use]
    pub fn with_breaker_config(mut self, config: BreakerConfig) -> Self {
        self.breakers = CircuitBreakerSet::new(config);
        self
    }

    /// Overrides the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The holder address paying for requests.
    #[must_use]
    pub fn address(&self) -> alloy_primitives::Address {
        self.wallet.address()
    }

    /// Issues a request, transparently paying a `402` if one comes back.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on policy refusal, transport failure after
    /// the retry budget, or an open circuit for the host.
    pub async fn request(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<PaidResponse, ClientError> {
        let url: Url = url.parse().map_err(|_| ClientError::InvalidUrl(url.to_owned()))?;
        let host = url.host_str().unwrap_or("unknown").to_owned();
        self.breakers.try_acquire(&host)?;

        let client = self;
        let url_ref = &url;
        let options_ref = &options;
        let result = retry(&self.retry_policy, ClientError::is_retryable, move || {
            async move {
                let exchange = client.perform(url_ref, options_ref, client.timeout).await?;
                PaymentClient::buffer(exchange).await
            }
        })
        .await;

        match &result {
            Ok(_) => self.breakers.record_success(&host),
            Err(e) if e.is_retryable() => self.breakers.record_failure(&host),
            Err(_) => {}
        }
        result
    }

    /// Streaming variant: identical handshake, tripled timeout, and the
    /// body exposed as a lazy UTF-8 chunk stream.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] under the same conditions as
    /// [`PaymentClient::request`]. Stream failures after bytes have been
    /// delivered surface as `Err` items on the stream and do not roll
    /// back payment.
    pub async fn request_stream(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<StreamingResponse, ClientError> {
        let url: Url = url.parse().map_err(|_| ClientError::InvalidUrl(url.to_owned()))?;
        let host = url.host_str().unwrap_or("unknown").to_owned();
        self.breakers.try_acquire(&host)?;

        let stream_timeout = self.timeout * STREAM_TIMEOUT_FACTOR;
        let client = self;
        let url_ref = &url;
        let options_ref = &options;
        let result = retry(&self.retry_policy, ClientError::is_retryable, move || {
            client.perform(url_ref, options_ref, stream_timeout)
        })
        .await;

        match result {
            Ok(exchange) => {
                self.breakers.record_success(&host);
                self.events
                    .emit(PaymentEvent::now(EventKind::StreamStarted).with_url(url.as_str()));
                Ok(StreamingResponse::new(exchange, self.events.clone()))
            }
            Err(e) => {
                if e.is_retryable() {
                    self.breakers.record_failure(&host);
                }
                Err(e)
            }
        }
    }

    /// Steps 1–10 of the payment pipeline, up to receipt parsing.
    async fn perform(
        &self,
        url: &Url,
        options: &RequestOptions,
        timeout: Duration,
    ) -> Result<Exchange, ClientError> {
        let initial = self.send(url, options, None, timeout).await?;
        if initial.status() != http::StatusCode::PAYMENT_REQUIRED {
            return Ok(Exchange {
                response: initial,
                paid: false,
                amount_paid: None,
                tx_hash: None,
            });
        }

        let required: PaymentRequired = initial
            .json()
            .await
            .map_err(|e| ClientError::InvalidPaymentRequired(e.to_string()))?;
        let selected =
            select_payment_option(&required.accepts).ok_or(ClientError::NoPaymentOptions)?;

        tracing::debug!(
            url = %url,
            network = %selected.network,
            amount = %selected.max_amount_required,
            "received 402, paying"
        );
        self.events.emit(
            PaymentEvent::now(EventKind::Initiated)
                .with_url(url.as_str())
                .with_network(selected.network)
                .with_amount(selected.max_amount_required),
        );

        if let Some(decision) = &self.decision {
            if !decision(selected).await {
                return Err(ClientError::Declined);
            }
        }
        let limit = options.max_amount.or(self.max_amount);
        if let Some(limit) = limit {
            if selected.max_amount_required > limit {
                return Err(ClientError::PriceExceedsMax {
                    offered: selected.max_amount_required,
                    limit,
                });
            }
        }

        let header = self.wallet.sign_payment_header(selected)?;
        self.events.emit(
            PaymentEvent::now(EventKind::Signed)
                .with_url(url.as_str())
                .with_network(selected.network)
                .with_amount(selected.max_amount_required),
        );

        let response = self.send(url, options, Some(&header), timeout).await?;

        // Malformed receipts are ignored; the signed value is then the
        // best available answer for the amount paid.
        let receipt: Option<PaymentResponse> = response
            .headers()
            .get(X_PAYMENT_RESPONSE)
            .and_then(|v| v.to_str().ok())
            .and_then(safe_decode);
        let amount_paid = receipt
            .as_ref()
            .and_then(|r| r.actual_amount)
            .unwrap_or(selected.max_amount_required);
        let tx_hash = receipt.as_ref().and_then(|r| r.tx_hash);

        Ok(Exchange {
            response,
            paid: true,
            amount_paid: Some(amount_paid),
            tx_hash,
        })
    }

    async fn send(
        &self,
        url: &Url,
        options: &RequestOptions,
        payment_header: Option<&str>,
        timeout: Duration,
    ) -> Result<reqwest::Response, ClientError> {
        let mut builder = self
            .http
            .request(options.method.clone(), url.clone())
            .timeout(timeout)
            .headers(options.headers.clone());
        if let Some(body) = &options.body {
            builder = builder.body(body.clone());
        }
        if let Some(header) = payment_header {
            builder = builder.header(X_PAYMENT, header);
        }
        Ok(builder.send().await?)
    }

    async fn buffer(exchange: Exchange) -> Result<PaidResponse, ClientError> {
        let status = exchange.response.status().as_u16();
        let content_type = exchange
            .response
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_owned();
        let bytes = exchange.response.bytes().await?;
        Ok(PaidResponse {
            status,
            body: decode_body(&content_type, &bytes),
            paid: exchange.paid,
            amount_paid: exchange.amount_paid,
            tx_hash: exchange.tx_hash,
        })
    }
}

fn decode_body(content_type: &str, bytes: &[u8]) -> ResponseBody {
    if content_type.contains("application/json") {
        if let Ok(value) = serde_json::from_slice(bytes) {
            return ResponseBody::Json(value);
        }
    }
    if content_type.starts_with("text/") || content_type.is_empty() {
        if let Ok(text) = std::str::from_utf8(bytes) {
            return ResponseBody::Text(text.to_owned());
        }
    }
    ResponseBody::Bytes(bytes.to_vec())
}
