//! Resource-server gateway.
//!
//! Gates selected routes behind payment. A request without an
//! `X-PAYMENT` header gets a `402` listing the accepted payment
//! requirements; a request with one is checked against the facilitator,
//! either verify-only (default) or settle-then-serve.
//!
//! Attach the gate to protected routes as axum middleware:
//!
//! ```ignore
//! let gate = Arc::new(PaymentGate::new(facilitator, requirements));
//! let app = Router::new()
//!     .route("/paid", get(handler))
//!     .route_layer(middleware::from_fn_with_state(gate, payment_gate));
//! ```

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use x402::facilitator::Facilitator;
use x402::proto::{
    encode_payment, safe_decode, PaymentPayload, PaymentRequired, PaymentRequirements,
    SettleRequest, SettleResponse, VerifyRequest, X402Version1,
};

use crate::headers::{X_PAYMENT, X_PAYMENT_RESPONSE};

/// Hook invoked exactly once per successful gate. The settlement is
/// present only in settle-then-serve mode.
pub type OnPayment = Arc<dyn Fn(&PaymentRequirements, Option<&SettleResponse>) + Send + Sync>;

/// Configuration for one protected route.
pub struct PaymentGate {
    facilitator: Arc<dyn Facilitator>,
    accepts: Vec<PaymentRequirements>,
    settle_then_respond: bool,
    on_payment: Vec<OnPayment>,
}

impl std::fmt::Debug for PaymentGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentGate")
            .field("accepts", &self.accepts.len())
            .field("settle_then_respond", &self.settle_then_respond)
            .finish_non_exhaustive()
    }
}

impl PaymentGate {
    /// Creates a gate demanding one payment requirement.
    #[must_use]
    pub fn new(facilitator: Arc<dyn Facilitator>, requirements: PaymentRequirements) -> Self {
        Self {
            facilitator,
            accepts: vec![requirements],
            settle_then_respond: false,
            on_payment: Vec::new(),
        }
    }

    /// Offers an additional payment option (e.g. another network).
    #[must_use]
    pub fn with_requirement(mut self, requirements: PaymentRequirements) -> Self {
        self.accepts.push(requirements);
        self
    }

    /// Switches the gate to settle-then-serve: the payment is settled
    /// on-chain before the handler runs, and the receipt is attached as
    /// `X-PAYMENT-RESPONSE`.
    #[must_use]
    pub fn settle_then_respond(mut self) -> Self {
        self.settle_then_respond = true;
        self
    }

    /// Registers a hook fired once per successful gate. May be called
    /// repeatedly, e.g. to stack a route-specific hook on an app-wide one.
    #[must_use]
    pub fn on_payment<F>(mut self, hook: F) -> Self
    where
        F: Fn(&PaymentRequirements, Option<&SettleResponse>) + Send + Sync + 'static,
    {
        self.on_payment.push(Arc::new(hook));
        self
    }

    /// The requirement matching the (scheme, network) the client signed
    /// for; the first offer when the payload names no known offer.
    fn matching_requirement(&self, header: &str) -> &PaymentRequirements {
        safe_decode::<PaymentPayload>(header)
            .and_then(|payload| {
                self.accepts
                    .iter()
                    .find(|r| r.scheme == payload.scheme && r.network == payload.network)
            })
            .unwrap_or(&self.accepts[0])
    }
}

/// Axum middleware enforcing a [`PaymentGate`] on a route.
pub async fn payment_gate(
    State(gate): State<Arc<PaymentGate>>,
    req: Request,
    next: Next,
) -> Response {
    let header = req
        .headers()
        .get(X_PAYMENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let Some(header) = header else {
        return payment_required(&gate.accepts);
    };

    let requirements = gate.matching_requirement(&header).clone();

    if gate.settle_then_respond {
        let settle_request = SettleRequest {
            x402_version: X402Version1,
            payment_header: header,
            payment_requirements: requirements.clone(),
            actual_amount: None,
        };
        match gate.facilitator.settle(settle_request).await {
            Ok(settlement) if settlement.success => {
                let receipt_header = encode_payment(&settlement)
                    .ok()
                    .and_then(|h| HeaderValue::from_str(&h).ok());
                for hook in &gate.on_payment {
                    hook(&requirements, Some(&settlement));
                }
                let mut response = next.run(req).await;
                if let Some(value) = receipt_header {
                    response.headers_mut().insert(X_PAYMENT_RESPONSE, value);
                }
                response
            }
            Ok(settlement) => payment_rejected(
                settlement
                    .error
                    .unwrap_or_else(|| "settlement failed".to_owned()),
            ),
            Err(e) => payment_rejected(e.to_string()),
        }
    } else {
        let verify_request = VerifyRequest {
            x402_version: X402Version1,
            payment_header: header,
            payment_requirements: requirements.clone(),
        };
        match gate.facilitator.verify(verify_request).await {
            Ok(verification) if verification.is_valid => {
                for hook in &gate.on_payment {
                    hook(&requirements, None);
                }
                next.run(req).await
            }
            Ok(verification) => payment_rejected(
                verification
                    .invalid_reason
                    .unwrap_or_else(|| "invalid payment".to_owned()),
            ),
            Err(e) => payment_rejected(e.to_string()),
        }
    }
}

fn payment_required(accepts: &[PaymentRequirements]) -> Response {
    (
        StatusCode::PAYMENT_REQUIRED,
        Json(PaymentRequired::new(accepts.to_vec())),
    )
        .into_response()
}

fn payment_rejected(reason: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": reason }))).into_response()
}
