//! Protocol header names.

/// Carries the base64 JSON payment payload on a retried request.
pub const X_PAYMENT: &str = "X-PAYMENT";

/// Carries the base64 JSON settlement receipt on a served response.
pub const X_PAYMENT_RESPONSE: &str = "X-PAYMENT-RESPONSE";
