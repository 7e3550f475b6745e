//! Shape and range checks for wire types.
//!
//! Addresses, nonces, amounts, and timestamps are shape-checked by their
//! serde representations; the checks here cover everything serde cannot
//! express: URL validity, positive timeouts, non-zero values, and window
//! ordering.

use url::Url;

use crate::proto::{Authorization, ExactPayload, PaymentPayload, PaymentRequirements};

/// A wire value that is structurally well-formed JSON but violates a
/// protocol invariant.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    /// `resource` is not an absolute URL.
    #[error("resource is not an absolute URL: {0}")]
    InvalidResource(String),
    /// `maxTimeoutSeconds` must be positive.
    #[error("maxTimeoutSeconds must be positive")]
    NonPositiveTimeout,
    /// `value` must be positive.
    #[error("authorization value must be positive")]
    ZeroValue,
    /// `validAfter` must not exceed `validBefore`.
    #[error("invalid validity window: validAfter exceeds validBefore")]
    InvalidWindow,
    /// The signature is not 65 bytes (`r ‖ s ‖ v`).
    #[error("signature must be 65 bytes, got {0}")]
    BadSignatureLength(usize),
    /// An `upto` metering descriptor with a zero unit price.
    #[error("metering pricePerUnit must be positive")]
    ZeroUnitPrice,
}

/// Validates server-side payment requirements.
///
/// # Errors
///
/// Returns the first violated invariant.
pub fn validate_requirements(requirements: &PaymentRequirements) -> Result<(), ValidationError> {
    Url::parse(&requirements.resource)
        .map_err(|_| ValidationError::InvalidResource(requirements.resource.clone()))?;
    if requirements.max_timeout_seconds == 0 {
        return Err(ValidationError::NonPositiveTimeout);
    }
    Ok(())
}

/// Validates a signed authorization.
///
/// # Errors
///
/// Returns the first violated invariant.
pub fn validate_authorization(authorization: &Authorization) -> Result<(), ValidationError> {
    if authorization.value.is_zero() {
        return Err(ValidationError::ZeroValue);
    }
    if authorization.valid_after > authorization.valid_before {
        return Err(ValidationError::InvalidWindow);
    }
    Ok(())
}

/// Validates a decoded payment payload, including its inner authorization.
///
/// # Errors
///
/// Returns the first violated invariant.
pub fn validate_payload(payload: &PaymentPayload) -> Result<(), ValidationError> {
    validate_exact_payload(&payload.payload)
}

fn validate_exact_payload(payload: &ExactPayload) -> Result<(), ValidationError> {
    let len = payload.signature.len();
    if len != 65 {
        return Err(ValidationError::BadSignatureLength(len));
    }
    if let Some(metering) = &payload.metering {
        if metering.price_per_unit.is_zero() {
            return Err(ValidationError::ZeroUnitPrice);
        }
    }
    validate_authorization(&payload.authorization)
}
