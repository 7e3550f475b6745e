//! Verification failure reasons.
//!
//! The verifier never throws across its public boundary; it folds one of
//! these reasons into a structured result. Message text is part of the
//! protocol surface: clients and tests match on substrings such as
//! "replay", "insufficient", and "expired".

use crate::amount::TokenAmount;
use crate::networks::Network;
use crate::scheme::Scheme;

/// Why a payment failed verification.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PaymentVerificationError {
    /// The header is not decodable as a v1 payment payload.
    #[error("malformed payment header: {0}")]
    Malformed(String),
    /// The payload's scheme differs from the requirements.
    #[error("scheme mismatch: payment is '{payload}', requirements demand '{required}'")]
    SchemeMismatch {
        /// Scheme in the payload.
        payload: Scheme,
        /// Scheme in the requirements.
        required: Scheme,
    },
    /// The payload's network differs from the requirements.
    #[error("network mismatch: payment is '{payload}', requirements demand '{required}'")]
    NetworkMismatch {
        /// Network in the payload.
        payload: Network,
        /// Network in the requirements.
        required: Network,
    },
    /// The `(network, nonce)` pair was already accepted within the TTL.
    #[error("nonce already used (replay detected)")]
    Replay,
    /// `authorization.to` does not match `requirements.payTo`.
    #[error("recipient mismatch: authorized {authorized}, required {required}")]
    RecipientMismatch {
        /// Recipient in the authorization.
        authorized: alloy_primitives::Address,
        /// Recipient demanded by the requirements.
        required: alloy_primitives::Address,
    },
    /// The signed value is below the required amount.
    #[error("insufficient authorized amount: {value} < {required}")]
    InsufficientAmount {
        /// The signed value.
        value: TokenAmount,
        /// The required amount.
        required: TokenAmount,
    },
    /// The validity window has not opened yet.
    #[error("authorization not yet valid (validAfter is in the future)")]
    NotYetValid,
    /// The validity window has closed.
    #[error("authorization expired (validBefore is in the past)")]
    Expired,
    /// The window itself is inverted.
    #[error("invalid validity window: validAfter exceeds validBefore")]
    InvalidWindow,
    /// The signature bytes are not a well-formed 65-byte signature.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    /// The recovered signer is not the authorizer.
    #[error("signature/authorizer mismatch: recovered {recovered}, expected {expected}")]
    SignerMismatch {
        /// Address recovered from the signature.
        recovered: alloy_primitives::Address,
        /// The claimed authorizer.
        expected: alloy_primitives::Address,
    },
    /// The holder's on-chain balance is below the signed value.
    #[error("insufficient funds: balance {balance} < value {value}")]
    InsufficientFunds {
        /// The on-chain balance.
        balance: TokenAmount,
        /// The signed value.
        value: TokenAmount,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_texts_carry_protocol_keywords() {
        assert!(PaymentVerificationError::Replay.to_string().contains("replay"));
        let amount = PaymentVerificationError::InsufficientAmount {
            value: TokenAmount::from(10_000u64),
            required: TokenAmount::from(20_000u64),
        };
        let text = amount.to_string();
        assert!(text.contains("insufficient"));
        assert!(text.contains("< 20000"));
        assert!(PaymentVerificationError::Expired.to_string().contains("expired"));
        assert!(PaymentVerificationError::NotYetValid
            .to_string()
            .contains("not yet valid"));
    }
}
