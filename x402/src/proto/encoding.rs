//! Base64 + JSON codec for payment headers.
//!
//! Payment payloads and receipts travel in HTTP headers as
//! base64-encoded UTF-8 JSON. Signatures are over the EIP-712 struct,
//! not over JSON bytes, so the codec only needs round-trip fidelity —
//! not canonical byte equality.

use base64::engine::general_purpose::STANDARD as b64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;

/// A wrapper for base64-encoded byte data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Bytes(pub Vec<u8>);

impl Base64Bytes {
    /// Encodes raw binary data into base64 string bytes.
    pub fn encode<T: AsRef<[u8]>>(input: T) -> Self {
        Self(b64.encode(input.as_ref()).into_bytes())
    }

    /// Decodes the base64 string bytes back to raw binary data.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        b64.decode(&self.0)
    }
}

impl AsRef<[u8]> for Base64Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for Base64Bytes {
    fn from(slice: &[u8]) -> Self {
        Self(slice.to_vec())
    }
}

impl Display for Base64Bytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// Errors from encoding or decoding a payment header.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The header is not valid base64.
    #[error("invalid base64 payment header: {0}")]
    Base64(#[from] base64::DecodeError),
    /// The decoded bytes are not the expected JSON shape.
    #[error("malformed payment header: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encodes a wire value as a base64 header string.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if the value cannot be serialized.
pub fn encode_payment<T: Serialize>(value: &T) -> Result<String, CodecError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64Bytes::encode(json).to_string())
}

/// Decodes a base64 header string into a wire value.
///
/// # Errors
///
/// Returns [`CodecError`] on invalid base64 or a JSON shape mismatch —
/// including numeric encodings of amounts or timestamps, which the wire
/// types reject.
pub fn decode_payment<T: DeserializeOwned>(header: &str) -> Result<T, CodecError> {
    let bytes = Base64Bytes::from(header.as_bytes()).decode()?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Non-failing decode variant: `None` on any malformation.
#[must_use]
pub fn safe_decode<T: DeserializeOwned>(header: &str) -> Option<T> {
    decode_payment(header).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{PaymentResponse, X402Version1};
    use crate::{Network, TokenAmount};
    use alloy_primitives::B256;

    #[test]
    fn header_round_trip() {
        let receipt = PaymentResponse {
            success: true,
            tx_hash: Some(B256::repeat_byte(0xab)),
            network_id: Some(Network::BaseSepolia),
            actual_amount: Some(TokenAmount::from(10_000u64)),
            error: None,
        };
        let header = encode_payment(&receipt).unwrap();
        let decoded: PaymentResponse = decode_payment(&header).unwrap();
        assert_eq!(decoded, receipt);
    }

    #[test]
    fn rejects_invalid_base64() {
        assert!(decode_payment::<PaymentResponse>("not base64!!!").is_err());
        assert!(safe_decode::<PaymentResponse>("not base64!!!").is_none());
    }

    #[test]
    fn rejects_numeric_amount_encodings() {
        // `value` as a JSON number must be refused, not silently accepted.
        let json = br#"{"success":true,"actualAmount":10000}"#;
        let header = Base64Bytes::encode(json).to_string();
        assert!(decode_payment::<PaymentResponse>(&header).is_err());
    }

    #[test]
    fn rejects_unknown_version() {
        #[derive(serde::Deserialize)]
        struct Versioned {
            #[serde(rename = "x402Version")]
            _version: X402Version1,
        }
        let header = Base64Bytes::encode(br#"{"x402Version":2}"#).to_string();
        assert!(decode_payment::<Versioned>(&header).is_err());
    }
}
