//! Protocol version 1 wire types.
//!
//! Version 1 identifies chains by network name (e.g. `"base-sepolia"`)
//! and carries the signed payload in the `X-PAYMENT` header as
//! base64-encoded JSON.

use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::amount::TokenAmount;
use crate::networks::Network;
use crate::scheme::{Metering, Scheme};
use crate::timestamp::UnixTimestamp;

/// Default EIP-712 domain name when `requirements.extra` is absent.
pub const DEFAULT_DOMAIN_NAME: &str = "USD Coin";

/// Default EIP-712 domain version when `requirements.extra` is absent.
pub const DEFAULT_DOMAIN_VERSION: &str = "2";

/// Version marker that serializes as the integer `1` and rejects
/// every other value on deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct X402Version1;

impl Serialize for X402Version1 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(1)
    }
}

impl<'de> Deserialize<'de> for X402Version1 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let version = u8::deserialize(deserializer)?;
        if version == 1 {
            Ok(Self)
        } else {
            Err(serde::de::Error::custom(format!(
                "unsupported x402 version {version}"
            )))
        }
    }
}

/// The signed inner object of a payment payload.
///
/// This is the exact structure covered by the EIP-712 signature: who may
/// transfer, to whom, how much, during which window, under which nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    /// The address authorizing the transfer (token holder).
    pub from: Address,
    /// The recipient of the transfer.
    pub to: Address,
    /// The transfer amount in atomic units. For `upto` this is the
    /// signed maximum.
    pub value: TokenAmount,
    /// The authorization is not valid before this timestamp.
    pub valid_after: UnixTimestamp,
    /// The authorization expires at this timestamp.
    pub valid_before: UnixTimestamp,
    /// Random 32-byte nonce preventing replay.
    pub nonce: B256,
}

/// Scheme-specific payload carried inside [`PaymentPayload`].
///
/// `exact` and `upto` share the same shape; `upto` may additionally
/// carry a [`Metering`] descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactPayload {
    /// 65-byte EIP-712 signature (`r ‖ s ‖ v`) over the authorization.
    pub signature: Bytes,
    /// The structured authorization data that was signed.
    pub authorization: Authorization,
    /// Optional metering descriptor (`upto` only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metering: Option<Metering>,
}

/// The outer payment object embedded in the `X-PAYMENT` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// Protocol version (always 1).
    pub x402_version: X402Version1,
    /// The payment scheme the client signed for.
    pub scheme: Scheme,
    /// The network the client signed for.
    pub network: Network,
    /// The scheme-specific signed payload.
    pub payload: ExactPayload,
}

/// EIP-712 domain parameters carried in `requirements.extra`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementsExtra {
    /// Token name used in the EIP-712 domain.
    pub name: String,
    /// Token version used in the EIP-712 domain.
    pub version: String,
}

impl Default for RequirementsExtra {
    fn default() -> Self {
        Self {
            name: DEFAULT_DOMAIN_NAME.to_owned(),
            version: DEFAULT_DOMAIN_VERSION.to_owned(),
        }
    }
}

/// Payment terms demanded by the resource server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// The payment scheme.
    pub scheme: Scheme,
    /// The network to pay on.
    pub network: Network,
    /// The maximum amount required, in atomic units.
    pub max_amount_required: TokenAmount,
    /// Absolute URL of the resource being paid for.
    pub resource: String,
    /// Human-readable description of the resource.
    pub description: String,
    /// MIME type of the resource.
    pub mime_type: String,
    /// Optional JSON schema of the resource output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
    /// The recipient address.
    pub pay_to: Address,
    /// Maximum authorization validity window in seconds.
    pub max_timeout_seconds: u64,
    /// The token contract address.
    pub asset: Address,
    /// Optional EIP-712 domain override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<RequirementsExtra>,
}

impl PaymentRequirements {
    /// The EIP-712 domain name and version for this requirement,
    /// falling back to the USDC defaults.
    #[must_use]
    pub fn domain_parameters(&self) -> (String, String) {
        self.extra.as_ref().map_or_else(
            || (DEFAULT_DOMAIN_NAME.to_owned(), DEFAULT_DOMAIN_VERSION.to_owned()),
            |extra| (extra.name.clone(), extra.version.clone()),
        )
    }
}

/// HTTP 402 Payment Required response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// Protocol version (always 1).
    pub x402_version: X402Version1,
    /// Acceptable payment options, in server preference order.
    #[serde(default)]
    pub accepts: Vec<PaymentRequirements>,
    /// Optional error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PaymentRequired {
    /// Builds the canonical 402 body for a set of payment options.
    #[must_use]
    pub fn new(accepts: Vec<PaymentRequirements>) -> Self {
        Self {
            x402_version: X402Version1,
            accepts,
            error: Some("Payment required".to_owned()),
        }
    }
}

/// Settlement receipt returned in the `X-PAYMENT-RESPONSE` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    /// Whether settlement succeeded.
    pub success: bool,
    /// The on-chain transaction hash, when one was broadcast.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
    /// The network settlement happened on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_id: Option<Network>,
    /// The amount actually charged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_amount: Option<TokenAmount>,
    /// Error message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Request body for `POST /verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// Protocol version (always 1).
    pub x402_version: X402Version1,
    /// The raw base64 `X-PAYMENT` header value.
    pub payment_header: String,
    /// The requirements to verify against.
    pub payment_requirements: PaymentRequirements,
}

/// Response body for `POST /verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    /// Whether the payment satisfies the requirements.
    pub is_valid: bool,
    /// Human-readable rejection reason when invalid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
}

/// Request body for `POST /settle`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleRequest {
    /// Protocol version (always 1).
    pub x402_version: X402Version1,
    /// The raw base64 `X-PAYMENT` header value.
    pub payment_header: String,
    /// The requirements to settle against.
    pub payment_requirements: PaymentRequirements,
    /// For `upto`, the amount to charge; must not exceed the signed value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_amount: Option<TokenAmount>,
}

/// Response body for `POST /settle`.
pub type SettleResponse = PaymentResponse;

/// One (scheme, network) pair advertised by `/supported`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedKind {
    /// The advertised scheme.
    pub scheme: Scheme,
    /// The advertised network.
    pub network: Network,
}

/// Response body for `GET /supported`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedResponse {
    /// Every (scheme, network) pair the facilitator serves.
    #[serde(default)]
    pub kinds: Vec<SupportedKind>,
}

impl SupportedResponse {
    /// Builds the full cross product of supported schemes and networks.
    #[must_use]
    pub fn all_kinds() -> Self {
        let kinds = Network::ALL
            .iter()
            .flat_map(|&network| {
                Scheme::ALL
                    .iter()
                    .map(move |&scheme| SupportedKind { scheme, network })
            })
            .collect();
        Self { kinds }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    fn sample_requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: Scheme::Exact,
            network: Network::BaseSepolia,
            max_amount_required: TokenAmount::from(10_000u64),
            resource: "https://api.example.com/weather".to_owned(),
            description: "Weather data".to_owned(),
            mime_type: "application/json".to_owned(),
            output_schema: None,
            pay_to: address!("0x1111111111111111111111111111111111111111"),
            max_timeout_seconds: 60,
            asset: Network::BaseSepolia.usdc_address(),
            extra: None,
        }
    }

    #[test]
    fn requirements_serialize_camel_case() {
        let json = serde_json::to_value(sample_requirements()).unwrap();
        assert_eq!(json["scheme"], "exact");
        assert_eq!(json["network"], "base-sepolia");
        assert_eq!(json["maxAmountRequired"], "10000");
        assert_eq!(json["maxTimeoutSeconds"], 60);
        assert!(json.get("outputSchema").is_none());
    }

    #[test]
    fn version_marker_rejects_unknown() {
        let err = serde_json::from_value::<X402Version1>(serde_json::json!(2)).unwrap_err();
        assert!(err.to_string().contains("unsupported x402 version"));
    }

    #[test]
    fn payment_required_body_shape() {
        let body = PaymentRequired::new(vec![sample_requirements()]);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["x402Version"], 1);
        assert_eq!(json["error"], "Payment required");
        assert_eq!(json["accepts"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn supported_cross_product() {
        let supported = SupportedResponse::all_kinds();
        assert_eq!(supported.kinds.len(), Network::ALL.len() * Scheme::ALL.len());
    }

    #[test]
    fn domain_defaults() {
        let (name, version) = sample_requirements().domain_parameters();
        assert_eq!(name, "USD Coin");
        assert_eq!(version, "2");
    }
}
