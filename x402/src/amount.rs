//! Token amounts in atomic units.
//!
//! Amounts travel as decimal strings on the wire and as 256-bit integers
//! in memory. They are never represented as floats anywhere in the
//! protocol; the only float-adjacent operation is display formatting.

use alloy_primitives::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A token amount in the token's smallest unit (e.g. 1 USDC = `1000000`).
///
/// # Serialization
///
/// Serialized as a decimal string (`"10000"`). Numeric JSON encodings are
/// rejected on input to avoid silent precision loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TokenAmount(pub U256);

impl TokenAmount {
    /// The zero amount.
    pub const ZERO: Self = Self(U256::ZERO);

    /// Returns the inner 256-bit value.
    #[must_use]
    pub const fn as_u256(&self) -> U256 {
        self.0
    }

    /// Whether the amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<u64> for TokenAmount {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl From<U256> for TokenAmount {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl From<TokenAmount> for U256 {
    fn from(value: TokenAmount) -> Self {
        value.0
    }
}

impl FromStr for TokenAmount {
    type Err = alloy_primitives::ruint::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(U256::from_str_radix(s, 10)?))
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse()
            .map_err(|_| serde::de::Error::custom("amount must be a decimal string"))
    }
}

/// Formats an atomic USDC amount at 6-decimal fixed point (e.g. `"1.500000"`).
#[must_use]
pub fn format_usdc(amount: TokenAmount) -> String {
    let scale = U256::from(1_000_000u64);
    let whole = amount.0 / scale;
    let frac = amount.0 % scale;
    format!("{whole}.{frac:06}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_decimal_strings() {
        let amount: TokenAmount = "340282366920938463463374607431768211456".parse().unwrap();
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"340282366920938463463374607431768211456\"");
        assert_eq!(serde_json::from_str::<TokenAmount>(&json).unwrap(), amount);
    }

    #[test]
    fn rejects_numeric_encoding() {
        assert!(serde_json::from_str::<TokenAmount>("10000").is_err());
        assert!(serde_json::from_str::<TokenAmount>("\"-1\"").is_err());
        assert!(serde_json::from_str::<TokenAmount>("\"1.5\"").is_err());
    }

    #[test]
    fn usdc_display_scale() {
        assert_eq!(format_usdc(TokenAmount::from(1_500_000u64)), "1.500000");
        assert_eq!(format_usdc(TokenAmount::from(42u64)), "0.000042");
    }
}
