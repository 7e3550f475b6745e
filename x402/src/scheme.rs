//! Payment scheme identifiers.
//!
//! The protocol currently defines two schemes. Both share the same signed
//! authorization structure; they differ only in how the settled amount
//! relates to the signed value:
//!
//! - `exact` — the signed value equals the charged value
//! - `upto` — the signed value is a maximum; the server may settle for
//!   any amount up to it

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::amount::TokenAmount;

/// The payment scheme named in requirements and payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// Signed value equals the charged value.
    Exact,
    /// Signed value is a maximum; the charge may be anything up to it.
    Upto,
}

impl Scheme {
    /// All schemes advertised by `/supported`.
    pub const ALL: [Self; 2] = [Self::Exact, Self::Upto];

    /// The canonical wire name of the scheme.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Upto => "upto",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(Self::Exact),
            "upto" => Ok(Self::Upto),
            other => Err(format!("unknown payment scheme '{other}'")),
        }
    }
}

/// Optional metering descriptor carried by `upto` payloads.
///
/// Describes how the server is expected to compute the charged amount.
/// Purely informational for the facilitator; the binding constraint is
/// that the charge never exceeds the signed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metering {
    /// The metered unit (e.g. "token", "request", "second").
    pub unit: String,
    /// Price per unit in atomic units.
    pub price_per_unit: TokenAmount,
    /// Maximum number of units covered by the signed value.
    pub max_units: u64,
}
