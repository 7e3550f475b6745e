//! Unix timestamp type for payment authorization windows.
//!
//! Authorization validity is expressed as a `[validAfter, validBefore]`
//! window of Unix seconds. Timestamps are serialized as stringified
//! integers so that JSON consumers never round them through a float.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Add;
use std::time::SystemTime;

/// Seconds since the Unix epoch.
///
/// # Serialization
///
/// Serialized as a decimal string (`"1699999999"`), never as a JSON
/// number, to preserve precision beyond 53 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnixTimestamp(u64);

impl UnixTimestamp {
    /// Creates a timestamp from raw seconds.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Returns the current system time.
    ///
    /// # Panics
    ///
    /// Panics if the system clock is set before the Unix epoch.
    #[must_use]
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .expect("system clock before Unix epoch")
            .as_secs();
        Self(secs)
    }

    /// Raw seconds since the Unix epoch.
    #[must_use]
    pub const fn as_secs(&self) -> u64 {
        self.0
    }

    /// Subtracts `rhs` seconds, clamping at zero.
    #[must_use]
    pub const fn saturating_sub(self, rhs: u64) -> Self {
        Self(self.0.saturating_sub(rhs))
    }
}

impl Add<u64> for UnixTimestamp {
    type Output = Self;

    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl fmt::Display for UnixTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for UnixTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for UnixTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let secs = s
            .parse::<u64>()
            .map_err(|_| serde::de::Error::custom("timestamp must be a decimal string"))?;
        Ok(Self(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_string() {
        let ts = UnixTimestamp::from_secs(1_699_999_999);
        assert_eq!(serde_json::to_string(&ts).unwrap(), "\"1699999999\"");
    }

    #[test]
    fn rejects_numeric_encoding() {
        assert!(serde_json::from_str::<UnixTimestamp>("1699999999").is_err());
    }

    #[test]
    fn window_ordering() {
        let after = UnixTimestamp::from_secs(100);
        let before = UnixTimestamp::from_secs(200);
        assert!(after <= before);
        assert_eq!(before.saturating_sub(500).as_secs(), 0);
    }
}
