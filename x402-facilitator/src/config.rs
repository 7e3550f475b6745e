//! Facilitator configuration from the environment.
//!
//! # Environment Variables
//!
//! - `FACILITATOR_PRIVATE_KEY` — required hex operating key
//! - `PORT` — listen port (default 4020)
//! - `RATE_LIMIT` — requests per second (default 50)
//! - `RATE_LIMIT_ENABLED` — default `true`
//! - `METRICS_ENABLED` — default `true`
//! - `NONCE_TTL_SECS` — replay-cache TTL (default 300)
//! - `RPC_URL_<NETWORK_ID>` — per-network RPC override (dashes→underscores)
//! - `RUST_LOG` — log level filter

use std::time::Duration;

use crate::nonce::DEFAULT_NONCE_TTL;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 4020;

/// Default rate limit in requests per second.
pub const DEFAULT_RATE_LIMIT: u32 = 50;

/// Configuration errors. Any of these is fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is absent.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    /// An environment variable holds an unparseable value.
    #[error("invalid value for {var}: '{value}'")]
    Invalid {
        /// The variable name.
        var: &'static str,
        /// The offending value.
        value: String,
    },
}

/// Parsed facilitator configuration.
#[derive(Clone)]
pub struct FacilitatorConfig {
    /// The operating key, hex with or without `0x` prefix.
    pub private_key: String,
    /// Listen port.
    pub port: u16,
    /// Token-bucket rate in requests per second.
    pub rate_limit: u32,
    /// Whether the rate limiter is active.
    pub rate_limit_enabled: bool,
    /// Whether `/metrics` is served.
    pub metrics_enabled: bool,
    /// Replay-cache entry TTL.
    pub nonce_ttl: Duration,
}

// The private key must never appear in logs.
impl std::fmt::Debug for FacilitatorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacilitatorConfig")
            .field("private_key", &"<redacted>")
            .field("port", &self.port)
            .field("rate_limit", &self.rate_limit)
            .field("rate_limit_enabled", &self.rate_limit_enabled)
            .field("metrics_enabled", &self.metrics_enabled)
            .field("nonce_ttl", &self.nonce_ttl)
            .finish()
    }
}

impl FacilitatorConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `FACILITATOR_PRIVATE_KEY` is absent
    /// or any variable is unparseable; the binary exits non-zero on it.
    pub fn from_env() -> Result<Self, ConfigError> {
        let private_key = std::env::var("FACILITATOR_PRIVATE_KEY")
            .map_err(|_| ConfigError::Missing("FACILITATOR_PRIVATE_KEY"))?;

        Ok(Self {
            private_key,
            port: parse_var("PORT", DEFAULT_PORT)?,
            rate_limit: parse_var("RATE_LIMIT", DEFAULT_RATE_LIMIT)?,
            rate_limit_enabled: bool_var("RATE_LIMIT_ENABLED", true)?,
            metrics_enabled: bool_var("METRICS_ENABLED", true)?,
            nonce_ttl: Duration::from_secs(parse_var(
                "NONCE_TTL_SECS",
                DEFAULT_NONCE_TTL.as_secs(),
            )?),
        })
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
        Err(_) => Ok(default),
    }
}

fn bool_var(var: &'static str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::Invalid { var, value: raw }),
        },
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_the_private_key() {
        let config = FacilitatorConfig {
            private_key: "0xdeadbeef".to_owned(),
            port: DEFAULT_PORT,
            rate_limit: DEFAULT_RATE_LIMIT,
            rate_limit_enabled: true,
            metrics_enabled: true,
            nonce_ttl: DEFAULT_NONCE_TTL,
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("deadbeef"));
        assert!(rendered.contains("<redacted>"));
    }
}
