//! Resilience primitives shared by the client engine and facilitator.
//!
//! - [`RetryPolicy`] — exponential backoff with jitter
//! - [`CircuitBreakerSet`] — per-host closed/open/half-open breakers
//! - [`TokenBucket`] — non-blocking and waiting rate limiting

mod backoff;
mod breaker;
mod bucket;

pub use backoff::{retry, RetryPolicy};
pub use breaker::{BreakerConfig, CircuitBreakerSet, CircuitOpenError, CircuitState};
pub use bucket::TokenBucket;
