//! Per-host circuit breakers.
//!
//! State machine: closed → open (after `failure_threshold` consecutive
//! failures) → half-open (after `reset_timeout`) → closed (after
//! `success_threshold` consecutive half-open successes). A failure in
//! half-open reopens the circuit.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Circuit breaker configuration.
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long the circuit stays open before allowing a probe.
    pub reset_timeout: Duration,
    /// Consecutive half-open successes before the circuit closes.
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation.
    Closed,
    /// Requests are rejected without being attempted.
    Open,
    /// A limited probe is allowed through.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => f.write_str("closed"),
            Self::Open => f.write_str("open"),
            Self::HalfOpen => f.write_str("half-open"),
        }
    }
}

/// Error returned when a request is short-circuited.
#[derive(Debug, Clone, thiserror::Error)]
#[error("circuit breaker open for host '{host}', retry in {retry_in_ms}ms")]
pub struct CircuitOpenError {
    /// The host whose circuit is open.
    pub host: String,
    /// Milliseconds until the next probe is allowed.
    pub retry_in_ms: u64,
}

struct HostCircuit {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    opened_at: Option<Instant>,
}

impl HostCircuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            half_open_successes: 0,
            opened_at: None,
        }
    }
}

/// A set of circuit breakers keyed by host.
pub struct CircuitBreakerSet {
    circuits: Mutex<HashMap<String, HostCircuit>>,
    config: BreakerConfig,
}

impl std::fmt::Debug for CircuitBreakerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerSet")
            .field("hosts", &self.circuits.lock().len())
            .field("config", &self.config)
            .finish()
    }
}

impl Default for CircuitBreakerSet {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}

impl CircuitBreakerSet {
    /// Creates a breaker set with the given configuration.
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            circuits: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Checks whether a request to `host` may proceed.
    ///
    /// Transitions open circuits to half-open once the reset timeout has
    /// elapsed, admitting the caller as the probe.
    ///
    /// # Errors
    ///
    /// Returns [`CircuitOpenError`] while the circuit is open.
    pub fn try_acquire(&self, host: &str) -> Result<(), CircuitOpenError> {
        let mut circuits = self.circuits.lock();
        let circuit = circuits
            .entry(host.to_owned())
            .or_insert_with(HostCircuit::new);

        match circuit.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let elapsed = circuit.opened_at.map_or(Duration::ZERO, |t| t.elapsed());
                if elapsed >= self.config.reset_timeout {
                    tracing::info!(host, "circuit breaker transitioning to half-open");
                    circuit.state = CircuitState::HalfOpen;
                    circuit.half_open_successes = 0;
                    Ok(())
                } else {
                    let retry_in = self.config.reset_timeout - elapsed;
                    Err(CircuitOpenError {
                        host: host.to_owned(),
                        retry_in_ms: retry_in.as_millis() as u64,
                    })
                }
            }
        }
    }

    /// Records a successful request to `host`.
    pub fn record_success(&self, host: &str) {
        let mut circuits = self.circuits.lock();
        let Some(circuit) = circuits.get_mut(host) else {
            return;
        };
        match circuit.state {
            CircuitState::Closed => circuit.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                circuit.half_open_successes += 1;
                if circuit.half_open_successes >= self.config.success_threshold {
                    tracing::info!(host, "circuit breaker closed after successful probes");
                    circuit.state = CircuitState::Closed;
                    circuit.consecutive_failures = 0;
                    circuit.opened_at = None;
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Records a failed request to `host`.
    pub fn record_failure(&self, host: &str) {
        let mut circuits = self.circuits.lock();
        let circuit = circuits
            .entry(host.to_owned())
            .or_insert_with(HostCircuit::new);
        match circuit.state {
            CircuitState::Closed => {
                circuit.consecutive_failures += 1;
                if circuit.consecutive_failures >= self.config.failure_threshold {
                    tracing::warn!(
                        host,
                        failures = circuit.consecutive_failures,
                        "circuit breaker opened"
                    );
                    circuit.state = CircuitState::Open;
                    circuit.opened_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen => {
                tracing::warn!(host, "circuit breaker reopened after probe failure");
                circuit.state = CircuitState::Open;
                circuit.opened_at = Some(Instant::now());
                circuit.half_open_successes = 0;
            }
            CircuitState::Open => {
                circuit.opened_at = Some(Instant::now());
            }
        }
    }

    /// The current state of the circuit for `host`.
    #[must_use]
    pub fn state(&self, host: &str) -> CircuitState {
        self.circuits
            .lock()
            .get(host)
            .map_or(CircuitState::Closed, |c| c.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> BreakerConfig {
        BreakerConfig {
            failure_threshold: 3,
            reset_timeout: Duration::from_millis(50),
            success_threshold: 2,
        }
    }

    #[test]
    fn opens_after_exactly_threshold_failures() {
        let set = CircuitBreakerSet::new(test_config());
        set.record_failure("api.example.com");
        set.record_failure("api.example.com");
        assert_eq!(set.state("api.example.com"), CircuitState::Closed);
        set.record_failure("api.example.com");
        assert_eq!(set.state("api.example.com"), CircuitState::Open);
        assert!(set.try_acquire("api.example.com").is_err());
    }

    #[test]
    fn success_resets_consecutive_failures() {
        let set = CircuitBreakerSet::new(test_config());
        set.record_failure("h");
        set.record_failure("h");
        set.record_success("h");
        set.record_failure("h");
        set.record_failure("h");
        assert_eq!(set.state("h"), CircuitState::Closed);
    }

    #[test]
    fn half_open_probe_then_close() {
        let set = CircuitBreakerSet::new(test_config());
        for _ in 0..3 {
            set.record_failure("h");
        }
        std::thread::sleep(Duration::from_millis(60));
        assert!(set.try_acquire("h").is_ok());
        assert_eq!(set.state("h"), CircuitState::HalfOpen);

        set.record_success("h");
        assert_eq!(set.state("h"), CircuitState::HalfOpen);
        set.record_success("h");
        assert_eq!(set.state("h"), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_reopens() {
        let set = CircuitBreakerSet::new(test_config());
        for _ in 0..3 {
            set.record_failure("h");
        }
        std::thread::sleep(Duration::from_millis(60));
        assert!(set.try_acquire("h").is_ok());
        set.record_failure("h");
        assert_eq!(set.state("h"), CircuitState::Open);
    }

    #[test]
    fn hosts_are_independent() {
        let set = CircuitBreakerSet::new(test_config());
        for _ in 0..3 {
            set.record_failure("down.example.com");
        }
        assert!(set.try_acquire("up.example.com").is_ok());
        assert!(set.try_acquire("down.example.com").is_err());
    }
}
