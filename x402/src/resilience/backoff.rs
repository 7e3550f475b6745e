//! Exponential backoff with jitter.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Retry schedule: `delay = min(base · multiplier^(attempt-1) ± jitter, max)`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Growth factor between attempts.
    pub multiplier: f64,
    /// Jitter fraction applied symmetrically (0.1 = ±10%).
    pub jitter: f64,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            jitter: 0.1,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy with a different number of attempts and base delay.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Self::default()
        }
    }

    /// The delay to sleep after a failed `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let raw = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent as i32);
        let jitter = if self.jitter > 0.0 {
            rand::rng().random_range(-self.jitter..=self.jitter) * raw
        } else {
            0.0
        };
        let delayed = (raw + jitter).max(0.0);
        Duration::from_secs_f64(delayed.min(self.max_delay.as_secs_f64()))
    }
}

/// Runs `operation` under `policy`, sleeping between attempts.
///
/// `is_retryable` gates each failure: a non-retryable error is returned
/// immediately, as is the final error once the attempt budget is spent.
///
/// # Errors
///
/// Returns the last error produced by `operation`.
pub async fn retry<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    is_retryable: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= policy.max_attempts || !is_retryable(&err) {
                    return Err(err);
                }
                let delay = policy.delay_for(attempt);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying after failure");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            multiplier: 2.0,
            jitter: 0.0,
            max_delay: Duration::from_millis(10),
        }
    }

    #[test]
    fn delay_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            jitter: 0.0,
            max_delay: Duration::from_secs(30),
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(10), Duration::from_secs(30));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let delay = policy.delay_for(1).as_secs_f64();
            assert!((0.9..=1.1).contains(&delay), "delay {delay} out of jitter range");
        }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<u32, &str> = retry(&fast_policy(), |_| true, move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("transient")
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_errors_fail_fast() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<(), &str> = retry(
            &fast_policy(),
            |e: &&str| !e.contains("declined"),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err("payment declined") }
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn budget_exhaustion_returns_last_error() {
        let result: Result<(), &str> =
            retry(&fast_policy(), |_| true, || async { Err("still down") }).await;
        assert_eq!(result, Err("still down"));
    }
}
