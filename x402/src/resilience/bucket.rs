//! Token-bucket rate limiting.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

const WAIT_INCREMENT: Duration = Duration::from_millis(50);

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// A token bucket that starts full and refills continuously.
pub struct TokenBucket {
    max_tokens: f64,
    refill_rate_per_second: f64,
    state: Mutex<BucketState>,
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucket")
            .field("max_tokens", &self.max_tokens)
            .field("refill_rate_per_second", &self.refill_rate_per_second)
            .field("available", &self.available_tokens())
            .finish()
    }
}

impl TokenBucket {
    /// Creates a full bucket.
    #[must_use]
    pub fn new(max_tokens: u32, refill_rate_per_second: f64) -> Self {
        Self {
            max_tokens: f64::from(max_tokens),
            refill_rate_per_second,
            state: Mutex::new(BucketState {
                tokens: f64::from(max_tokens),
                last_refill: Instant::now(),
            }),
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let elapsed = state.last_refill.elapsed().as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_rate_per_second).min(self.max_tokens);
        state.last_refill = Instant::now();
    }

    /// Attempts to take `n` tokens without blocking.
    #[must_use]
    pub fn try_consume(&self, n: u32) -> bool {
        let mut state = self.state.lock();
        self.refill(&mut state);
        let needed = f64::from(n);
        if state.tokens >= needed {
            state.tokens -= needed;
            true
        } else {
            false
        }
    }

    /// Waits in 50 ms increments until `n` tokens are available, then
    /// consumes them.
    pub async fn wait_and_consume(&self, n: u32) {
        loop {
            if self.try_consume(n) {
                return;
            }
            tokio::time::sleep(WAIT_INCREMENT).await;
        }
    }

    /// Whole tokens currently available.
    #[must_use]
    pub fn available_tokens(&self) -> u64 {
        let mut state = self.state.lock();
        self.refill(&mut state);
        state.tokens as u64
    }
}
