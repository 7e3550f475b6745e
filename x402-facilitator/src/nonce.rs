//! Replay protection cache.
//!
//! Keys are `(network, nonce)`; values are absolute expiry instants. The
//! cache is a latency and cost optimization, not the security boundary:
//! the token contract enforces nonce uniqueness on-chain, so entries may
//! be evicted early (size cap) without opening a replay hole.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy_primitives::B256;
use parking_lot::Mutex;

use x402::Network;

/// Default entry TTL. Must be at least the maximum
/// `validBefore - validAfter` window the facilitator accepts.
pub const DEFAULT_NONCE_TTL: Duration = Duration::from_secs(300);

/// How often the background sweeper runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Soft size cap; exceeding it evicts the oldest half of the cache.
pub const DEFAULT_SOFT_CAP: usize = 10_000;

/// Bounded-memory set of seen `(network, nonce)` pairs.
pub struct NonceCache {
    entries: Mutex<HashMap<(Network, B256), Instant>>,
    ttl: Duration,
    soft_cap: usize,
    replays_blocked: AtomicU64,
}

impl std::fmt::Debug for NonceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceCache")
            .field("entries", &self.entries.lock().len())
            .field("ttl", &self.ttl)
            .field("soft_cap", &self.soft_cap)
            .finish()
    }
}

impl NonceCache {
    /// Creates a cache with the given TTL and the default soft cap.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_soft_cap(ttl, DEFAULT_SOFT_CAP)
    }

    /// Creates a cache with explicit TTL and soft cap.
    #[must_use]
    pub fn with_soft_cap(ttl: Duration, soft_cap: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            soft_cap,
            replays_blocked: AtomicU64::new(0),
        }
    }

    /// Checks whether `(network, nonce)` was already accepted within the
    /// TTL. A hit increments the replay counter.
    #[must_use]
    pub fn is_replay(&self, network: Network, nonce: B256) -> bool {
        let entries = self.entries.lock();
        match entries.get(&(network, nonce)) {
            Some(expiry) if *expiry > Instant::now() => {
                self.replays_blocked.fetch_add(1, Ordering::Relaxed);
                true
            }
            _ => false,
        }
    }

    /// Records an accepted nonce with expiry `now + ttl`.
    pub fn record(&self, network: Network, nonce: B256) {
        let mut entries = self.entries.lock();
        entries.insert((network, nonce), Instant::now() + self.ttl);
        if entries.len() > self.soft_cap {
            Self::evict_oldest_half(&mut entries);
        }
    }

    /// Evicts the oldest-expiring half of the cache, expired or not.
    fn evict_oldest_half(entries: &mut HashMap<(Network, B256), Instant>) {
        let mut by_expiry: Vec<_> = entries.iter().map(|(k, v)| (*k, *v)).collect();
        by_expiry.sort_by_key(|(_, expiry)| *expiry);
        let evict = by_expiry.len() / 2;
        for (key, _) in by_expiry.into_iter().take(evict) {
            entries.remove(&key);
        }
        tracing::warn!(evicted = evict, "nonce cache exceeded soft cap, truncated oldest half");
    }

    /// Removes expired entries, returning how many were removed.
    pub fn sweep(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        let now = Instant::now();
        entries.retain(|_, expiry| *expiry > now);
        before - entries.len()
    }

    /// Current number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Total replay attempts blocked since startup.
    #[must_use]
    pub fn replays_blocked(&self) -> u64 {
        self.replays_blocked.load(Ordering::Relaxed)
    }
}

/// Spawns the periodic sweeper task.
pub fn spawn_sweeper(cache: Arc<NonceCache>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let removed = cache.sweep();
            if removed > 0 {
                tracing::debug!(removed, remaining = cache.len(), "swept expired nonces");
            }
        }
    })
}
