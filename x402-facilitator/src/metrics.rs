//! Prometheus metrics for the facilitator.

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use std::sync::LazyLock;

const LATENCY_BUCKETS_MS: &[f64] = &[
    1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 30_000.0,
];

/// Seconds since the facilitator started.
pub static UPTIME: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!("x402_uptime_seconds", "Seconds since facilitator start").unwrap()
});

/// Verification calls by result (`valid` / `invalid`).
pub static VERIFICATIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "x402_verifications_total",
        "Total verification requests",
        &["result"]
    )
    .unwrap()
});

/// Verification latency in milliseconds.
pub static VERIFICATION_LATENCY: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "x402_verification_latency_ms",
        "Verification latency in milliseconds",
        LATENCY_BUCKETS_MS.to_vec()
    )
    .unwrap()
});

/// Settlement calls by result (`success` / `failed`).
pub static SETTLEMENTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "x402_settlements_total",
        "Total settlement requests",
        &["result"]
    )
    .unwrap()
});

/// Settlement latency in milliseconds.
pub static SETTLEMENT_LATENCY: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "x402_settlement_latency_ms",
        "Settlement latency in milliseconds",
        LATENCY_BUCKETS_MS.to_vec()
    )
    .unwrap()
});

/// Total gas consumed by confirmed settlements.
pub static GAS_USED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("x402_gas_used_total", "Total gas used by settlements").unwrap()
});

/// Current nonce-cache size.
pub static NONCE_CACHE_SIZE: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!("x402_nonce_cache_size", "Entries in the nonce cache").unwrap()
});

/// Replay attempts blocked by the nonce cache.
pub static REPLAYS_BLOCKED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "x402_replay_attacks_blocked",
        "Replay attempts blocked by the nonce cache"
    )
    .unwrap()
});

/// Renders all registered metrics in Prometheus text exposition format.
#[must_use]
pub fn metrics_output() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposition_contains_required_metrics() {
        VERIFICATIONS.with_label_values(&["valid"]).inc();
        SETTLEMENTS.with_label_values(&["success"]).inc();
        GAS_USED.inc_by(65_000);
        REPLAYS_BLOCKED.inc();
        NONCE_CACHE_SIZE.set(3);
        UPTIME.set(10);
        VERIFICATION_LATENCY.observe(12.0);
        SETTLEMENT_LATENCY.observe(900.0);

        let output = metrics_output();
        for name in [
            "x402_uptime_seconds",
            "x402_verifications_total",
            "x402_verification_latency_ms",
            "x402_settlements_total",
            "x402_settlement_latency_ms",
            "x402_gas_used_total",
            "x402_nonce_cache_size",
            "x402_replay_attacks_blocked",
        ] {
            assert!(output.contains(name), "missing metric {name}");
        }
    }
}
