//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guard_cache_requests_total` (counter): lookups by cache, result (hit/miss/expired)
//! - `guard_cache_evictions_total` (counter): LRU evictions by cache
//! - `guard_cache_entries` (gauge): current entry count by cache
//! - `guard_wait_attempts_total` (counter): condition invocations by outcome
//! - `guard_throttle_waits_total` (counter): limiter waits by service, operation
//! - `guard_throttle_wait_seconds` (histogram): time spent blocked on a bucket
//! - `guard_throttle_resets_total` (counter): buckets refilled after a throttle signal
//!
//! # Design Decisions
//! - Low-overhead metric updates through the `metrics` facade
//! - Exporter is optional and installed only by the binary

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on the given address.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_cache_lookup(cache: &str, result: &'static str) {
    counter!("guard_cache_requests_total", "cache" => cache.to_string(), "result" => result)
        .increment(1);
}

pub fn record_cache_eviction(cache: &str) {
    counter!("guard_cache_evictions_total", "cache" => cache.to_string()).increment(1);
}

pub fn record_cache_size(cache: &str, size: usize) {
    gauge!("guard_cache_entries", "cache" => cache.to_string()).set(size as f64);
}

pub fn record_wait_attempt(outcome: &'static str) {
    counter!("guard_wait_attempts_total", "outcome" => outcome).increment(1);
}

pub fn record_throttle_wait(service: &str, operation: &str, waited: Duration) {
    counter!(
        "guard_throttle_waits_total",
        "service" => service.to_string(),
        "operation" => operation.to_string()
    )
    .increment(1);
    histogram!("guard_throttle_wait_seconds", "service" => service.to_string())
        .record(waited.as_secs_f64());
}

pub fn record_throttle_reset(service: &str, operation: &str) {
    counter!(
        "guard_throttle_resets_total",
        "service" => service.to_string(),
        "operation" => operation.to_string()
    )
    .increment(1);
}
