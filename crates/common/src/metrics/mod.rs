//! Metrics and observability utilities
//!
//! Prometheus-style metrics for cache effectiveness, remote call volume
//! and request latency, with standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all CiteForge metrics
pub const METRICS_PREFIX: &str = "citeforge";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Remote bibliographic service
    describe_counter!(
        format!("{}_remote_calls_total", METRICS_PREFIX),
        Unit::Count,
        "Calls made to the bibliographic service"
    );

    describe_histogram!(
        format!("{}_remote_call_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Bibliographic service latency in seconds"
    );

    // Coordinator
    describe_counter!(
        format!("{}_resolved_items_total", METRICS_PREFIX),
        Unit::Count,
        "Library items resolved, by outcome"
    );

    describe_counter!(
        format!("{}_cache_write_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Per-item cache writes that failed"
    );

    // Cache metrics
    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache hits"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache misses"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record one call to the bibliographic service
pub fn record_remote_call(endpoint: &str, started: Instant, success: bool) {
    let outcome = if success { "success" } else { "error" };

    counter!(
        format!("{}_remote_calls_total", METRICS_PREFIX),
        "endpoint" => endpoint.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_remote_call_duration_seconds", METRICS_PREFIX),
        "endpoint" => endpoint.to_string()
    )
    .record(started.elapsed().as_secs_f64());
}

/// Helper to record resolve outcomes
pub fn record_resolved(status: &str, count: usize) {
    if count == 0 {
        return;
    }
    counter!(
        format!("{}_resolved_items_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(count as u64);
}

/// Helper to record a failed per-item cache write
pub fn record_cache_write_failure(cache_name: &str) {
    counter!(
        format!("{}_cache_write_failures_total", METRICS_PREFIX),
        "cache" => cache_name.to_string()
    )
    .increment(1);
}

/// Helper to record cache metrics
pub fn record_cache(hit: bool, cache_name: &str) {
    record_cache_many(hit, cache_name, 1);
}

/// Record several hits or misses at once
pub fn record_cache_many(hit: bool, cache_name: &str, count: usize) {
    if count == 0 {
        return;
    }
    let name = if hit { "cache_hits_total" } else { "cache_misses_total" };
    counter!(
        format!("{}_{}", METRICS_PREFIX, name),
        "cache" => cache_name.to_string()
    )
    .increment(count as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets() {
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_recorders_without_exporter() {
        let metrics = RequestMetrics::start("POST", "/v1/expand");
        metrics.finish(200);
        record_remote_call("works", Instant::now(), false);
        record_resolved("fetched", 3);
        record_cache_many(true, "works", 0);
        // No recorder installed; just verify nothing panics
    }
}
