//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): total requests by route, method, status
//! - `proxy_request_duration_seconds` (histogram): latency distribution by route
//! - `proxy_cache_hits_total` / `proxy_cache_misses_total` (counters)
//! - `proxy_upstream_retries_total` (counter): retry attempts by route
//! - `proxy_blocked_total` (counter): blacklist rejections
//! - `proxy_fallback_attempts_total` (counter): asset fallback stages tried
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations via the `metrics` facade)
//! - Labels for route kind, method, status code
//! - The repository label is bounded by omission: it is logged, not labeled,
//!   to keep cardinality under control

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on the given address.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter started"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed request, success or failure.
///
/// The repository, when extractable from the path, rides along in the
/// structured log event rather than as a metric label.
pub fn record_request(
    route: &'static str,
    method: &str,
    status: u16,
    repository: Option<&str>,
    start: Instant,
) {
    let elapsed = start.elapsed();
    counter!(
        "proxy_requests_total",
        "route" => route,
        "method" => method.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds", "route" => route).record(elapsed.as_secs_f64());

    tracing::debug!(
        route,
        method,
        status,
        repository = repository.unwrap_or(""),
        latency_ms = elapsed.as_millis() as u64,
        "Request completed"
    );
}

pub fn record_cache_hit(route: &'static str) {
    counter!("proxy_cache_hits_total", "route" => route).increment(1);
}

pub fn record_cache_miss(route: &'static str) {
    counter!("proxy_cache_misses_total", "route" => route).increment(1);
}

pub fn record_retry(route: &'static str) {
    counter!("proxy_upstream_retries_total", "route" => route).increment(1);
}

pub fn record_blocked() {
    counter!("proxy_blocked_total").increment(1);
}

pub fn record_fallback_attempt(stage: &'static str) {
    counter!("proxy_fallback_attempts_total", "stage" => stage).increment(1);
}
