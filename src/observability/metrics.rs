//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gathering_requests_total` (counter): requests by method, route, status
//! - `gathering_request_duration_seconds` (histogram): latency by route
//! - `gathering_rate_limited_total` (counter): rejected by the rate limiter
//! - `gathering_auth_failures_total` (counter): failed logins and re-auths by kind
//! - `gathering_tokens_total` (counter): one-time token outcomes
//! - `gathering_audit_write_failures_total` (counter): audit lines that could not be written
//!
//! # Design Decisions
//! - Route labels use the matched route template, never the raw path
//! - Histogram buckets tuned for typical web latencies

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};

const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within the Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .install()?;

    describe_metrics();
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

fn describe_metrics() {
    describe_counter!("gathering_requests_total", "Total HTTP requests handled");
    describe_histogram!(
        "gathering_request_duration_seconds",
        "HTTP request latency in seconds"
    );
    describe_counter!(
        "gathering_rate_limited_total",
        "Requests rejected by the rate limiter"
    );
    describe_counter!(
        "gathering_auth_failures_total",
        "Failed admin logins and re-authentications"
    );
    describe_counter!("gathering_tokens_total", "One-time token outcomes");
    describe_counter!(
        "gathering_audit_write_failures_total",
        "Audit entries that could not be persisted"
    );
}

/// Record a completed request.
pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    counter!(
        "gathering_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "gathering_request_duration_seconds",
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a request rejected by the rate limiter.
pub fn record_rate_limited() {
    counter!("gathering_rate_limited_total").increment(1);
}

/// Record a failed credential check (`login`, `reauth`).
pub fn record_auth_failure(kind: &'static str) {
    counter!("gathering_auth_failures_total", "kind" => kind).increment(1);
}

/// Record a one-time token outcome (`issued`, `redeemed`, or a rejection reason).
pub fn record_token(outcome: &'static str) {
    counter!("gathering_tokens_total", "outcome" => outcome).increment(1);
}

/// Record an audit entry that could not be written.
pub fn record_audit_write_failure() {
    counter!("gathering_audit_write_failures_total").increment(1);
}
