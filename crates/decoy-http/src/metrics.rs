#![allow(dead_code)] // Functions used in binary, not in lib tests

//! Prometheus metrics for decoy-http.
//!
//! Tracks served requests per mode, upstream latency and action execution.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram, register_histogram_vec, CounterVec, Encoder,
    Histogram, HistogramVec, TextEncoder,
};
use std::time::Duration;
use tracing::warn;

lazy_static! {
    /// Total number of requests answered
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "decoy_requests_total",
        "Total number of requests answered",
        &["mode", "matched", "status"]  // mode: mock|proxy|forwarder|disabled|unknown|none
    )
    .unwrap();

    /// Upstream request duration
    pub static ref UPSTREAM_DURATION_MS: HistogramVec = register_histogram_vec!(
        "decoy_upstream_duration_ms",
        "Duration of forwarded upstream requests in milliseconds",
        &["mode", "outcome"],  // outcome: success|error
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 30000.0]
    )
    .unwrap();

    /// Action executions by type and result
    pub static ref ACTION_EXECUTIONS_TOTAL: CounterVec = register_counter_vec!(
        "decoy_action_executions_total",
        "Total number of action executions",
        &["action_type", "result"]  // result: success|failure|skipped
    )
    .unwrap();

    /// Script execution duration
    pub static ref SCRIPT_DURATION_MS: Histogram = register_histogram!(
        "decoy_script_duration_ms",
        "Histogram of run_javascript execution time in milliseconds",
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 1000.0, 5000.0]
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

pub fn record_request(mode: &str, matched: bool, status: u16) {
    let matched = if matched { "true" } else { "false" };
    REQUESTS_TOTAL
        .with_label_values(&[mode, matched, &status.to_string()])
        .inc();
}

pub fn record_upstream(mode: &str, success: bool, elapsed: Duration) {
    let outcome = if success { "success" } else { "error" };
    UPSTREAM_DURATION_MS
        .with_label_values(&[mode, outcome])
        .observe(elapsed.as_secs_f64() * 1000.0);
}

pub fn record_action(action_type: &str, result: &str) {
    ACTION_EXECUTIONS_TOTAL
        .with_label_values(&[action_type, result])
        .inc();
}

pub fn record_script_duration(elapsed: Duration) {
    SCRIPT_DURATION_MS.observe(elapsed.as_secs_f64() * 1000.0);
}
