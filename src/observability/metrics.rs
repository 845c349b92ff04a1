//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_requests_total` (counter): gate outcome (bypassed, rejected, refreshed)
//! - `gate_rejections_total` (counter): rejections by forged header
//! - `gate_sessions_total` (counter): session lookups by result
//! - `gate_upstream_requests_total` (counter): forwarded requests by method, status
//! - `gate_upstream_duration_seconds` (histogram): upstream latency
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_gate(outcome: &'static str) {
    counter!("gate_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_rejection(reason: &'static str) {
    counter!("gate_rejections_total", "reason" => reason).increment(1);
}

pub fn record_session(result: &'static str) {
    counter!("gate_sessions_total", "result" => result).increment(1);
}

pub fn record_upstream(method: &str, status: u16, start: Instant) {
    counter!(
        "gate_upstream_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gate_upstream_duration_seconds").record(start.elapsed().as_secs_f64());
}
