//! Metrics collection and exposition.
//!
//! # Metrics
//! - `multireq_requests_total` (counter): requests by method, status, winner
//! - `multireq_request_duration_seconds` (histogram): time to response headers
//! - `multireq_target_failures_total` (counter): failures of races nobody won,
//!   by target and reason
//! - `multireq_buffer_pool_idle` (gauge): idle read-ahead buffers
//! - `multireq_buffer_pool_outstanding` (gauge): checked-out read-ahead buffers
//!
//! The race engine never records metrics itself; the HTTP front end does.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::buffer::PoolStats;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one proxied request.
pub fn record_request(method: &str, status: u16, winner: &str, start: Instant) {
    let status = status.to_string();
    counter!(
        "multireq_requests_total",
        "method" => method.to_string(),
        "status" => status.clone(),
        "winner" => winner.to_string()
    )
    .increment(1);
    histogram!(
        "multireq_request_duration_seconds",
        "method" => method.to_string(),
        "status" => status
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a failed attempt against one target.
pub fn record_target_failure(target: &str, reason: &'static str) {
    counter!(
        "multireq_target_failures_total",
        "target" => target.to_string(),
        "reason" => reason
    )
    .increment(1);
}

/// Publish buffer pool gauges.
pub fn record_pool(stats: PoolStats) {
    gauge!("multireq_buffer_pool_idle").set(stats.idle as f64);
    gauge!("multireq_buffer_pool_outstanding").set(stats.outstanding as f64);
}
