//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): forwarded requests by final status
//! - `gateway_request_duration_seconds` (histogram): time to upstream headers
//! - `gateway_rejected_total` (counter): 4xx outcomes by reason
//! - `gateway_rate_limited_total` (counter): admission rejections
//! - `gateway_upstream_errors_total` (counter): upstream failures by kind
//! - `gateway_relay_failures_total` (counter): bodies not fully delivered
//! - `gateway_tracked_clients` (gauge): size of the client registry
//! - `gateway_clients_evicted_total` (counter): records removed by the sweep

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus exporter"),
    }
}

pub fn record_request(status: u16, start: Instant) {
    ::metrics::counter!("gateway_requests_total", "status" => status.to_string()).increment(1);
    ::metrics::histogram!("gateway_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_rejected(reason: &'static str) {
    ::metrics::counter!("gateway_rejected_total", "reason" => reason).increment(1);
}

pub fn record_rate_limited() {
    ::metrics::counter!("gateway_rate_limited_total").increment(1);
}

pub fn record_upstream_error(kind: &'static str) {
    ::metrics::counter!("gateway_upstream_errors_total", "kind" => kind).increment(1);
}

pub fn record_relay_failure(reason: &'static str) {
    ::metrics::counter!("gateway_relay_failures_total", "reason" => reason).increment(1);
}

pub fn set_tracked_clients(count: usize) {
    ::metrics::gauge!("gateway_tracked_clients").set(count as f64);
}

pub fn record_evicted(count: usize) {
    ::metrics::counter!("gateway_clients_evicted_total").increment(count as u64);
}
