//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): front responses by status
//! - `gateway_dispatch_duration_seconds` (histogram): primary → worker → primary
//! - `gateway_workers_live` (gauge): live worker processes
//! - `gateway_worker_restarts_total` (counter): replacement workers spawned
//! - `gateway_upstream_health` (gauge): 1=active, 0=inactive, per upstream

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder with its scrape listener.
/// Must run inside a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(status: u16, start: Instant) {
    counter!("gateway_requests_total", "status" => status.to_string()).increment(1);
    histogram!("gateway_dispatch_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_workers_live(count: usize) {
    gauge!("gateway_workers_live").set(count as f64);
}

pub fn record_worker_restart() {
    counter!("gateway_worker_restarts_total").increment(1);
}

pub fn record_upstream_health(upstream: &str, healthy: bool) {
    gauge!("gateway_upstream_health", "upstream" => upstream.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}
