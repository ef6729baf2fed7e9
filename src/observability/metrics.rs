//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define application metrics (requests, latency, handler errors, sockets)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `app_requests_total` (counter): requests by method, route, status
//! - `app_request_duration_seconds` (histogram): latency distribution
//! - `app_handler_errors_total` (counter): error envelopes by code
//! - `app_socket_events_total` (counter): socket events by event, outcome
//! - `app_socket_connections` (gauge): open socket connections
//! - `app_module_init_seconds` (histogram): module initialize time
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests need no setup
//! - Route labels use the registered path, never the raw URI

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    let method = method.to_string();
    let route = route.to_string();
    counter!(
        "app_requests_total",
        "method" => method.clone(),
        "route" => route.clone(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("app_request_duration_seconds", "method" => method, "route" => route)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_handler_error(code: &str) {
    counter!("app_handler_errors_total", "code" => code.to_string()).increment(1);
}

pub fn record_socket_event(event: &str, outcome: &'static str) {
    counter!(
        "app_socket_events_total",
        "event" => event.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_socket_connections(count: usize) {
    gauge!("app_socket_connections").set(count as f64);
}

pub fn record_module_init(module: &str, start: Instant) {
    histogram!("app_module_init_seconds", "module" => module.to_string())
        .record(start.elapsed().as_secs_f64());
}
