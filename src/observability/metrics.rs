//! Metrics collection and exposition.
//!
//! # Metrics
//! - `switchyard_requests_total` (counter): dispatched requests by method, status
//! - `switchyard_request_duration_seconds` (histogram): dispatch latency by method
//! - `switchyard_route_config_errors_total` (counter): dropped route registrations
//! - `switchyard_inbound_anomalies_total` (counter): ignored inbound events by state, event
//! - `switchyard_active_connections` (gauge): current connection count

use std::net::SocketAddr;
use std::time::Instant;

use axum::http::{Method, StatusCode};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::http::inbound::InboundAnomaly;

/// Install the Prometheus exporter listening on `addr`. Must run inside a
/// tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe_metrics();
            tracing::info!(address = %addr, "Metrics exporter listening");
        }
        Err(err) => tracing::error!(address = %addr, error = %err, "Failed to install metrics exporter"),
    }
}

fn describe_metrics() {
    describe_counter!("switchyard_requests_total", "Requests dispatched, by method and status");
    describe_histogram!(
        "switchyard_request_duration_seconds",
        "Time from dispatch start to terminal response"
    );
    describe_counter!(
        "switchyard_route_config_errors_total",
        "Route registrations dropped for an invalid path"
    );
    describe_counter!(
        "switchyard_inbound_anomalies_total",
        "Inbound events that had no transition from the current state"
    );
    describe_gauge!("switchyard_active_connections", "Open client connections");
}

/// Record one dispatched request. `status` is `None` when no head went out.
pub fn record_request(method: &Method, status: Option<StatusCode>, started: Instant) {
    let status = status.map_or_else(|| "none".to_string(), |s| s.as_u16().to_string());
    counter!(
        "switchyard_requests_total",
        "method" => method.to_string(),
        "status" => status
    )
    .increment(1);
    histogram!("switchyard_request_duration_seconds", "method" => method.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_route_config_error() {
    counter!("switchyard_route_config_errors_total").increment(1);
}

pub fn record_inbound_anomaly(anomaly: &InboundAnomaly) {
    counter!(
        "switchyard_inbound_anomalies_total",
        "state" => anomaly.state,
        "event" => anomaly.event
    )
    .increment(1);
}

pub fn connection_opened() {
    gauge!("switchyard_active_connections").increment(1.0);
}

pub fn connection_closed() {
    gauge!("switchyard_active_connections").decrement(1.0);
}
