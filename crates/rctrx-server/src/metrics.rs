//! Metrics collection and export for the transceiver daemon.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "rctrx_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "rctrx_connections_active";
    pub const BYTES_TOTAL: &str = "rctrx_bytes_total";
    pub const FRAMES_TOTAL: &str = "rctrx_frames_total";
    pub const COMMANDS_TOTAL: &str = "rctrx_commands_total";
    pub const ERRORS_TOTAL: &str = "rctrx_errors_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    // Describe metrics
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Total number of client connections since daemon start"
    );
    metrics::describe_gauge!(
        names::CONNECTIONS_ACTIVE,
        "Current number of active client connections"
    );
    metrics::describe_counter!(names::BYTES_TOTAL, "Total bytes moved over client sockets");
    metrics::describe_counter!(
        names::FRAMES_TOTAL,
        "Total captured frames delivered to clients"
    );
    metrics::describe_counter!(
        names::COMMANDS_TOTAL,
        "Total transmit commands accepted from clients"
    );
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of errors");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a new connection.
pub fn record_connection() {
    counter!(names::CONNECTIONS_TOTAL).increment(1);
    gauge!(names::CONNECTIONS_ACTIVE).increment(1.0);
}

/// Record a disconnection.
pub fn record_disconnection() {
    gauge!(names::CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record bytes moved over a client socket.
pub fn record_bytes(bytes: usize, direction: &str) {
    counter!(names::BYTES_TOTAL, "direction" => direction.to_string()).increment(bytes as u64);
}

/// Record a captured frame delivered to a client.
pub fn record_frame() {
    counter!(names::FRAMES_TOTAL).increment(1);
}

/// Record a transmit command accepted from a client.
pub fn record_command() {
    counter!(names::COMMANDS_TOTAL).increment(1);
}

/// Record an error.
pub fn record_error(error_type: &str) {
    counter!(names::ERRORS_TOTAL, "type" => error_type.to_string()).increment(1);
}

/// Metrics guard that records disconnection on drop.
pub struct ConnectionMetricsGuard;

impl ConnectionMetricsGuard {
    /// Create a new metrics guard, recording a connection.
    #[must_use]
    pub fn new() -> Self {
        record_connection();
        Self
    }
}

impl Default for ConnectionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        record_disconnection();
    }
}
