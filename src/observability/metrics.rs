//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ledger_submissions_total` (counter): submissions by network, path, result
//! - `ledger_submission_fallbacks_total` (counter): direct sends that fell back
//! - `ledger_confirmations_total` (counter): confirmation flows by outcome
//! - `ledger_confirmation_seconds` (histogram): submit-to-terminal latency
//! - `ledger_node_height` (gauge): last observed snapshot height per node
//! - `ledger_node_up` (gauge): 1=running/syncing, 0=otherwise
//!
//! Recording is a no-op until `init_metrics` installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::ledger::types::Network;

/// Install the Prometheus exporter listening on `addr`. Must run inside the
/// tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Prometheus exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install Prometheus exporter"),
    }
}

/// `path` is `relay`, `server_pow` or `local_pow`; `result` is `ok` or an
/// error kind.
pub fn record_submission(network: Network, path: &'static str, result: &'static str) {
    ::metrics::counter!(
        "ledger_submissions_total",
        "network" => network.as_str(),
        "path" => path,
        "result" => result
    )
    .increment(1);
}

pub fn record_fallback(network: Network) {
    ::metrics::counter!("ledger_submission_fallbacks_total", "network" => network.as_str()).increment(1);
}

pub fn record_confirmation(outcome: &'static str, started: Instant) {
    ::metrics::counter!("ledger_confirmations_total", "outcome" => outcome).increment(1);
    ::metrics::histogram!("ledger_confirmation_seconds").record(started.elapsed().as_secs_f64());
}

pub fn record_node_height(node: &str, height: u64) {
    ::metrics::gauge!("ledger_node_height", "node" => node.to_string()).set(height as f64);
}

pub fn record_node_up(node: &str, up: bool) {
    ::metrics::gauge!("ledger_node_up", "node" => node.to_string()).set(if up { 1.0 } else { 0.0 });
}
