//! Correlation spans for transaction flows.

use tracing::Span;
use uuid::Uuid;

use crate::ledger::types::Network;

/// Span wrapping one submission and its confirmation. The trace id is
/// logged with every event inside it.
pub fn transaction_span(network: Network, label: &str) -> (Span, Uuid) {
    let trace_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "transaction",
        trace_id = %trace_id,
        network = %network,
        label = %label,
    );
    (span, trace_id)
}
