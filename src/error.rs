//! Engine-level error taxonomy.

use std::time::Duration;
use thiserror::Error;

use crate::ledger::types::{Address, LedgerError, Network};

/// Failures surfaced by submission and confirmation.
///
/// Every variant names enough context (network, label, hash so far) to be
/// reported without the caller re-deriving it.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No local key material for the sending address.
    #[error("{address} is not found in the wallet")]
    AddressNotFound { address: Address },

    /// Relay submission failed, or both direct attempts failed.
    #[error("[{network}][{label}] submission failed: {source}")]
    SubmissionFailed {
        network: Network,
        label: String,
        #[source]
        source: LedgerError,
    },

    /// A poll exceeded its bound.
    #[error("[{stage}] timed out after {}s waiting for block {hash}", .waited.as_secs())]
    Timeout {
        stage: &'static str,
        hash: String,
        waited: Duration,
    },

    /// The receive block does not carry a well-formed receipt.
    #[error("bad receive block {hash}: {reason}")]
    MalformedReceipt { hash: String, reason: String },

    /// Contract execution reverted.
    #[error("revert, methodName: {label}")]
    Revert { label: String, hash: String },

    /// Contract execution exceeded the call stack limit.
    #[error("maximum call stack size exceeded, methodName: {label}")]
    StackOverflow { label: String, hash: String },

    /// Transport-level RPC failure while polling or querying.
    #[error("network error: {0}")]
    Network(#[from] LedgerError),

    /// A block the ledger referenced could not be fetched.
    #[error("block {hash} referenced by the ledger was not found")]
    MissingBlock { hash: String },

    /// No node is configured for the network.
    #[error("no node configured for network {0}")]
    UnknownNetwork(Network),

    /// No node with this name is configured.
    #[error("no node named '{0}'")]
    UnknownNode(String),

    /// The block is already being confirmed by another task.
    #[error("block {hash} is already being confirmed")]
    AlreadyTracking { hash: String },

    /// The wait was cancelled by the caller.
    #[error("cancelled while waiting for {stage}")]
    Cancelled { stage: &'static str },
}

impl EngineError {
    /// True for on-chain execution failures (as opposed to client-side
    /// waits or transport problems).
    pub fn is_on_chain(&self) -> bool {
        matches!(
            self,
            EngineError::Revert { .. }
                | EngineError::StackOverflow { .. }
                | EngineError::MalformedReceipt { .. }
        )
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::AddressNotFound { .. } => "address_not_found",
            EngineError::SubmissionFailed { .. } => "submission_failed",
            EngineError::Timeout { .. } => "timeout",
            EngineError::MalformedReceipt { .. } => "malformed_receipt",
            EngineError::Revert { .. } => "revert",
            EngineError::StackOverflow { .. } => "stack_overflow",
            EngineError::Network(_) => "network",
            EngineError::MissingBlock { .. } => "missing_block",
            EngineError::UnknownNetwork(_) => "unknown_network",
            EngineError::UnknownNode(_) => "unknown_node",
            EngineError::AlreadyTracking { .. } => "already_tracking",
            EngineError::Cancelled { .. } => "cancelled",
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
