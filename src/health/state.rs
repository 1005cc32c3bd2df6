//! Node liveness state.
//!
//! # States
//! - Stopped: not polled
//! - Syncing: reachable but not yet confirmed caught up; polled
//! - Running: polled
//! - Timeout: last height query failed; not polled until reconnected
//! - Connected: relay node while the router's bridge is connected; never
//!   polled
//!
//! # State Transitions
//! ```text
//! Syncing → Running: height query succeeded
//! Running/Syncing → Timeout: height query failed
//! any → Syncing: reconnect
//! any → Stopped: stop
//! relay Stopped ↔ Connected: follows the router's bridge status
//! ```

use arc_swap::ArcSwapOption;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use crate::config::NodeConfig;
use crate::ledger::types::Network;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeStatus {
    Stopped = 0,
    Syncing = 1,
    Running = 2,
    Timeout = 3,
    Connected = 4,
}

impl NodeStatus {
    /// Whether the health monitor queries this node.
    pub fn is_polled(&self) -> bool {
        matches!(self, NodeStatus::Running | NodeStatus::Syncing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Stopped => "stopped",
            NodeStatus::Syncing => "syncing",
            NodeStatus::Running => "running",
            NodeStatus::Timeout => "timeout",
            NodeStatus::Connected => "connected",
        }
    }
}

impl From<u8> for NodeStatus {
    fn from(val: u8) -> Self {
        match val {
            1 => NodeStatus::Syncing,
            2 => NodeStatus::Running,
            3 => NodeStatus::Timeout,
            4 => NodeStatus::Connected,
            _ => NodeStatus::Stopped,
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured ledger node and its observed state.
#[derive(Debug)]
pub struct Node {
    pub name: String,
    pub network: Network,
    pub url: String,
    status: AtomicU8,
    height: AtomicU64,
    error: ArcSwapOption<String>,
}

impl Node {
    pub fn new(name: impl Into<String>, network: Network, url: impl Into<String>, status: NodeStatus) -> Self {
        Self {
            name: name.into(),
            network,
            url: url.into(),
            status: AtomicU8::new(status as u8),
            height: AtomicU64::new(0),
            error: ArcSwapOption::empty(),
        }
    }

    /// Initial state for a configured node: relays start Stopped until the
    /// router reports the bridge connected, ledger nodes Syncing so the first
    /// refresh promotes them.
    pub fn from_config(config: &NodeConfig) -> Arc<Self> {
        let status = if config.network.is_bridge() {
            NodeStatus::Stopped
        } else {
            NodeStatus::Syncing
        };
        Arc::new(Self::new(&config.name, config.network, &config.url, status))
    }

    pub fn status(&self) -> NodeStatus {
        NodeStatus::from(self.status.load(Ordering::Acquire))
    }

    /// Set the status, returning the previous one.
    pub fn set_status(&self, status: NodeStatus) -> NodeStatus {
        NodeStatus::from(self.status.swap(status as u8, Ordering::AcqRel))
    }

    pub fn height(&self) -> u64 {
        self.height.load(Ordering::Acquire)
    }

    pub fn error(&self) -> Option<String> {
        self.error.load_full().map(|e| e.as_ref().clone())
    }

    /// Record a successful height query. Syncing is promoted to Running;
    /// any other status is left alone.
    pub fn mark_height(&self, height: u64) -> NodeStatus {
        self.height.store(height, Ordering::Release);
        self.error.store(None);
        match self.status.compare_exchange(
            NodeStatus::Syncing as u8,
            NodeStatus::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => NodeStatus::Running,
            Err(current) => NodeStatus::from(current),
        }
    }

    /// Record a failed height query observed while the node was `expected`.
    /// Returns false, recording nothing, if the status has moved on since.
    pub fn mark_failure(&self, expected: NodeStatus, error: impl Into<String>) -> bool {
        let swapped = self
            .status
            .compare_exchange(
                expected as u8,
                NodeStatus::Timeout as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if swapped {
            self.error.store(Some(Arc::new(error.into())));
        }
        swapped
    }

    /// Clear the error and go back to Syncing.
    pub fn reset(&self) {
        self.error.store(None);
        self.set_status(NodeStatus::Syncing);
    }
}
