//! Node health subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic timer (monitor.rs)
//!     → for each Running/Syncing ledger node without a query in flight
//!     → snapshot height query on the node's provider handle
//!     → update state.rs (height, status, last error)
//!     → NodeEvent broadcast + gauges
//! ```
//!
//! # Design Decisions
//! - Relay nodes are never polled; they have no height endpoint
//! - A failed node stays in Timeout until explicitly reconnected
//! - Health state is per node, not per network

pub mod monitor;
pub mod state;

pub use monitor::{NodeEvent, NodeHealthMonitor};
pub use state::{Node, NodeStatus};
