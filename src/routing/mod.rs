//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Read for network N
//!     → N == bridge ? backend network : N
//!     → provider handle of that network's node
//!
//! Send from address A on network N
//!     → bridge connected and A managed by the relay ? bridge : N
//!     → provider handle of that network's node
//! ```
//!
//! # Design Decisions
//! - Handles are created lazily and cached by node name; never duplicated
//! - Bridge state is swapped atomically as one value
//! - A handle's subscriptions are closed before it is discarded

pub mod router;

pub use router::{BridgeState, HttpProviderFactory, NetworkRouter, ProviderFactory};
