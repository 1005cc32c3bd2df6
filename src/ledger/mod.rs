//! Ledger integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment (wallet keys)
//!     → wallet.rs (key lookup, signing seam)
//! Node URL
//!     → provider.rs (JSON-RPC handle, timeouts, log filters)
//!     → rpc.rs (typed methods, boundary decoding)
//! User input
//!     → amount.rs (exact decimal ↔ integer)
//!     → types.rs (AccountBlock, Address, Network)
//! ```
//!
//! # Security Constraints
//! - Private keys only from environment variables
//! - Never log private keys
//! - Every RPC call has a configurable timeout

pub mod amount;
pub mod provider;
pub mod rpc;
pub mod types;
pub mod wallet;

pub use amount::{Amount, Unit};
pub use provider::{HttpProvider, LedgerProvider, Subscription, VmLogEvent, VmLogFilter};
pub use rpc::LedgerRpc;
pub use types::{AccountBlock, Address, BlockType, LedgerError, LedgerResult, Network, TokenId};
pub use wallet::{BlockSigner, Keystore, SigningKey};
