//! Transaction submission subsystem.
//!
//! # Data Flow
//! ```text
//! TransferRequest
//!     → request.rs (build unsigned AccountBlock)
//!     → submitter.rs (pick path via NetworkRouter)
//!         relay:  vite_signAndSendTx on the bridge handle
//!         direct: keystore lookup
//!                 → strategy.rs primary (server PoW)
//!                 → on failure, one fallback (local PoW)
//!     → Submitted (block with hash + previousHash, read handle, span)
//! ```

pub mod request;
pub mod strategy;
pub mod submitter;

pub use request::TransferRequest;
pub use strategy::{DirectSender, RpcDirectSender, SendStrategy, SubmitPlan};
pub use submitter::{SubmitPath, Submitted, TransactionSubmitter};
