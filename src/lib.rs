//! Ledger transaction submission and confirmation engine.
//!
//! Submits transfers and contract calls to a Vite-style account-block
//! ledger, over a direct (locally signed) or relay ("bridge") path, and
//! follows each transaction through send confirmation, receive linking and
//! receipt decoding.

// Core
pub mod config;
pub mod confirmation;
pub mod error;
pub mod ledger;
pub mod routing;
pub mod session;
pub mod submission;

// Background
pub mod health;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use lifecycle::Shutdown;
pub use session::{AccountSummary, DeployInfo, Session};
