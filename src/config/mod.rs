//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → EngineConfig (validated, immutable)
//!     → handed to Session / NetworkRouter / NodeHealthMonitor
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → daemon applies the new node list to router and monitor
//! ```
//!
//! # Design Decisions
//! - A loaded config is never mutated; a reload replaces it whole
//! - Every section has defaults, so a minimal file only lists nodes
//! - Only the node list and bridge addresses apply live; polling and
//!   health intervals need a restart

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    BridgeConfig, EngineConfig, HealthCheckConfig, NodeConfig, ObservabilityConfig,
    PollingConfig, RpcConfig, WalletConfig,
};
