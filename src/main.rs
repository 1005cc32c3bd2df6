//! ledger-engine daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │                        ledger-engine                         │
//!   │                                                              │
//!   │  TransferRequest                                             │
//!   │  ─────────────▶ ┌────────────┐   ┌──────────┐                │
//!   │                 │ submission │──▶│ routing  │──▶ provider ───┼──▶ ledger node
//!   │                 └─────┬──────┘   └──────────┘    handles     │    (JSON-RPC)
//!   │                       ▼                              ▲       │
//!   │                 ┌──────────────┐  poller             │       │
//!   │                 │ confirmation │─────────────────────┘       │
//!   │                 │ + receipt    │                             │
//!   │                 └──────────────┘                             │
//!   │                                                              │
//!   │  cross-cutting: health monitor, config + watcher,            │
//!   │                 observability, lifecycle                     │
//!   └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The daemon keeps node health current, exports metrics and applies config
//! reloads. Usage: `ledger-engine [config.toml]` (default `engine.toml`).

use std::path::PathBuf;

use ledger_tx_engine::lifecycle::startup::run_daemon;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("engine.toml"));

    run_daemon(&path).await
}
