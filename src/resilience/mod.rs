//! Resilience primitives.
//!
//! # Data Flow
//! ```text
//! Background height query / block confirmation
//!     → single_flight.rs (claim key; skip or reject if already claimed)
//!     → work runs with the guard held
//!     → guard dropped → key released
//! ```
//!
//! # Design Decisions
//! - No automatic retries anywhere; the only retry is the submitter's
//!   single fallback
//! - Every external call has a deadline (see `ledger::provider`)

pub mod single_flight;

pub use single_flight::{FlightGuard, SingleFlight};
