//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!     → spans.rs (per-transaction spans with a trace id)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - The trace id flows through submission and every confirmation stage
//! - Metrics are cheap (atomic increments) and free when no exporter is set

pub mod logging;
pub mod metrics;
pub mod spans;
