//! Confirmation subsystem.
//!
//! # Data Flow
//! ```text
//! Submitted block
//!     → state_machine.rs
//!         link (direct sends)      ─┐
//!         send confirmation         │ each wait: poller.rs
//!         receive fetch             │ (fixed interval, bounded,
//!         receive confirmation     ─┘  cancellable)
//!     → receipt.rs (33-byte payload → outcome)
//!     → Confirmation | EngineError
//! ```

pub mod poller;
pub mod receipt;
pub mod state_machine;

pub use poller::{poll_for, poll_until, PollPolicy};
pub use receipt::{validate, ReceiveOutcome};
pub use state_machine::{
    BlockConfirmationStateMachine, Confirmation, ConfirmationTarget, Progress, ProgressSink,
};
