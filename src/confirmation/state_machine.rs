//! Send → receive confirmation stages.
//!
//! # States
//! ```text
//! SENT ──link──▶ LINKED ──▶ SEND_CONFIRMED ──▶ RECEIVE_FETCHED
//!      (direct only)                              │
//!                     VALIDATED | ERROR ◀── RECEIVE_CONFIRMED
//! ```
//! Any poll may end the flow with `Timeout` or `Cancelled`. Plain transfers
//! (`ConfirmationTarget::Send`) stop at SEND_CONFIRMED.
//!
//! # Design Decisions
//! - Stages run strictly in order on one task
//! - A receipt flow has one overall budget; each poll gets what is left
//! - A block hash can only be tracked by one flow at a time

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::PollingConfig;
use crate::confirmation::poller::{poll_for, PollPolicy};
use crate::confirmation::receipt::{self, ReceiveOutcome};
use crate::error::{EngineError, EngineResult};
use crate::ledger::provider::LedgerProvider;
use crate::ledger::rpc::LedgerRpc;
use crate::ledger::types::AccountBlock;
use crate::observability::metrics;
use crate::resilience::SingleFlight;
use crate::submission::Submitted;

/// Poll stage labels, as they appear in `Timeout` errors.
pub mod stage {
    pub const LINK: &str = "link";
    pub const SEND_CONFIRMATION: &str = "send-confirmation";
    pub const RECEIVE_CONFIRMATION: &str = "receive-confirmation";
}

/// How far a flow goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationTarget {
    /// Stop once the send block is confirmed.
    Send,
    /// Follow through to the receive block and decode its receipt.
    Receipt,
}

/// Step reports emitted while a flow runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// The ledger's copy of a directly sent block was found.
    Linked { hash: String },
    /// The send block has a `confirmedHash` but no receive block yet.
    SendConfirming { hash: String, confirmed_hash: String },
    SendConfirmed { hash: String, confirmed_hash: String },
    ReceiveFetched { hash: String },
    ReceiveConfirmed { hash: String, confirmed_hash: String },
    Validated { hash: String, outcome: ReceiveOutcome },
    Failed { hash: String, error: String },
}

/// Consumer of `Progress` reports.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: Progress);
}

impl ProgressSink for () {
    fn report(&self, _progress: Progress) {}
}

impl ProgressSink for mpsc::UnboundedSender<Progress> {
    fn report(&self, progress: Progress) {
        let _ = self.send(progress);
    }
}

/// Result of a completed flow.
#[derive(Debug, Clone)]
pub struct Confirmation {
    /// The send block as confirmed by the ledger.
    pub send_block: AccountBlock,
    /// The confirmed receive block, for receipt flows.
    pub receive_block: Option<AccountBlock>,
}

/// Drives submitted blocks to a terminal state.
#[derive(Debug, Clone)]
pub struct BlockConfirmationStateMachine {
    standard: PollPolicy,
    receipt: PollPolicy,
    link_window: u64,
    tracking: SingleFlight,
}

impl BlockConfirmationStateMachine {
    pub fn new(config: &PollingConfig) -> Self {
        Self {
            standard: PollPolicy::standard(config),
            receipt: PollPolicy::receipt(config),
            link_window: config.link_window,
            tracking: SingleFlight::new(),
        }
    }

    /// Number of flows currently running.
    pub fn in_flight(&self) -> usize {
        self.tracking.len()
    }

    /// Confirm a submission, inside its transaction span.
    pub async fn confirm(
        &self,
        submitted: &Submitted,
        target: ConfirmationTarget,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> EngineResult<Confirmation> {
        self.confirm_block(
            submitted.request_provider.clone(),
            submitted.block.clone(),
            submitted.path.needs_link(),
            &submitted.label,
            target,
            sink,
            cancel,
        )
        .instrument(submitted.span.clone())
        .await
    }

    /// Confirm `block` using `provider` for every read.
    #[allow(clippy::too_many_arguments)]
    pub async fn confirm_block(
        &self,
        provider: Arc<dyn LedgerProvider>,
        block: AccountBlock,
        needs_link: bool,
        label: &str,
        target: ConfirmationTarget,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> EngineResult<Confirmation> {
        let key = block
            .hash
            .clone()
            .ok_or_else(|| EngineError::MissingBlock {
                hash: block.hash_or_placeholder().to_string(),
            })?;
        let _guard = self
            .tracking
            .try_acquire(&key)
            .ok_or_else(|| EngineError::AlreadyTracking { hash: key.clone() })?;

        let started = std::time::Instant::now();
        let result = self
            .run(provider.as_ref(), block, needs_link, label, target, sink, cancel)
            .await;

        match &result {
            Ok(_) => {
                let outcome = match target {
                    ConfirmationTarget::Send => "confirmed",
                    ConfirmationTarget::Receipt => "success",
                };
                metrics::record_confirmation(outcome, started);
                tracing::info!(hash = %key, elapsed_ms = started.elapsed().as_millis() as u64, "Confirmation complete");
            }
            Err(e) => {
                metrics::record_confirmation(e.kind(), started);
                sink.report(Progress::Failed {
                    hash: key.clone(),
                    error: e.to_string(),
                });
                if e.is_on_chain() {
                    tracing::warn!(hash = %key, error = %e, "Transaction failed on chain");
                } else {
                    tracing::error!(hash = %key, error = %e, "Confirmation failed");
                }
            }
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn run(
        &self,
        provider: &dyn LedgerProvider,
        mut block: AccountBlock,
        needs_link: bool,
        label: &str,
        target: ConfirmationTarget,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> EngineResult<Confirmation> {
        let budget = Budget::new(match target {
            ConfirmationTarget::Send => None,
            ConfirmationTarget::Receipt => Some(self.receipt.timeout),
        });

        if needs_link {
            block = self.link(provider, &block, budget.policy(self.standard), cancel).await?;
            sink.report(Progress::Linked {
                hash: block.hash_or_placeholder().to_string(),
            });
        }

        let hash = block.hash_or_placeholder().to_string();
        let send_block = self
            .wait_send_confirmed(provider, &hash, target, sink, budget.policy(self.standard), cancel)
            .await?;
        let confirmed_hash = send_block.confirmed_hash.clone().unwrap_or_default();
        tracing::info!(hash = %hash, confirmed_hash = %confirmed_hash, "Send block confirmed");
        sink.report(Progress::SendConfirmed {
            hash: hash.clone(),
            confirmed_hash,
        });

        if target == ConfirmationTarget::Send {
            return Ok(Confirmation {
                send_block,
                receive_block: None,
            });
        }

        let receive_hash = send_block
            .receive_block_hash
            .clone()
            .ok_or_else(|| EngineError::MissingBlock { hash: hash.clone() })?;
        let receive = provider
            .account_block_by_hash(&receive_hash)
            .await?
            .ok_or_else(|| EngineError::MissingBlock {
                hash: receive_hash.clone(),
            })?;
        tracing::debug!(receive_hash = %receive_hash, block_type = u8::from(receive.block_type), "Receive block fetched");
        sink.report(Progress::ReceiveFetched {
            hash: receive_hash.clone(),
        });

        let receive = if receive.is_confirmed() {
            receive
        } else {
            self.wait_receive_confirmed(provider, &receive_hash, budget.policy(self.standard), cancel)
                .await?
        };
        sink.report(Progress::ReceiveConfirmed {
            hash: receive_hash.clone(),
            confirmed_hash: receive.confirmed_hash.clone().unwrap_or_default(),
        });

        let outcome = receipt::validate(&receive);
        tracing::info!(receive_hash = %receive_hash, outcome = outcome.as_str(), "Receipt decoded");
        sink.report(Progress::Validated {
            hash: receive_hash.clone(),
            outcome: outcome.clone(),
        });
        outcome.into_result(label, &receive_hash)?;

        Ok(Confirmation {
            send_block,
            receive_block: Some(receive),
        })
    }

    /// Find the ledger's copy of `block` among the sender's latest blocks.
    async fn link(
        &self,
        provider: &dyn LedgerProvider,
        block: &AccountBlock,
        policy: PollPolicy,
        cancel: &CancellationToken,
    ) -> EngineResult<AccountBlock> {
        let previous_hash = block.previous_hash.as_deref();
        let address = &block.address;
        let window = self.link_window;

        poll_for(stage::LINK, block.hash_or_placeholder(), policy, cancel, || async move {
            let recent = provider.account_blocks(address, 0, window).await?;
            Ok::<_, EngineError>(recent
                .into_iter()
                .find(|b| b.previous_hash.as_deref() == previous_hash))
        })
        .await
    }

    async fn wait_send_confirmed(
        &self,
        provider: &dyn LedgerProvider,
        hash: &str,
        target: ConfirmationTarget,
        sink: &dyn ProgressSink,
        policy: PollPolicy,
        cancel: &CancellationToken,
    ) -> EngineResult<AccountBlock> {
        let reported = AtomicBool::new(false);
        let reported = &reported;

        poll_for(stage::SEND_CONFIRMATION, hash, policy, cancel, || async move {
            let Some(current) = provider.account_block_by_hash(hash).await? else {
                return Ok(None);
            };
            let Some(confirmed_hash) = current.confirmed_hash.clone() else {
                return Ok(None);
            };
            if target == ConfirmationTarget::Send || current.receive_block_hash.is_some() {
                return Ok(Some(current));
            }
            if !reported.swap(true, Ordering::Relaxed) {
                tracing::debug!(hash, confirmed_hash = %confirmed_hash, "Send block confirmed, awaiting receive block");
                sink.report(Progress::SendConfirming {
                    hash: hash.to_string(),
                    confirmed_hash,
                });
            }
            Ok::<_, EngineError>(None)
        })
        .await
    }

    async fn wait_receive_confirmed(
        &self,
        provider: &dyn LedgerProvider,
        hash: &str,
        policy: PollPolicy,
        cancel: &CancellationToken,
    ) -> EngineResult<AccountBlock> {
        poll_for(stage::RECEIVE_CONFIRMATION, hash, policy, cancel, || async move {
            match provider.account_block_by_hash(hash).await? {
                Some(current) if current.is_confirmed() => Ok(Some(current)),
                Some(_) => Ok(None),
                None => Err(EngineError::MissingBlock {
                    hash: hash.to_string(),
                }),
            }
        })
        .await
    }
}

/// Overall deadline shared by the polls of one flow.
struct Budget {
    deadline: Option<Instant>,
}

impl Budget {
    fn new(total: Option<Duration>) -> Self {
        Self {
            deadline: total.map(|t| Instant::now() + t),
        }
    }

    /// `base` bounded by what is left of the budget, if there is one.
    fn policy(&self, base: PollPolicy) -> PollPolicy {
        match self.deadline {
            Some(deadline) => base.with_timeout(deadline.saturating_duration_since(Instant::now())),
            None => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_budget_shrinks() {
        let budget = Budget::new(Some(Duration::from_secs(75)));
        tokio::time::sleep(Duration::from_secs(30)).await;
        let policy = budget.policy(PollPolicy::default());
        assert_eq!(policy.timeout, Duration::from_secs(45));
        assert_eq!(policy.interval, PollPolicy::DEFAULT_INTERVAL);

        let unbounded = Budget::new(None);
        assert_eq!(unbounded.policy(PollPolicy::default()), PollPolicy::default());
    }

    #[test]
    fn test_channel_sink_forwards() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.report(Progress::Linked { hash: "ab".into() });
        assert_eq!(rx.try_recv().unwrap(), Progress::Linked { hash: "ab".into() });
    }
}
