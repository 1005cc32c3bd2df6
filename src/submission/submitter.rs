//! Transaction submission.
//!
//! # Responsibilities
//! - Build the outgoing block for a request
//! - Relay path (bridge network): one `vite_signAndSendTx`, no fallback
//! - Direct path: resolve the local key first, then primary strategy and
//!   exactly one fallback attempt
//!
//! # Design Decisions
//! - No resubmission beyond the plan's single fallback
//! - The missing-key check happens before any network traffic

use std::sync::Arc;
use tracing::{Instrument, Span};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::ledger::provider::LedgerProvider;
use crate::ledger::rpc::LedgerRpc;
use crate::ledger::types::{AccountBlock, LedgerError, Network};
use crate::ledger::wallet::Keystore;
use crate::observability::{metrics, spans};
use crate::routing::NetworkRouter;
use crate::submission::request::TransferRequest;
use crate::submission::strategy::{DirectSender, SendStrategy, SubmitPlan};

/// Which path carried a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitPath {
    Relay,
    Direct(SendStrategy),
}

impl SubmitPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmitPath::Relay => "relay",
            SubmitPath::Direct(strategy) => strategy.as_str(),
        }
    }

    /// Direct sends must be linked to the ledger's copy of the block.
    pub fn needs_link(&self) -> bool {
        matches!(self, SubmitPath::Direct(_))
    }
}

/// A block the ledger accepted, with what is needed to confirm it.
#[derive(Debug, Clone)]
pub struct Submitted {
    pub block: AccountBlock,
    pub network: Network,
    pub path: SubmitPath,
    pub label: String,
    /// Handle that serves reads for this transaction's network.
    pub request_provider: Arc<dyn LedgerProvider>,
    pub trace_id: Uuid,
    /// Span the confirmation should run in.
    pub span: Span,
}

pub struct TransactionSubmitter {
    router: Arc<NetworkRouter>,
    keystore: Keystore,
    sender: Arc<dyn DirectSender>,
    plan: SubmitPlan,
}

impl TransactionSubmitter {
    pub fn new(router: Arc<NetworkRouter>, keystore: Keystore, sender: Arc<dyn DirectSender>) -> Self {
        Self {
            router,
            keystore,
            sender,
            plan: SubmitPlan::default(),
        }
    }

    pub fn with_plan(mut self, plan: SubmitPlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn plan(&self) -> SubmitPlan {
        self.plan
    }

    pub async fn submit(&self, request: &TransferRequest) -> EngineResult<Submitted> {
        let (span, trace_id) = spans::transaction_span(request.network, &request.label);
        let request_provider = self.router.request_provider_for(request.network)?;
        let result = self
            .dispatch(request)
            .instrument(span.clone())
            .await;

        match result {
            Ok((block, path)) => {
                metrics::record_submission(request.network, path.as_str(), "ok");
                span.in_scope(|| {
                    tracing::info!(
                        hash = %block.hash_or_placeholder(),
                        previous_hash = ?block.previous_hash,
                        path = path.as_str(),
                        "Block submitted"
                    );
                });
                Ok(Submitted {
                    block,
                    network: request.network,
                    path,
                    label: request.label.clone(),
                    request_provider,
                    trace_id,
                    span,
                })
            }
            Err(e) => {
                let path = if request.network.is_bridge() { "relay" } else { "direct" };
                metrics::record_submission(request.network, path, e.kind());
                span.in_scope(|| tracing::error!(error = %e, "Submission failed"));
                Err(e)
            }
        }
    }

    async fn dispatch(&self, request: &TransferRequest) -> EngineResult<(AccountBlock, SubmitPath)> {
        let block = request.to_block();
        tracing::info!(
            from = %request.from,
            to = %request.to,
            amount = %request.amount,
            token = %request.token_id,
            "Submitting block"
        );

        if request.network.is_bridge() {
            let provider = self.router.provider_for(Network::Bridge)?;
            let sent = provider
                .relay_sign_and_send(&block, request.abi.as_ref())
                .await
                .map_err(|source| self.failed(request, source))?;
            return Ok((sent, SubmitPath::Relay));
        }

        let key = self
            .keystore
            .key_for(&request.from)
            .ok_or_else(|| EngineError::AddressNotFound {
                address: request.from.clone(),
            })?;
        let provider = self.router.send_provider_for(request.network, &request.from)?;

        let primary = self.plan.primary;
        let primary_err = match self
            .sender
            .send(provider.as_ref(), block.clone(), &key, primary)
            .await
        {
            Ok(sent) => return Ok((sent, SubmitPath::Direct(primary))),
            Err(e) => e,
        };

        let Some(fallback) = self.plan.fallback else {
            return Err(self.failed(request, primary_err));
        };

        tracing::warn!(
            strategy = primary.as_str(),
            fallback = fallback.as_str(),
            error = %primary_err,
            "Primary send failed, falling back"
        );
        metrics::record_fallback(request.network);

        self.sender
            .send(provider.as_ref(), block, &key, fallback)
            .await
            .map(|sent| (sent, SubmitPath::Direct(fallback)))
            .map_err(|source| self.failed(request, source))
    }

    fn failed(&self, request: &TransferRequest, source: LedgerError) -> EngineError {
        EngineError::SubmissionFailed {
            network: request.network,
            label: request.label.clone(),
            source,
        }
    }
}
