//! Session context.
//!
//! # Responsibilities
//! - Own the router, keystore, submitter and confirmation engine for one
//!   user session
//! - Track the contracts loaded on the current network and their log
//!   subscriptions
//! - Build account summaries (quota + native balance)
//! - Tear down subscriptions on network switch and on shutdown
//!
//! # Data Flow
//! ```text
//! send/call(TransferRequest)
//!     → TransactionSubmitter::submit
//!     → BlockConfirmationStateMachine::confirm (Send | Receipt)
//!
//! load_contract(DeployInfo)
//!     → network changed ? unsubscribe_all on the old read handle
//!     → new contract ? subscribe to its logs
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::confirmation::{
    poll_for, BlockConfirmationStateMachine, Confirmation, ConfirmationTarget, PollPolicy, ProgressSink,
};
use crate::error::{EngineError, EngineResult};
use crate::health::NodeStatus;
use crate::ledger::provider::{Subscription, VmLogFilter};
use crate::ledger::rpc::{LedgerRpc, StakeList};
use crate::ledger::types::{Address, Network, TokenId};
use crate::ledger::wallet::Keystore;
use crate::routing::NetworkRouter;
use crate::submission::{DirectSender, SubmitPlan, TransactionSubmitter, TransferRequest};

/// A deployed contract the session works with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployInfo {
    pub contract_name: String,
    pub address: Address,
    /// Contract ABI, passed through untouched.
    #[serde(default)]
    pub abi: Value,
    pub network: Network,
}

/// Quota and native balance of one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    pub address: Address,
    pub network: Network,
    pub quota: String,
    /// Whole native units, fraction truncated.
    pub balance: String,
}

#[derive(Debug, Default)]
struct SessionState {
    network: Option<Network>,
    contracts: HashMap<Address, DeployInfo>,
}

pub struct Session {
    config: EngineConfig,
    router: Arc<NetworkRouter>,
    keystore: Keystore,
    submitter: TransactionSubmitter,
    confirmer: BlockConfirmationStateMachine,
    state: Mutex<SessionState>,
    cancel: CancellationToken,
}

impl Session {
    /// Session over HTTP providers for the configured nodes.
    pub fn new(config: EngineConfig, keystore: Keystore, sender: Arc<dyn DirectSender>) -> Self {
        let router = Arc::new(NetworkRouter::new(&config));
        Self::with_router(config, router, keystore, sender)
    }

    pub fn with_router(
        config: EngineConfig,
        router: Arc<NetworkRouter>,
        keystore: Keystore,
        sender: Arc<dyn DirectSender>,
    ) -> Self {
        let submitter = TransactionSubmitter::new(router.clone(), keystore.clone(), sender);
        let confirmer = BlockConfirmationStateMachine::new(&config.polling);
        Self {
            config,
            router,
            keystore,
            submitter,
            confirmer,
            state: Mutex::new(SessionState::default()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_plan(mut self, plan: SubmitPlan) -> Self {
        self.submitter = self.submitter.with_plan(plan);
        self
    }

    pub fn router(&self) -> &Arc<NetworkRouter> {
        &self.router
    }

    pub fn keystore(&self) -> &Keystore {
        &self.keystore
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Token cancelled by `shutdown`; every confirmation wait observes it.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Connect the relay for the configured bridge addresses.
    pub fn connect_bridge(&self) -> EngineResult<()> {
        self.router.connect_bridge(self.bridge_addresses())
    }

    /// Submit `request` and wait until `target` is reached.
    pub async fn send(
        &self,
        request: &TransferRequest,
        target: ConfirmationTarget,
        sink: &dyn ProgressSink,
    ) -> EngineResult<Confirmation> {
        let submitted = self.submitter.submit(request).await?;
        self.confirmer
            .confirm(&submitted, target, sink, &self.cancel)
            .await
    }

    /// Value transfer; finishes at send confirmation.
    pub async fn transfer(&self, request: &TransferRequest, sink: &dyn ProgressSink) -> EngineResult<Confirmation> {
        self.send(request, ConfirmationTarget::Send, sink).await
    }

    /// Contract call; finishes once the receipt is decoded.
    pub async fn call(&self, request: &TransferRequest, sink: &dyn ProgressSink) -> EngineResult<Confirmation> {
        self.send(request, ConfirmationTarget::Receipt, sink).await
    }

    /// Read-only contract call. Polls until the node returns data.
    pub async fn query(&self, network: Network, contract: &Address, payload: &[u8]) -> EngineResult<Vec<u8>> {
        let provider = self.router.request_provider_for(network)?;
        let provider = provider.as_ref();
        tracing::info!(network = %network, contract = %contract, "Querying contract");
        poll_for(
            "query",
            contract.as_str(),
            PollPolicy::standard(&self.config.polling),
            &self.cancel,
            || async move { Ok::<_, EngineError>(provider.query_contract(contract, payload).await?) },
        )
        .await
    }

    /// One page of the stake entries of `address`: `count` entries starting
    /// at page `index`.
    pub async fn stake_list(
        &self,
        network: Network,
        address: &Address,
        index: u64,
        count: u64,
    ) -> EngineResult<StakeList> {
        let provider = self.router.request_provider_for(network)?;
        Ok(provider.stake_list(address, index, count).await?)
    }

    fn bridge_addresses(&self) -> Vec<Address> {
        self.config
            .bridge
            .addresses
            .iter()
            .filter_map(|a| a.parse().ok())
            .collect()
    }

    fn addresses_of(&self, network: Network) -> Vec<Address> {
        if network.is_bridge() {
            self.bridge_addresses()
        } else {
            self.keystore.addresses(network)
        }
    }

    /// Addresses shown for `network`. The bridge shows its own addresses
    /// followed by its backend's; the backend shows the bridge's too while
    /// the bridge is connected.
    pub fn account_addresses(&self, network: Network) -> Vec<Address> {
        let bridge = self.router.bridge_state();
        let mut addresses = self.addresses_of(network);
        if network.is_bridge() {
            addresses.extend(self.addresses_of(bridge.backend_network));
        } else if network == bridge.backend_network && bridge.status == NodeStatus::Connected {
            addresses.extend(self.addresses_of(Network::Bridge));
        }
        addresses
    }

    /// Quota and whole-unit native balance for every address on `network`.
    pub async fn account_summaries(&self, network: Network) -> EngineResult<Vec<AccountSummary>> {
        let provider = self.router.request_provider_for(network)?;
        let native = TokenId::native();
        let mut summaries = Vec::new();
        for address in self.account_addresses(network) {
            let quota = provider.quota(&address).await?;
            let info = provider.account_info(&address).await?;
            summaries.push(AccountSummary {
                balance: info.balance_of(&native)?.whole_units(),
                quota: quota.current_quota,
                network,
                address,
            });
        }
        Ok(summaries)
    }

    /// Network of the contracts currently loaded.
    pub async fn current_network(&self) -> Option<Network> {
        self.state.lock().await.network
    }

    pub async fn contracts(&self) -> Vec<DeployInfo> {
        self.state.lock().await.contracts.values().cloned().collect()
    }

    /// Load a contract. Switching network drops every loaded contract and
    /// closes the old network's subscriptions. A newly loaded contract gets
    /// a log subscription, returned to the caller; reloading a known
    /// contract returns `None`.
    pub async fn load_contract(&self, info: DeployInfo) -> EngineResult<Option<Subscription>> {
        let mut state = self.state.lock().await;

        if let Some(previous) = state.network.filter(|n| *n != info.network) {
            tracing::info!(from = %previous, to = %info.network, "Switching network, clearing contracts");
            state.contracts.clear();
            if let Ok(provider) = self.router.request_provider_for(previous) {
                provider.unsubscribe_all().await;
            }
        }
        state.network = Some(info.network);

        if state.contracts.contains_key(&info.address) {
            return Ok(None);
        }

        let provider = self.router.request_provider_for(info.network)?;
        let subscription = provider
            .subscribe(VmLogFilter::for_contract(&info.address))
            .await?;
        tracing::info!(
            network = %info.network,
            contract = %info.contract_name,
            address = %info.address,
            filter_id = %subscription.id,
            "Subscribed to contract logs"
        );
        state.contracts.insert(info.address.clone(), info);
        Ok(Some(subscription))
    }

    /// Cancel pending waits and close every provider handle.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        {
            let mut state = self.state.lock().await;
            state.contracts.clear();
            state.network = None;
        }
        self.router.shutdown().await;
        tracing::info!("Session closed");
    }
}
