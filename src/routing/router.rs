//! Network → provider resolution.
//!
//! # Responsibilities
//! - Hold at most one live provider handle per node (and therefore per
//!   network, since a network is served by its first configured node)
//! - Route reads for the bridge network to its backend network
//! - Route sends from relay-managed addresses through the bridge while it
//!   is connected
//! - Tear down a handle's subscriptions before it is replaced or dropped

use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::config::{EngineConfig, NodeConfig, RpcConfig};
use crate::error::{EngineError, EngineResult};
use crate::health::state::NodeStatus;
use crate::ledger::provider::{HttpProvider, LedgerProvider};
use crate::ledger::types::{Address, LedgerResult, Network};

/// Creates provider handles for nodes.
pub trait ProviderFactory: Send + Sync {
    fn connect(&self, node: &NodeConfig) -> LedgerResult<Arc<dyn LedgerProvider>>;
}

/// Factory for JSON-RPC over HTTP handles.
#[derive(Debug, Clone)]
pub struct HttpProviderFactory {
    rpc: RpcConfig,
}

impl HttpProviderFactory {
    pub fn new(rpc: RpcConfig) -> Self {
        Self { rpc }
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn connect(&self, node: &NodeConfig) -> LedgerResult<Arc<dyn LedgerProvider>> {
        Ok(Arc::new(HttpProvider::new(&node.url, &self.rpc)?))
    }
}

/// Relay state. Replaced as a whole so readers never see a status from one
/// update paired with addresses from another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeState {
    pub status: NodeStatus,
    pub backend_network: Network,
    pub addresses: HashSet<Address>,
}

impl BridgeState {
    fn disconnected(backend_network: Network) -> Self {
        Self {
            status: NodeStatus::Stopped,
            backend_network,
            addresses: HashSet::new(),
        }
    }

    /// Whether sends from `address` go through the relay.
    pub fn manages(&self, address: &Address) -> bool {
        self.status == NodeStatus::Connected && self.addresses.contains(address)
    }
}

pub struct NetworkRouter {
    factory: Arc<dyn ProviderFactory>,
    nodes: ArcSwap<Vec<NodeConfig>>,
    /// node name → live handle.
    handles: DashMap<String, Arc<dyn LedgerProvider>>,
    bridge: ArcSwap<BridgeState>,
}

impl NetworkRouter {
    /// Router over the configured nodes using HTTP handles.
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_factory(
            config.nodes.clone(),
            config.bridge.backend_network,
            Arc::new(HttpProviderFactory::new(config.rpc.clone())),
        )
    }

    pub fn with_factory(
        nodes: Vec<NodeConfig>,
        backend_network: Network,
        factory: Arc<dyn ProviderFactory>,
    ) -> Self {
        Self {
            factory,
            nodes: ArcSwap::from_pointee(nodes),
            handles: DashMap::new(),
            bridge: ArcSwap::from_pointee(BridgeState::disconnected(backend_network)),
        }
    }

    /// Current node list.
    pub fn nodes(&self) -> Arc<Vec<NodeConfig>> {
        self.nodes.load_full()
    }

    /// Node backing `network`.
    pub fn node_for(&self, network: Network) -> Option<NodeConfig> {
        self.nodes.load().iter().find(|n| n.network == network).cloned()
    }

    pub fn bridge_state(&self) -> Arc<BridgeState> {
        self.bridge.load_full()
    }

    /// Handle for the named node, created on first use.
    pub fn provider_for_node(&self, name: &str) -> EngineResult<Arc<dyn LedgerProvider>> {
        if let Some(handle) = self.handles.get(name) {
            return Ok(handle.clone());
        }
        let nodes = self.nodes.load();
        let node = nodes
            .iter()
            .find(|n| n.name == name)
            .ok_or_else(|| EngineError::UnknownNode(name.to_string()))?;

        let handle = match self.handles.entry(node.name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(e) => e.get().clone(),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let handle = self.factory.connect(node)?;
                tracing::debug!(node = %node.name, network = %node.network, endpoint = %handle.endpoint(), "Provider handle created");
                slot.insert(handle.clone());
                handle
            }
        };
        Ok(handle)
    }

    /// Handle for `network` itself, with no bridge indirection.
    pub fn provider_for(&self, network: Network) -> EngineResult<Arc<dyn LedgerProvider>> {
        let node = self
            .node_for(network)
            .ok_or(EngineError::UnknownNetwork(network))?;
        self.provider_for_node(&node.name)
    }

    /// Handle that serves reads for `network`. Bridge reads go to the
    /// bridge's backend network.
    pub fn request_provider_for(&self, network: Network) -> EngineResult<Arc<dyn LedgerProvider>> {
        if network.is_bridge() {
            let backend = self.bridge.load().backend_network;
            return self.provider_for(backend);
        }
        self.provider_for(network)
    }

    /// Handle that sends for `from` on `network`.
    pub fn send_provider_for(&self, network: Network, from: &Address) -> EngineResult<Arc<dyn LedgerProvider>> {
        if !network.is_bridge() && self.bridge.load().manages(from) {
            tracing::debug!(network = %network, from = %from.short(), "Routing send through bridge");
            return self.provider_for(Network::Bridge);
        }
        self.provider_for(network)
    }

    /// Network a send from `from` on `network` is actually submitted on.
    pub fn effective_send_network(&self, network: Network, from: &Address) -> Network {
        if !network.is_bridge() && self.bridge.load().manages(from) {
            Network::Bridge
        } else {
            network
        }
    }

    /// Drop the named node's handle after closing its subscriptions.
    pub async fn reset_node(&self, name: &str) {
        if let Some((_, old)) = self.handles.remove(name) {
            old.unsubscribe_all().await;
            tracing::info!(node = name, endpoint = %old.endpoint(), "Provider handle reset");
        }
    }

    /// Replace the handle for `network` with a fresh one.
    pub async fn reset_provider(&self, network: Network) -> EngineResult<Arc<dyn LedgerProvider>> {
        let node = self
            .node_for(network)
            .ok_or(EngineError::UnknownNetwork(network))?;
        self.reset_node(&node.name).await;
        self.provider_for_node(&node.name)
    }

    /// Mark the relay connected and managing `addresses`.
    pub fn connect_bridge(&self, addresses: impl IntoIterator<Item = Address>) -> EngineResult<()> {
        self.provider_for(Network::Bridge)?;
        let backend_network = self.bridge.load().backend_network;
        let state = BridgeState {
            status: NodeStatus::Connected,
            backend_network,
            addresses: addresses.into_iter().collect(),
        };
        tracing::info!(
            backend = %backend_network,
            addresses = state.addresses.len(),
            "Bridge connected"
        );
        self.bridge.store(Arc::new(state));
        Ok(())
    }

    /// Stop routing through the relay and close its handle. The managed
    /// addresses are kept for [`reconnect_bridge`](Self::reconnect_bridge).
    pub async fn disconnect_bridge(&self) {
        let current = self.bridge.load_full();
        self.bridge.store(Arc::new(BridgeState {
            status: NodeStatus::Stopped,
            backend_network: current.backend_network,
            addresses: current.addresses.clone(),
        }));
        if let Some(node) = self.node_for(Network::Bridge) {
            self.reset_node(&node.name).await;
        }
        tracing::info!("Bridge disconnected");
    }

    /// Reconnect the relay with a fresh handle and the addresses it managed
    /// before.
    pub async fn reconnect_bridge(&self) -> EngineResult<()> {
        if let Some(node) = self.node_for(Network::Bridge) {
            self.reset_node(&node.name).await;
        }
        let addresses = self.bridge.load().addresses.clone();
        self.connect_bridge(addresses)
    }

    /// Swap in a reloaded node list. Handles of nodes whose endpoint or
    /// network changed, or that were removed, are torn down. Returns the
    /// names of the torn-down nodes.
    pub async fn apply_nodes(&self, nodes: Vec<NodeConfig>) -> Vec<String> {
        let previous = self.nodes.swap(Arc::new(nodes));
        let current = self.nodes.load_full();

        let mut stale = Vec::new();
        for old in previous.iter() {
            let kept = current.iter().any(|n| n == old);
            if !kept {
                stale.push(old.name.clone());
            }
        }
        for name in &stale {
            self.reset_node(name).await;
        }
        tracing::info!(nodes = current.len(), reset = stale.len(), "Node list applied");
        stale
    }

    /// Number of live handles.
    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    /// Close every handle's subscriptions and drop all handles.
    pub async fn shutdown(&self) {
        let names: Vec<String> = self.handles.iter().map(|e| e.key().clone()).collect();
        for name in names {
            self.reset_node(&name).await;
        }
    }
}

impl fmt::Debug for NetworkRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkRouter")
            .field("nodes", &self.nodes.load().len())
            .field("handles", &self.handles.len())
            .field("bridge", &self.bridge.load().status)
            .finish()
    }
}
