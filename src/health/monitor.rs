//! Background node liveness polling.
//!
//! # Responsibilities
//! - Every interval, query the snapshot height of each Running or Syncing
//!   node
//! - Keep at most one height query in flight per node
//! - Promote Syncing nodes on success, mark Timeout on failure
//! - Publish heights and status changes (broadcast channel + gauges)
//! - Mirror the router's bridge status onto relay nodes; relay stop and
//!   reconnect go through the router

use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::HealthCheckConfig;
use crate::error::{EngineError, EngineResult};
use crate::health::state::{Node, NodeStatus};
use crate::ledger::rpc::LedgerRpc;
use crate::observability::metrics;
use crate::resilience::{FlightGuard, SingleFlight};
use crate::routing::NetworkRouter;

/// Observable change on a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    Height {
        node: String,
        height: u64,
    },
    StatusChanged {
        node: String,
        from: NodeStatus,
        to: NodeStatus,
        error: Option<String>,
    },
}

pub struct NodeHealthMonitor {
    router: Arc<NetworkRouter>,
    config: HealthCheckConfig,
    nodes: ArcSwap<Vec<Arc<Node>>>,
    flights: SingleFlight,
    events: broadcast::Sender<NodeEvent>,
}

impl NodeHealthMonitor {
    pub fn new(router: Arc<NetworkRouter>, config: HealthCheckConfig) -> Arc<Self> {
        let nodes = router.nodes().iter().map(Node::from_config).collect();
        let (events, _) = broadcast::channel(64);
        let monitor = Arc::new(Self {
            router,
            config,
            nodes: ArcSwap::from_pointee(nodes),
            flights: SingleFlight::new(),
            events,
        });
        monitor.sync_bridge();
        monitor
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.events.subscribe()
    }

    pub fn nodes(&self) -> Arc<Vec<Arc<Node>>> {
        self.nodes.load_full()
    }

    pub fn node(&self, name: &str) -> Option<Arc<Node>> {
        self.nodes.load().iter().find(|n| n.name == name).cloned()
    }

    /// Run the refresh loop until `shutdown` fires.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        if !self.config.enabled {
            tracing::info!("Node health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            nodes = self.nodes.load().len(),
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.refresh();
                }
                _ = shutdown.cancelled() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Start a height query for every polled node that has none in flight.
    /// Returns the spawned queries.
    pub fn refresh(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        self.sync_bridge();
        let mut spawned = Vec::new();
        for node in self.nodes.load().iter() {
            if node.network.is_bridge() || !node.status().is_polled() {
                continue;
            }
            let Some(guard) = self.flights.try_acquire(&node.name) else {
                tracing::debug!(node = %node.name, "Height query still in flight, skipping");
                continue;
            };
            let monitor = self.clone();
            let node = node.clone();
            spawned.push(tokio::spawn(async move {
                monitor.query(node, guard).await;
            }));
        }
        spawned
    }

    async fn query(&self, node: Arc<Node>, _guard: FlightGuard) {
        let provider = match self.router.provider_for_node(&node.name) {
            Ok(p) => p,
            Err(e) => {
                self.fail(&node, e.to_string());
                return;
            }
        };

        let limit = Duration::from_secs(self.config.timeout_secs);
        match time::timeout(limit, provider.snapshot_chain_height()).await {
            Ok(Ok(height)) => {
                let before = node.status();
                let after = node.mark_height(height);
                tracing::debug!(node = %node.name, height, "Node height");
                metrics::record_node_height(&node.name, height);
                metrics::record_node_up(&node.name, after.is_polled());
                let _ = self.events.send(NodeEvent::Height {
                    node: node.name.clone(),
                    height,
                });
                if before != after {
                    tracing::info!(node = %node.name, from = %before, to = %after, "Node status changed");
                    let _ = self.events.send(NodeEvent::StatusChanged {
                        node: node.name.clone(),
                        from: before,
                        to: after,
                        error: None,
                    });
                }
            }
            Ok(Err(e)) => self.fail(&node, e.to_string()),
            Err(_) => self.fail(
                &node,
                format!("height query timed out after {}s", limit.as_secs()),
            ),
        }
    }

    fn fail(&self, node: &Node, error: String) {
        // stop/reconnect may move the node on while the query runs
        let before = node.status();
        if !before.is_polled() || !node.mark_failure(before, error.clone()) {
            tracing::debug!(node = %node.name, error = %error, "Dropping failure for a node that changed state");
            return;
        }
        tracing::warn!(node = %node.name, url = %node.url, error = %error, "Node height query failed");
        metrics::record_node_up(&node.name, false);
        let _ = self.events.send(NodeEvent::StatusChanged {
            node: node.name.clone(),
            from: before,
            to: NodeStatus::Timeout,
            error: Some(error),
        });
    }

    fn transition(&self, node: &Node, to: NodeStatus) {
        let from = node.status();
        match to {
            NodeStatus::Syncing => node.reset(),
            other => {
                node.set_status(other);
            }
        }
        metrics::record_node_up(&node.name, to.is_polled());
        if from != to {
            tracing::info!(node = %node.name, from = %from, to = %to, "Node status changed");
            let _ = self.events.send(NodeEvent::StatusChanged {
                node: node.name.clone(),
                from,
                to,
                error: None,
            });
        }
    }

    /// Copy the router's bridge status onto the relay nodes.
    fn sync_bridge(&self) {
        let status = self.router.bridge_state().status;
        for node in self.nodes.load().iter() {
            if node.network.is_bridge() && node.status() != status {
                self.transition(node, status);
            }
        }
    }

    /// Clear the node's error, put it back to Syncing and give it a fresh
    /// provider handle. A relay node is reconnected through the router.
    pub async fn reconnect(&self, name: &str) -> EngineResult<()> {
        let node = self
            .node(name)
            .ok_or_else(|| EngineError::UnknownNode(name.to_string()))?;
        if node.network.is_bridge() {
            self.router.reconnect_bridge().await?;
            self.sync_bridge();
        } else {
            self.router.reset_node(name).await;
            self.transition(&node, NodeStatus::Syncing);
        }
        Ok(())
    }

    /// Stop polling the node. Stopping a relay node disconnects the bridge,
    /// so its addresses send on their own network again.
    pub async fn stop(&self, name: &str) -> EngineResult<()> {
        let node = self
            .node(name)
            .ok_or_else(|| EngineError::UnknownNode(name.to_string()))?;
        if node.network.is_bridge() {
            self.router.disconnect_bridge().await;
            self.sync_bridge();
        } else {
            self.transition(&node, NodeStatus::Stopped);
        }
        Ok(())
    }

    /// Rebuild the node set from the router's current node list. Unchanged
    /// nodes keep their state.
    pub fn apply_nodes(&self) {
        let current = self.nodes.load_full();
        let next: Vec<Arc<Node>> = self
            .router
            .nodes()
            .iter()
            .map(|config| {
                current
                    .iter()
                    .find(|n| n.name == config.name && n.url == config.url && n.network == config.network)
                    .cloned()
                    .unwrap_or_else(|| Node::from_config(config))
            })
            .collect();
        tracing::info!(nodes = next.len(), "Health monitor node set updated");
        self.nodes.store(Arc::new(next));
        self.sync_bridge();
    }
}
