//! Daemon startup and run loop.
//!
//! # Order
//! config → logging → metrics → router (+ bridge) → health monitor →
//! config watcher → wait for shutdown → close handles
//!
//! Any startup error is fatal; nothing after startup is.

use std::path::Path;
use std::sync::Arc;

use crate::config::watcher::ConfigWatcher;
use crate::config::{load_config, EngineConfig};
use crate::health::{NodeEvent, NodeHealthMonitor, NodeStatus};
use crate::ledger::types::Address;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::shutdown_on_signal;
use crate::observability::{logging, metrics};
use crate::routing::NetworkRouter;

/// Load the config at `path` and run the daemon until a signal arrives.
pub async fn run_daemon(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(path)?;
    logging::init_logging(&config.observability.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %path.display(),
        nodes = config.nodes.len(),
        "ledger-engine starting"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?);
    }

    let shutdown = Shutdown::new();
    let router = Arc::new(NetworkRouter::new(&config));
    connect_bridge(&router, &config)?;

    let monitor = NodeHealthMonitor::new(router.clone(), config.health_check.clone());
    let monitor_task = tokio::spawn(monitor.clone().run(shutdown.subscribe()));
    let events_task = tokio::spawn(log_node_events(monitor.clone(), shutdown.clone()));

    let (watcher, mut updates) = ConfigWatcher::new(path);
    // Dropping the returned watcher stops file notifications.
    let _watcher = match watcher.run() {
        Ok(w) => Some(w),
        Err(e) => {
            tracing::warn!(error = %e, "Config hot reload unavailable");
            None
        }
    };

    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    loop {
        tokio::select! {
            Some(next) = updates.recv() => {
                apply_reload(&router, &monitor, &config, &next).await;
                config = next;
            }
            _ = shutdown.wait() => break,
        }
    }

    tracing::info!("Shutting down");
    let _ = monitor_task.await;
    let _ = events_task.await;
    router.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

fn connect_bridge(router: &NetworkRouter, config: &EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    if !config.bridge.enabled {
        return Ok(());
    }
    let addresses = config
        .bridge
        .addresses
        .iter()
        .map(|a| a.parse())
        .collect::<Result<Vec<Address>, _>>()?;
    router.connect_bridge(addresses)?;
    Ok(())
}

async fn apply_reload(router: &NetworkRouter, monitor: &NodeHealthMonitor, current: &EngineConfig, next: &EngineConfig) {
    let reset = router.apply_nodes(next.nodes.clone()).await;
    monitor.apply_nodes();

    if next.bridge.addresses != current.bridge.addresses && router.bridge_state().status == NodeStatus::Connected {
        let addresses = next.bridge.addresses.iter().filter_map(|a| a.parse().ok());
        if let Err(e) = router.connect_bridge(addresses) {
            tracing::error!(error = %e, "Failed to update bridge addresses");
        }
    }
    if next.polling.interval_ms != current.polling.interval_ms
        || next.health_check.interval_secs != current.health_check.interval_secs
    {
        tracing::warn!("Polling and health intervals take effect on restart");
    }
    tracing::info!(reset_nodes = reset.len(), "Configuration reloaded");
}

async fn log_node_events(monitor: Arc<NodeHealthMonitor>, shutdown: Shutdown) {
    let mut events = monitor.subscribe();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(NodeEvent::StatusChanged { node, from, to, error }) => {
                    tracing::info!(node = %node, from = %from, to = %to, error = ?error, "Node status");
                }
                Ok(NodeEvent::Height { .. }) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!(skipped = n, "Node event listener lagged");
                }
                Err(_) => break,
            },
            _ = shutdown.wait() => break,
        }
    }
}
