//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from the TOML config
//! file. Every section has defaults so a minimal file only lists nodes.

use serde::{Deserialize, Serialize};

use crate::ledger::types::Network;

/// Root configuration for the engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Ledger nodes, one or more per network.
    pub nodes: Vec<NodeConfig>,

    /// Relay ("bridge") settings.
    pub bridge: BridgeConfig,

    /// Confirmation polling bounds.
    pub polling: PollingConfig,

    /// Node health monitoring.
    pub health_check: HealthCheckConfig,

    /// RPC transport settings.
    pub rpc: RpcConfig,

    /// Where wallet keys come from.
    pub wallet: WalletConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

impl EngineConfig {
    /// First node configured for `network`; that node backs the network's
    /// provider handle.
    pub fn node_for(&self, network: Network) -> Option<&NodeConfig> {
        self.nodes.iter().find(|n| n.network == network)
    }
}

/// A ledger node.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NodeConfig {
    /// Unique node name (e.g. "local", "testnet-1").
    pub name: String,

    /// Network the node serves.
    pub network: Network,

    /// JSON-RPC HTTP endpoint.
    pub url: String,
}

/// Relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Connect the bridge at startup.
    pub enabled: bool,

    /// Network whose node serves reads for bridge transactions.
    pub backend_network: Network,

    /// Addresses whose signing authority lives behind the relay.
    pub addresses: Vec<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend_network: Network::TestNet,
            addresses: Vec::new(),
        }
    }
}

/// Polling bounds for confirmation waits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Fixed interval between polls.
    pub interval_ms: u64,

    /// Bound for a single wait in standard flows.
    pub timeout_ms: u64,

    /// Overall bound for the send + receive receipt flow.
    pub receipt_timeout_ms: u64,

    /// How many recent sender blocks to scan when linking a direct send.
    pub link_window: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            timeout_ms: 30_000,
            receipt_timeout_ms: 75_000,
            link_window: 3,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable background height polling.
    pub enabled: bool,

    /// Refresh cadence in seconds.
    pub interval_secs: u64,

    /// Height query timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            timeout_secs: 5,
        }
    }
}

/// RPC transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Poll interval of log subscriptions in milliseconds.
    pub subscription_poll_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            subscription_poll_ms: 1_000,
        }
    }
}

/// Wallet configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Environment variable holding `network:address:key` entries.
    pub keys_env: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            keys_env: crate::ledger::wallet::WALLET_KEYS_ENV_VAR.to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.polling.interval_ms, 500);
        assert_eq!(config.polling.timeout_ms, 30_000);
        assert_eq!(config.polling.receipt_timeout_ms, 75_000);
        assert_eq!(config.health_check.interval_secs, 10);
        assert!(!config.bridge.enabled);
    }

    #[test]
    fn test_minimal_toml() {
        let config: EngineConfig = toml::from_str(
            r#"
            [[nodes]]
            name = "local"
            network = "debug"
            url = "http://127.0.0.1:23456"

            [bridge]
            backend_network = "mainnet"
            "#,
        )
        .unwrap();
        assert_eq!(config.nodes.len(), 1);
        assert_eq!(config.node_for(Network::Debug).unwrap().name, "local");
        assert!(config.node_for(Network::TestNet).is_none());
        assert_eq!(config.bridge.backend_network, Network::MainNet);
        assert_eq!(config.rpc.timeout_secs, 10);
    }
}
