//! Provider handles: the JSON-RPC connection to one ledger node.
//!
//! # Responsibilities
//! - Send JSON-RPC requests with a per-request timeout
//! - Map transport, RPC and decode failures to `LedgerError`
//! - Own the node-side log filters opened by `subscribe` and tear them all
//!   down in `unsubscribe_all`

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::RpcConfig;
use crate::ledger::types::{Address, LedgerError, LedgerResult};

/// Height window of a log filter. `"0"`/`"0"` means "from now on".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeightRange {
    pub from_height: String,
    pub to_height: String,
}

/// Filter for contract log ("new-log") notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmLogFilter {
    pub address_height_range: BTreeMap<Address, HeightRange>,
}

impl VmLogFilter {
    /// Every new log emitted by `contract`.
    pub fn for_contract(contract: &Address) -> Self {
        let mut address_height_range = BTreeMap::new();
        address_height_range.insert(
            contract.clone(),
            HeightRange {
                from_height: "0".to_string(),
                to_height: "0".to_string(),
            },
        );
        Self {
            address_height_range,
        }
    }
}

/// Raw contract log as emitted by the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmLog {
    #[serde(default)]
    pub topics: Vec<String>,
    /// Base64-encoded non-indexed data.
    #[serde(default)]
    pub data: Option<String>,
}

/// One notification delivered on a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmLogEvent {
    #[serde(default)]
    pub vmlog: VmLog,
    #[serde(default)]
    pub account_block_hash: Option<String>,
    #[serde(default)]
    pub account_block_height: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub removed: bool,
}

/// A live subscription. Dropping the receiver stops delivery.
#[derive(Debug)]
pub struct Subscription {
    pub id: String,
    pub events: mpsc::Receiver<VmLogEvent>,
}

/// Handle to one ledger node.
///
/// Implementations own their subscription state; `unsubscribe_all` must be
/// called before a handle is discarded or re-pointed.
#[async_trait]
pub trait LedgerProvider: Send + Sync + fmt::Debug {
    /// Node endpoint, for logging.
    fn endpoint(&self) -> &str;

    /// Issue a JSON-RPC request. `params` is the positional parameter array.
    async fn request(&self, method: &str, params: Value) -> LedgerResult<Value>;

    /// Open a contract log subscription.
    async fn subscribe(&self, filter: VmLogFilter) -> LedgerResult<Subscription>;

    /// Close every subscription opened through this handle.
    async fn unsubscribe_all(&self);
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct FilterChanges {
    #[serde(default)]
    result: Vec<VmLogEvent>,
}

struct HttpInner {
    endpoint: String,
    client: reqwest::Client,
    timeout: Duration,
    poll_interval: Duration,
    next_id: AtomicU64,
    /// filter id -> token stopping its poll task.
    filters: DashMap<String, CancellationToken>,
    closed: CancellationToken,
}

impl HttpInner {
    async fn call(&self, method: &str, params: Value) -> LedgerResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let exchange = async {
            let response = self
                .client
                .post(&self.endpoint)
                .json(&body)
                .send()
                .await
                .map_err(|e| self.transport(e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                return Err(self.transport(format!("HTTP status {}", status)));
            }
            response
                .json::<RpcEnvelope>()
                .await
                .map_err(|e| LedgerError::Decode {
                    method: method.to_string(),
                    reason: e.to_string(),
                })
        };

        let envelope = match timeout(self.timeout, exchange).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(LedgerError::RequestTimeout {
                    method: method.to_string(),
                    secs: self.timeout.as_secs(),
                })
            }
        };

        if let Some(err) = envelope.error {
            return Err(LedgerError::Rpc {
                method: method.to_string(),
                code: err.code,
                message: err.message,
            });
        }
        Ok(envelope.result)
    }

    fn transport(&self, reason: String) -> LedgerError {
        LedgerError::Transport {
            endpoint: self.endpoint.clone(),
            reason,
        }
    }

    async fn uninstall(&self, filter_id: &str) {
        if let Err(e) = self
            .call("subscribe_uninstallFilter", json!([filter_id]))
            .await
        {
            tracing::warn!(endpoint = %self.endpoint, filter_id, error = %e, "Failed to uninstall log filter");
        }
    }
}

/// JSON-RPC over HTTP. Subscriptions are node-side filters polled at a fixed
/// interval.
pub struct HttpProvider {
    inner: Arc<HttpInner>,
}

impl HttpProvider {
    /// Create a handle for `endpoint`. No request is made until first use.
    pub fn new(endpoint: &str, config: &RpcConfig) -> LedgerResult<Self> {
        url::Url::parse(endpoint)
            .map_err(|e| LedgerError::InvalidInput(format!("invalid node URL '{}': {}", endpoint, e)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LedgerError::Transport {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            inner: Arc::new(HttpInner {
                endpoint: endpoint.to_string(),
                client,
                timeout: Duration::from_secs(config.timeout_secs),
                poll_interval: Duration::from_millis(config.subscription_poll_ms),
                next_id: AtomicU64::new(1),
                filters: DashMap::new(),
                closed: CancellationToken::new(),
            }),
        })
    }

    /// Number of open filters.
    pub fn subscription_count(&self) -> usize {
        self.inner.filters.len()
    }
}

#[async_trait]
impl LedgerProvider for HttpProvider {
    fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    async fn request(&self, method: &str, params: Value) -> LedgerResult<Value> {
        self.inner.call(method, params).await
    }

    async fn subscribe(&self, filter: VmLogFilter) -> LedgerResult<Subscription> {
        let method = "subscribe_createVmlogFilter";
        let filter_id = match self.inner.call(method, json!([filter])).await? {
            Value::String(id) => id,
            other => {
                return Err(LedgerError::Decode {
                    method: method.to_string(),
                    reason: format!("expected filter id, got {}", other),
                })
            }
        };

        let token = self.inner.closed.child_token();
        self.inner.filters.insert(filter_id.clone(), token.clone());
        let (tx, rx) = mpsc::channel(256);

        let inner = self.inner.clone();
        let id = filter_id.clone();
        tokio::spawn(async move {
            let mut ticker = interval(inner.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let changes = match inner
                    .call("subscribe_getChangesByFilterId", json!([id]))
                    .await
                    .and_then(|v| {
                        serde_json::from_value::<FilterChanges>(v).map_err(|e| LedgerError::Decode {
                            method: "subscribe_getChangesByFilterId".to_string(),
                            reason: e.to_string(),
                        })
                    }) {
                    Ok(changes) => changes,
                    Err(e) => {
                        tracing::warn!(endpoint = %inner.endpoint, filter_id = %id, error = %e, "Log filter poll failed");
                        continue;
                    }
                };

                for event in changes.result {
                    if tx.send(event).await.is_err() {
                        tracing::debug!(filter_id = %id, "Subscriber dropped, closing filter");
                        inner.filters.remove(&id);
                        inner.uninstall(&id).await;
                        return;
                    }
                }
            }
        });

        tracing::debug!(endpoint = %self.inner.endpoint, filter_id = %filter_id, "Log filter installed");
        Ok(Subscription {
            id: filter_id,
            events: rx,
        })
    }

    async fn unsubscribe_all(&self) {
        let ids: Vec<String> = self.inner.filters.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, token)) = self.inner.filters.remove(&id) {
                token.cancel();
                self.inner.uninstall(&id).await;
            }
        }
        tracing::debug!(endpoint = %self.inner.endpoint, "All log filters removed");
    }
}

impl Drop for HttpProvider {
    fn drop(&mut self) {
        self.inner.closed.cancel();
    }
}

impl fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpProvider")
            .field("endpoint", &self.inner.endpoint)
            .field("timeout_secs", &self.inner.timeout.as_secs())
            .field("filters", &self.inner.filters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rpc_config() -> RpcConfig {
        RpcConfig {
            timeout_secs: 1,
            subscription_poll_ms: 100,
        }
    }

    #[test]
    fn test_rejects_invalid_url() {
        let err = HttpProvider::new("not a url", &rpc_config()).unwrap_err();
        assert!(err.to_string().contains("invalid node URL"));
    }

    #[test]
    fn test_filter_wire_shape() {
        let contract: Address = "vite_0000000000000000000000000000000000000000a4f3a0cb58"
            .parse()
            .unwrap();
        let value = serde_json::to_value(VmLogFilter::for_contract(&contract)).unwrap();
        assert_eq!(
            value["addressHeightRange"][contract.as_str()]["fromHeight"],
            "0"
        );
    }

    #[tokio::test]
    async fn test_unreachable_node_is_transport_error() {
        // Port 9 (discard) is not expected to serve HTTP.
        let provider = HttpProvider::new("http://127.0.0.1:9", &rpc_config()).unwrap();
        let err = provider
            .request("ledger_getSnapshotChainHeight", json!([]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Transport { .. } | LedgerError::RequestTimeout { .. }
        ));
    }
}
