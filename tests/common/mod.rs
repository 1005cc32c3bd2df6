//! Shared utilities for integration testing.
#![allow(dead_code)]

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use ledger_tx_engine::config::{EngineConfig, NodeConfig};
use ledger_tx_engine::ledger::provider::{LedgerProvider, Subscription, VmLogFilter};
use ledger_tx_engine::ledger::types::{AccountBlock, Address, BlockType, LedgerError, LedgerResult, Network};
use ledger_tx_engine::ledger::wallet::{BlockSigner, Keystore, SigningKey};
use ledger_tx_engine::routing::ProviderFactory;
use ledger_tx_engine::submission::{DirectSender, SendStrategy};

pub const ALICE: &str = "vite_0000000000000000000000000000000000000000a4f3a0cb58";
pub const BOB: &str = "vite_00000000000000000000000000000000000000056ad6d26692";
pub const CAROL: &str = "vite_000000000000000000000000000000000000000309508ba646";

pub fn addr(s: &str) -> Address {
    s.parse().unwrap()
}

pub fn node(name: &str, network: Network) -> NodeConfig {
    NodeConfig {
        name: name.to_string(),
        network,
        url: format!("http://{}.invalid:23456", name),
    }
}

/// Debug ledger node plus a bridge whose backend is that node.
pub fn config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.nodes = vec![node("local", Network::Debug), node("relay", Network::Bridge)];
    config.bridge.backend_network = Network::Debug;
    config.bridge.addresses = vec![CAROL.to_string()];
    config
}

/// Keystore holding a key for `ALICE` on the debug network.
pub fn keystore() -> Keystore {
    let keys = Keystore::new();
    keys.insert(Network::Debug, addr(ALICE), SigningKey::from_hex(&"11".repeat(32)).unwrap());
    keys
}

/// Block as the ledger reports it.
pub fn ledger_block(hash: &str, block_type: BlockType, address: &str) -> AccountBlock {
    let mut block = AccountBlock::request(block_type, addr(address));
    block.hash = Some(hash.to_string());
    block
}

/// Confirmed response block carrying a 33-byte receipt ending in `status`.
pub fn receive_block(hash: &str, status: u8) -> AccountBlock {
    let mut receipt = vec![0xab; 32];
    receipt.push(status);
    let mut block = ledger_block(hash, BlockType::Response, BOB);
    block.data = Some(BASE64.encode(receipt));
    block.confirmed_hash = Some(format!("snapshot-{}", hash));
    block
}

pub type Handler = Arc<dyn Fn(&Value, usize) -> LedgerResult<Value> + Send + Sync>;

/// In-memory provider answering each method from a scripted handler. The
/// handler receives the params and how many times the method was called
/// before.
pub struct ScriptedLedger {
    endpoint: String,
    handlers: Mutex<HashMap<String, Handler>>,
    calls: Mutex<Vec<String>>,
    latency: Mutex<Option<Duration>>,
    filters: AtomicUsize,
    unsubscribes: AtomicUsize,
}

impl ScriptedLedger {
    pub fn new(endpoint: &str) -> Arc<Self> {
        Arc::new(Self {
            endpoint: endpoint.to_string(),
            handlers: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            latency: Mutex::new(None),
            filters: AtomicUsize::new(0),
            unsubscribes: AtomicUsize::new(0),
        })
    }

    pub fn on<F>(&self, method: &str, handler: F) -> &Self
    where
        F: Fn(&Value, usize) -> LedgerResult<Value> + Send + Sync + 'static,
    {
        self.handlers
            .lock()
            .unwrap()
            .insert(method.to_string(), Arc::new(handler));
        self
    }

    /// Always answer `method` with `value`.
    pub fn returns(&self, method: &str, value: Value) -> &Self {
        self.on(method, move |_, _| Ok(value.clone()))
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    /// Methods called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|m| *m == method).count()
    }

    pub fn unsubscribes(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for ScriptedLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedLedger").field("endpoint", &self.endpoint).finish()
    }
}

#[async_trait]
impl LedgerProvider for ScriptedLedger {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn request(&self, method: &str, params: Value) -> LedgerResult<Value> {
        let seen = {
            let mut calls = self.calls.lock().unwrap();
            let seen = calls.iter().filter(|m| *m == method).count();
            calls.push(method.to_string());
            seen
        };
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let handler = self.handlers.lock().unwrap().get(method).cloned();
        match handler {
            Some(handler) => handler(&params, seen),
            None => Err(LedgerError::Rpc {
                method: method.to_string(),
                code: -32601,
                message: "method not found".to_string(),
            }),
        }
    }

    async fn subscribe(&self, _filter: VmLogFilter) -> LedgerResult<Subscription> {
        let n = self.filters.fetch_add(1, Ordering::SeqCst);
        let (_tx, events) = mpsc::channel(1);
        Ok(Subscription {
            id: format!("filter-{}", n),
            events,
        })
    }

    async fn unsubscribe_all(&self) {
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out a fixed `ScriptedLedger` per node name.
#[derive(Default)]
pub struct ScriptedFactory {
    ledgers: Mutex<HashMap<String, Arc<ScriptedLedger>>>,
    connects: AtomicUsize,
}

impl ScriptedFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Ledger served for `node`, created on first use.
    pub fn ledger(&self, node: &str) -> Arc<ScriptedLedger> {
        self.ledgers
            .lock()
            .unwrap()
            .entry(node.to_string())
            .or_insert_with(|| ScriptedLedger::new(&format!("scripted://{}", node)))
            .clone()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl ProviderFactory for ScriptedFactory {
    fn connect(&self, node: &NodeConfig) -> LedgerResult<Arc<dyn LedgerProvider>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.ledger(&node.name))
    }
}

/// `DirectSender` that fails the strategies it is told to and records every
/// attempt. Successful sends get hash `sent-<strategy>`.
#[derive(Default)]
pub struct ScriptedSender {
    failing: Mutex<Vec<SendStrategy>>,
    attempts: Mutex<Vec<(SendStrategy, String)>>,
}

impl ScriptedSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(strategies: &[SendStrategy]) -> Arc<Self> {
        let sender = Self::default();
        *sender.failing.lock().unwrap() = strategies.to_vec();
        Arc::new(sender)
    }

    /// Strategy and provider endpoint of every attempt.
    pub fn attempts(&self) -> Vec<(SendStrategy, String)> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl DirectSender for ScriptedSender {
    async fn send(
        &self,
        provider: &dyn LedgerProvider,
        mut block: AccountBlock,
        _key: &SigningKey,
        strategy: SendStrategy,
    ) -> LedgerResult<AccountBlock> {
        self.attempts
            .lock()
            .unwrap()
            .push((strategy, provider.endpoint().to_string()));
        if self.failing.lock().unwrap().contains(&strategy) {
            return Err(LedgerError::Signer(format!("{} rejected", strategy.as_str())));
        }
        block.hash = Some(format!("sent-{}", strategy.as_str()));
        block.previous_hash = Some("prev-0".to_string());
        block.height = Some("1".to_string());
        Ok(block)
    }
}

/// Deterministic `BlockSigner`. The PoW seed is `seed-<previous hash>`, a
/// locally solved nonce is `local-nonce`, and a signed block gets hash
/// `signed-<height>`. Clones share the record of local solves.
#[derive(Clone, Default)]
pub struct StubSigner {
    solved: Arc<Mutex<Vec<(String, String)>>>,
}

impl StubSigner {
    /// Difficulty and seed of every local PoW solve.
    pub fn solved(&self) -> Vec<(String, String)> {
        self.solved.lock().unwrap().clone()
    }
}

impl BlockSigner for StubSigner {
    fn pow_seed(&self, block: &AccountBlock) -> LedgerResult<String> {
        Ok(format!("seed-{}", block.previous_hash.as_deref().unwrap_or_default()))
    }

    fn solve_pow(&self, difficulty: &str, seed: &str) -> LedgerResult<String> {
        self.solved
            .lock()
            .unwrap()
            .push((difficulty.to_string(), seed.to_string()));
        Ok("local-nonce".to_string())
    }

    fn sign(&self, block: &mut AccountBlock, _key: &SigningKey) -> LedgerResult<()> {
        block.hash = Some(format!("signed-{}", block.height.as_deref().unwrap_or_default()));
        block.public_key = Some("cHVi".to_string());
        block.signature = Some("c2ln".to_string());
        Ok(())
    }
}

/// Start a JSON-RPC backend on an ephemeral port. `f` maps method and
/// params to the result, or to an `(code, message)` error.
pub async fn start_rpc_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, (i64, String)>> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_json_body(&mut socket).await else {
                            return;
                        };
                        let method = request["method"].as_str().unwrap_or_default().to_string();
                        let params = request["params"].clone();
                        let reply = match f(method, params).await {
                            Ok(result) => json!({ "jsonrpc": "2.0", "id": request["id"], "result": result }),
                            Err((code, message)) => json!({
                                "jsonrpc": "2.0",
                                "id": request["id"],
                                "error": { "code": code, "message": message },
                            }),
                        };
                        let body = reply.to_string();
                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn read_json_body(socket: &mut tokio::net::TcpStream) -> Option<Value> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
        let length = headers
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        let body_start = header_end + 4;
        if buf.len() >= body_start + length {
            return serde_json::from_slice(&buf[body_start..body_start + length]).ok();
        }
    }
}
