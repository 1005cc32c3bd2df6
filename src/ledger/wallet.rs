//! Local key material and the signing seam.
//!
//! # Security
//! - Keys are loaded only from an environment variable
//! - Keys are never logged or serialized
//!
//! Key derivation, the block hash layout and the signature scheme belong to
//! the ledger SDK; the engine reaches them through `BlockSigner`.

use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::ledger::types::{AccountBlock, Address, LedgerError, LedgerResult, Network};

/// Default environment variable holding wallet keys.
pub const WALLET_KEYS_ENV_VAR: &str = "LEDGER_WALLET_KEYS";

/// Private key bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    /// Parse a hex key, with or without `0x`.
    pub fn from_hex(key_hex: &str) -> LedgerResult<Self> {
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);
        let bytes = alloy::primitives::hex::decode(key_hex)
            .map_err(|e| LedgerError::InvalidInput(format!("invalid private key format: {}", e)))?;
        if bytes.is_empty() {
            return Err(LedgerError::InvalidInput("empty private key".to_string()));
        }
        Ok(Self(bytes))
    }

    pub fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// SDK operations the direct submission path needs.
pub trait BlockSigner: Send + Sync {
    /// Seed a PoW nonce is computed over for this block.
    fn pow_seed(&self, block: &AccountBlock) -> LedgerResult<String>;

    /// Compute a PoW nonce locally (base64).
    fn solve_pow(&self, difficulty: &str, seed: &str) -> LedgerResult<String>;

    /// Fill in `hash`, `public_key` and `signature`.
    fn sign(&self, block: &mut AccountBlock, key: &SigningKey) -> LedgerResult<()>;
}

#[derive(Debug, Clone)]
struct KeyEntry {
    network: Network,
    key: SigningKey,
    seq: u64,
}

/// Addresses with locally held keys, grouped by network.
#[derive(Debug, Clone, Default)]
pub struct Keystore {
    entries: Arc<DashMap<Address, KeyEntry>>,
    next_seq: Arc<AtomicU64>,
}

impl Keystore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `network:address:hexkey` entries separated by commas or
    /// whitespace.
    pub fn from_entries(entries: &str) -> LedgerResult<Self> {
        let store = Self::new();
        for item in entries.split(|c: char| c == ',' || c.is_whitespace()).filter(|s| !s.is_empty()) {
            let mut parts = item.splitn(3, ':');
            let (Some(network), Some(address), Some(key)) = (parts.next(), parts.next(), parts.next()) else {
                return Err(LedgerError::InvalidInput(
                    "wallet entry must be network:address:key".to_string(),
                ));
            };
            store.insert(network.parse()?, address.parse()?, SigningKey::from_hex(key)?);
        }
        Ok(store)
    }

    /// Load from `var`. A missing variable yields an empty keystore.
    pub fn from_env(var: &str) -> LedgerResult<Self> {
        match std::env::var(var) {
            Ok(entries) => {
                let store = Self::from_entries(&entries)?;
                tracing::info!(env = var, addresses = store.len(), "Wallet keys loaded");
                Ok(store)
            }
            Err(_) => {
                tracing::info!(env = var, "No wallet keys configured; direct sends unavailable");
                Ok(Self::new())
            }
        }
    }

    pub fn insert(&self, network: Network, address: Address, key: SigningKey) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(address, KeyEntry { network, key, seq });
    }

    /// Key for `address`, regardless of network.
    pub fn key_for(&self, address: &Address) -> Option<SigningKey> {
        self.entries.get(address).map(|e| e.key.clone())
    }

    /// Addresses held for `network`, in insertion order.
    pub fn addresses(&self, network: Network) -> Vec<Address> {
        let mut list: Vec<(u64, Address)> = self
            .entries
            .iter()
            .filter(|e| e.value().network == network)
            .map(|e| (e.value().seq, e.key().clone()))
            .collect();
        list.sort_by_key(|(seq, _)| *seq);
        list.into_iter().map(|(_, a)| a).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
