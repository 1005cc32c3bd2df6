//! Direct-path send strategies and the fallback plan.

use async_trait::async_trait;

use crate::ledger::provider::LedgerProvider;
use crate::ledger::rpc::{LedgerRpc, PowDifficultyQuery};
use crate::ledger::types::{AccountBlock, LedgerError, LedgerResult};
use crate::ledger::wallet::{BlockSigner, SigningKey};

/// Previous hash of an account's first block.
const GENESIS_PREVIOUS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// How the proof-of-work nonce for a direct send is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStrategy {
    /// The node computes the nonce (`util_getPoWNonce`).
    ServerPow,
    /// The local signer computes the nonce.
    LocalPow,
}

impl SendStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendStrategy::ServerPow => "server_pow",
            SendStrategy::LocalPow => "local_pow",
        }
    }
}

/// Primary strategy and at most one fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitPlan {
    pub primary: SendStrategy,
    pub fallback: Option<SendStrategy>,
}

impl SubmitPlan {
    /// Use `strategy` with no fallback.
    pub fn single(strategy: SendStrategy) -> Self {
        Self {
            primary: strategy,
            fallback: None,
        }
    }
}

impl Default for SubmitPlan {
    fn default() -> Self {
        Self {
            primary: SendStrategy::ServerPow,
            fallback: Some(SendStrategy::LocalPow),
        }
    }
}

/// Signs and broadcasts a block from a locally held key.
#[async_trait]
pub trait DirectSender: Send + Sync {
    /// Complete `block` (height, previous hash, PoW, signature), broadcast
    /// it and return the block as sent.
    async fn send(
        &self,
        provider: &dyn LedgerProvider,
        block: AccountBlock,
        key: &SigningKey,
        strategy: SendStrategy,
    ) -> LedgerResult<AccountBlock>;
}

/// `DirectSender` over the ledger RPC surface, with signing and local PoW
/// delegated to a `BlockSigner`.
pub struct RpcDirectSender<S> {
    signer: S,
}

impl<S: BlockSigner> RpcDirectSender<S> {
    pub fn new(signer: S) -> Self {
        Self { signer }
    }
}

#[async_trait]
impl<S: BlockSigner> DirectSender for RpcDirectSender<S> {
    async fn send(
        &self,
        provider: &dyn LedgerProvider,
        mut block: AccountBlock,
        key: &SigningKey,
        strategy: SendStrategy,
    ) -> LedgerResult<AccountBlock> {
        let (height, previous_hash) = match provider.latest_account_block(&block.address).await? {
            Some(latest) => {
                let height: u64 = latest
                    .height
                    .as_deref()
                    .unwrap_or("0")
                    .parse()
                    .map_err(|_| LedgerError::Decode {
                        method: "ledger_getLatestAccountBlock".to_string(),
                        reason: format!("bad height {:?}", latest.height),
                    })?;
                let hash = latest.hash.ok_or_else(|| LedgerError::Decode {
                    method: "ledger_getLatestAccountBlock".to_string(),
                    reason: "latest block has no hash".to_string(),
                })?;
                (height + 1, hash)
            }
            None => (1, GENESIS_PREVIOUS_HASH.to_string()),
        };
        block.height = Some(height.to_string());
        block.previous_hash = Some(previous_hash.clone());

        let difficulty = provider
            .pow_difficulty(&PowDifficultyQuery {
                address: block.address.clone(),
                previous_hash,
                block_type: block.block_type,
                to_address: block.to_address.clone(),
                data: block.data.clone(),
            })
            .await?;

        if difficulty.requires_pow() {
            let seed = self.signer.pow_seed(&block)?;
            let nonce = match strategy {
                SendStrategy::ServerPow => provider.pow_nonce(&difficulty.difficulty, &seed).await?,
                SendStrategy::LocalPow => self.signer.solve_pow(&difficulty.difficulty, &seed)?,
            };
            tracing::debug!(strategy = strategy.as_str(), difficulty = %difficulty.difficulty, "PoW nonce obtained");
            block.difficulty = Some(difficulty.difficulty);
            block.nonce = Some(nonce);
        }

        self.signer.sign(&mut block, key)?;
        provider.send_raw_transaction(&block).await?;
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_plan_falls_back_once() {
        let plan = SubmitPlan::default();
        assert_eq!(plan.primary, SendStrategy::ServerPow);
        assert_eq!(plan.fallback, Some(SendStrategy::LocalPow));
        assert_eq!(SubmitPlan::single(SendStrategy::LocalPow).fallback, None);
    }
}
