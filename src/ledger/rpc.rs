//! Typed wrappers over the ledger RPC surface.
//!
//! Every result is decoded into a concrete type here, so nothing downstream
//! handles untyped JSON.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::ledger::amount::Amount;
use crate::ledger::provider::LedgerProvider;
use crate::ledger::types::{AccountBlock, Address, BlockType, LedgerError, LedgerResult, TokenId};

/// Method names, kept in one place.
pub mod methods {
    pub const SEND_RAW_TRANSACTION: &str = "ledger_sendRawTransaction";
    pub const GET_LATEST_ACCOUNT_BLOCK: &str = "ledger_getLatestAccountBlock";
    pub const GET_POW_DIFFICULTY: &str = "ledger_getPoWDifficulty";
    pub const GET_POW_NONCE: &str = "util_getPoWNonce";
    pub const RELAY_SIGN_AND_SEND: &str = "vite_signAndSendTx";
    pub const GET_ACCOUNT_BLOCKS: &str = "ledger_getAccountBlocksByAddress";
    pub const GET_ACCOUNT_BLOCK_BY_HASH: &str = "ledger_getAccountBlockByHash";
    pub const QUERY_CONTRACT: &str = "contract_query";
    pub const GET_QUOTA: &str = "contract_getQuotaByAccount";
    pub const GET_ACCOUNT_INFO: &str = "ledger_getAccountInfoByAddress";
    pub const GET_STAKE_LIST: &str = "contract_getStakeList";
    pub const GET_CHAIN_HEIGHT: &str = "ledger_getSnapshotChainHeight";
}

/// Parameters for a PoW difficulty lookup.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PowDifficultyQuery {
    pub address: Address,
    pub previous_hash: String,
    pub block_type: BlockType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// PoW requirement for a block the account is about to send.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowDifficulty {
    #[serde(default)]
    pub required_quota: String,
    /// Empty when the account's staked quota covers the block.
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub qc: String,
    #[serde(default)]
    pub is_congestion: bool,
}

impl PowDifficulty {
    pub fn requires_pow(&self) -> bool {
        !self.difficulty.is_empty() && self.difficulty != "0"
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaInfo {
    #[serde(default)]
    pub current_quota: String,
    #[serde(default)]
    pub max_quota: String,
    #[serde(default)]
    pub stake_amount: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceInfo {
    #[serde(default)]
    pub balance: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    #[serde(default)]
    pub block_count: Option<String>,
    #[serde(default)]
    pub balance_info_map: Option<HashMap<String, BalanceInfo>>,
}

impl AccountInfo {
    /// Balance of `token`, zero when the account never held it.
    pub fn balance_of(&self, token: &TokenId) -> LedgerResult<Amount> {
        match self
            .balance_info_map
            .as_ref()
            .and_then(|m| m.get(token.as_str()))
        {
            Some(info) => Amount::parse_raw(&info.balance),
            None => Ok(Amount::ZERO),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeInfo {
    #[serde(default)]
    pub beneficiary: Option<Address>,
    #[serde(default)]
    pub stake_amount: String,
    #[serde(default)]
    pub expiration_height: String,
    #[serde(default)]
    pub expiration_time: Option<i64>,
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeList {
    #[serde(default)]
    pub total_stake_amount: String,
    #[serde(default)]
    pub total_stake_count: u64,
    #[serde(default)]
    pub stake_list: Vec<StakeInfo>,
}

fn decode<T: DeserializeOwned>(method: &str, value: Value) -> LedgerResult<T> {
    serde_json::from_value(value).map_err(|e| LedgerError::Decode {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

/// Typed access to the ledger methods the engine uses. Implemented for every
/// `LedgerProvider`, including trait objects.
#[async_trait]
pub trait LedgerRpc {
    async fn send_raw_transaction(&self, block: &AccountBlock) -> LedgerResult<()>;
    async fn latest_account_block(&self, address: &Address) -> LedgerResult<Option<AccountBlock>>;
    async fn pow_difficulty(&self, query: &PowDifficultyQuery) -> LedgerResult<PowDifficulty>;
    async fn pow_nonce(&self, difficulty: &str, seed: &str) -> LedgerResult<String>;
    async fn relay_sign_and_send(&self, block: &AccountBlock, abi: Option<&Value>) -> LedgerResult<AccountBlock>;
    async fn account_blocks(&self, address: &Address, index: u64, count: u64) -> LedgerResult<Vec<AccountBlock>>;
    async fn account_block_by_hash(&self, hash: &str) -> LedgerResult<Option<AccountBlock>>;
    async fn query_contract(&self, contract: &Address, payload: &[u8]) -> LedgerResult<Option<Vec<u8>>>;
    async fn quota(&self, address: &Address) -> LedgerResult<QuotaInfo>;
    async fn account_info(&self, address: &Address) -> LedgerResult<AccountInfo>;
    async fn stake_list(&self, address: &Address, index: u64, count: u64) -> LedgerResult<StakeList>;
    async fn snapshot_chain_height(&self) -> LedgerResult<u64>;
}

#[async_trait]
impl<P: LedgerProvider + ?Sized> LedgerRpc for P {
    async fn send_raw_transaction(&self, block: &AccountBlock) -> LedgerResult<()> {
        self.request(methods::SEND_RAW_TRANSACTION, json!([block]))
            .await
            .map(|_| ())
    }

    async fn latest_account_block(&self, address: &Address) -> LedgerResult<Option<AccountBlock>> {
        let value = self
            .request(methods::GET_LATEST_ACCOUNT_BLOCK, json!([address]))
            .await?;
        decode(methods::GET_LATEST_ACCOUNT_BLOCK, value)
    }

    async fn pow_difficulty(&self, query: &PowDifficultyQuery) -> LedgerResult<PowDifficulty> {
        let value = self.request(methods::GET_POW_DIFFICULTY, json!([query])).await?;
        decode(methods::GET_POW_DIFFICULTY, value)
    }

    async fn pow_nonce(&self, difficulty: &str, seed: &str) -> LedgerResult<String> {
        let value = self
            .request(methods::GET_POW_NONCE, json!([difficulty, seed]))
            .await?;
        decode(methods::GET_POW_NONCE, value)
    }

    async fn relay_sign_and_send(&self, block: &AccountBlock, abi: Option<&Value>) -> LedgerResult<AccountBlock> {
        let mut request = json!({ "block": block });
        if let Some(abi) = abi {
            request["abi"] = abi.clone();
        }
        let value = self
            .request(methods::RELAY_SIGN_AND_SEND, json!([request]))
            .await?;
        decode(methods::RELAY_SIGN_AND_SEND, value)
    }

    async fn account_blocks(&self, address: &Address, index: u64, count: u64) -> LedgerResult<Vec<AccountBlock>> {
        let value = self
            .request(methods::GET_ACCOUNT_BLOCKS, json!([address, index, count]))
            .await?;
        let blocks: Option<Vec<AccountBlock>> = decode(methods::GET_ACCOUNT_BLOCKS, value)?;
        Ok(blocks.unwrap_or_default())
    }

    async fn account_block_by_hash(&self, hash: &str) -> LedgerResult<Option<AccountBlock>> {
        let value = self
            .request(methods::GET_ACCOUNT_BLOCK_BY_HASH, json!([hash]))
            .await?;
        decode(methods::GET_ACCOUNT_BLOCK_BY_HASH, value)
    }

    async fn query_contract(&self, contract: &Address, payload: &[u8]) -> LedgerResult<Option<Vec<u8>>> {
        let value = self
            .request(
                methods::QUERY_CONTRACT,
                json!([{ "address": contract, "data": BASE64.encode(payload) }]),
            )
            .await?;
        let encoded: Option<String> = decode(methods::QUERY_CONTRACT, value)?;
        match encoded.as_deref() {
            None | Some("") => Ok(None),
            Some(data) => BASE64
                .decode(data)
                .map(Some)
                .map_err(|e| LedgerError::Decode {
                    method: methods::QUERY_CONTRACT.to_string(),
                    reason: e.to_string(),
                }),
        }
    }

    async fn quota(&self, address: &Address) -> LedgerResult<QuotaInfo> {
        let value = self.request(methods::GET_QUOTA, json!([address])).await?;
        decode(methods::GET_QUOTA, value)
    }

    async fn account_info(&self, address: &Address) -> LedgerResult<AccountInfo> {
        let value = self.request(methods::GET_ACCOUNT_INFO, json!([address])).await?;
        let info: Option<AccountInfo> = decode(methods::GET_ACCOUNT_INFO, value)?;
        Ok(info.unwrap_or_default())
    }

    async fn stake_list(&self, address: &Address, index: u64, count: u64) -> LedgerResult<StakeList> {
        let value = self
            .request(methods::GET_STAKE_LIST, json!([address, index, count]))
            .await?;
        decode(methods::GET_STAKE_LIST, value)
    }

    async fn snapshot_chain_height(&self) -> LedgerResult<u64> {
        let value = self.request(methods::GET_CHAIN_HEIGHT, json!([])).await?;
        match &value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
        .ok_or_else(|| LedgerError::Decode {
            method: methods::GET_CHAIN_HEIGHT.to_string(),
            reason: format!("expected height, got {}", value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pow_requirement() {
        let mut d = PowDifficulty::default();
        assert!(!d.requires_pow());
        d.difficulty = "0".into();
        assert!(!d.requires_pow());
        d.difficulty = "67108863".into();
        assert!(d.requires_pow());
    }

    #[test]
    fn test_balance_lookup() {
        let info: AccountInfo = serde_json::from_value(json!({
            "blockCount": "3",
            "balanceInfoMap": {
                "tti_5649544520544f4b454e6e40": { "balance": "2500000000000000000" }
            }
        }))
        .unwrap();
        let balance = info.balance_of(&TokenId::native()).unwrap();
        assert_eq!(balance.whole_units(), "2");

        let other: TokenId = "tti_000000000000000000004cfd".parse().unwrap();
        assert_eq!(info.balance_of(&other).unwrap(), Amount::ZERO);
    }

    #[test]
    fn test_empty_account_info_has_no_balance() {
        let info = AccountInfo::default();
        assert_eq!(info.balance_of(&TokenId::native()).unwrap(), Amount::ZERO);
    }
}
