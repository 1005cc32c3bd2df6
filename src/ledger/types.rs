//! Ledger-specific types and error definitions.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Token id of the native unit.
pub const NATIVE_TOKEN_ID: &str = "tti_5649544520544f4b454e6e40";

/// Logical network a node (and therefore a provider handle) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Debug,
    TestNet,
    MainNet,
    /// Relay network: signs and sends for the addresses it manages, reads
    /// state from its backend network.
    Bridge,
}

impl Network {
    pub const ALL: [Network; 4] = [
        Network::Debug,
        Network::TestNet,
        Network::MainNet,
        Network::Bridge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Debug => "debug",
            Network::TestNet => "testnet",
            Network::MainNet => "mainnet",
            Network::Bridge => "bridge",
        }
    }

    pub fn is_bridge(&self) -> bool {
        matches!(self, Network::Bridge)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = LedgerError;

    /// Case-insensitive prefix match, so `"test"` and `"TestNet"` both work.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        if needle.is_empty() {
            return Err(LedgerError::InvalidInput("empty network name".to_string()));
        }
        Network::ALL
            .into_iter()
            .find(|n| n.as_str().starts_with(&needle))
            .ok_or_else(|| LedgerError::InvalidInput(format!("unknown network '{}'", s)))
    }
}

/// Ledger account address (`vite_` + 50 hex characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    const PREFIX: &'static str = "vite_";
    const HEX_LEN: usize = 50;

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last four characters, the short form used in user-facing messages.
    pub fn short(&self) -> &str {
        &self.0[self.0.len() - 4..]
    }
}

impl FromStr for Address {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix(Self::PREFIX)
            .ok_or_else(|| LedgerError::InvalidInput(format!("address '{}' lacks vite_ prefix", s)))?;
        if body.len() != Self::HEX_LEN || !body.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(LedgerError::InvalidInput(format!("malformed address '{}'", s)));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for Address {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(a: Address) -> Self {
        a.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Token identifier (`tti_` + 24 hex characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenId(String);

impl TokenId {
    pub fn native() -> Self {
        Self(NATIVE_TOKEN_ID.to_string())
    }

    pub fn is_native(&self) -> bool {
        self.0 == NATIVE_TOKEN_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TokenId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix("tti_") {
            Some(body) if body.len() == 24 && body.chars().all(|c| c.is_ascii_hexdigit()) => {
                Ok(Self(s.to_ascii_lowercase()))
            }
            _ => Err(LedgerError::InvalidInput(format!("malformed token id '{}'", s))),
        }
    }
}

impl TryFrom<String> for TokenId {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TokenId> for String {
    fn from(t: TokenId) -> Self {
        t.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Account block type tag as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum BlockType {
    CreateContractRequest,
    TransferRequest,
    ReIssueRequest,
    /// Ordinary contract response.
    Response,
    /// Response produced when execution failed and the value was refunded.
    ResponseFail,
    RefundByContractRequest,
    GenesisResponse,
    Unknown(u8),
}

impl BlockType {
    /// Response kinds that carry an execution receipt.
    pub fn is_response(&self) -> bool {
        matches!(self, BlockType::Response | BlockType::ResponseFail)
    }

    pub fn is_request(&self) -> bool {
        matches!(
            self,
            BlockType::CreateContractRequest
                | BlockType::TransferRequest
                | BlockType::ReIssueRequest
                | BlockType::RefundByContractRequest
        )
    }
}

impl From<u8> for BlockType {
    fn from(v: u8) -> Self {
        match v {
            1 => BlockType::CreateContractRequest,
            2 => BlockType::TransferRequest,
            3 => BlockType::ReIssueRequest,
            4 => BlockType::Response,
            5 => BlockType::ResponseFail,
            6 => BlockType::RefundByContractRequest,
            7 => BlockType::GenesisResponse,
            other => BlockType::Unknown(other),
        }
    }
}

impl From<BlockType> for u8 {
    fn from(t: BlockType) -> Self {
        match t {
            BlockType::CreateContractRequest => 1,
            BlockType::TransferRequest => 2,
            BlockType::ReIssueRequest => 3,
            BlockType::Response => 4,
            BlockType::ResponseFail => 5,
            BlockType::RefundByContractRequest => 6,
            BlockType::GenesisResponse => 7,
            BlockType::Unknown(v) => v,
        }
    }
}

/// Ledger-level transaction record tied to one address.
///
/// Fields the ledger fills in later (`hash`, `confirmed_hash`,
/// `receive_block_hash`) stay `None` until observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBlock {
    pub block_type: BlockType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<String>,
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<TokenId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<String>,
    /// Base64-encoded payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_block_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive_block_hash: Option<String>,
}

impl AccountBlock {
    /// Start an outgoing request block; ledger-assigned fields stay empty.
    pub fn request(block_type: BlockType, address: Address) -> Self {
        Self {
            block_type,
            height: None,
            hash: None,
            previous_hash: None,
            address,
            to_address: None,
            token_id: None,
            amount: None,
            fee: None,
            data: None,
            send_block_hash: None,
            difficulty: None,
            nonce: None,
            signature: None,
            public_key: None,
            confirmed_hash: None,
            receive_block_hash: None,
        }
    }

    /// Attach a raw payload, base64-encoding it for the wire. Empty payloads
    /// are left absent.
    pub fn set_payload(&mut self, payload: &[u8]) {
        self.data = if payload.is_empty() {
            None
        } else {
            Some(BASE64.encode(payload))
        };
    }

    /// Decode the base64 payload. `Ok(None)` when the block carries none.
    pub fn payload(&self) -> LedgerResult<Option<Vec<u8>>> {
        match self.data.as_deref() {
            None | Some("") => Ok(None),
            Some(encoded) => BASE64
                .decode(encoded)
                .map(Some)
                .map_err(|e| LedgerError::Decode {
                    method: "accountBlock.data".to_string(),
                    reason: e.to_string(),
                }),
        }
    }

    /// Hash, or `"<unsent>"` for logging before the ledger has assigned one.
    pub fn hash_or_placeholder(&self) -> &str {
        self.hash.as_deref().unwrap_or("<unsent>")
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed_hash.is_some()
    }
}

/// Errors raised while talking to a ledger node.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// HTTP transport failure (connection refused, bad status, ...).
    #[error("transport error at {endpoint}: {reason}")]
    Transport { endpoint: String, reason: String },

    /// The node answered with a JSON-RPC error object.
    #[error("RPC error {code} from {method}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    /// The node answered but the result did not have the expected shape.
    #[error("cannot decode {method} result: {reason}")]
    Decode { method: String, reason: String },

    /// A single request exceeded the configured RPC timeout.
    #[error("{method} timed out after {secs} seconds")]
    RequestTimeout { method: String, secs: u64 },

    /// Caller-supplied value failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Signing or local proof-of-work failed.
    #[error("signer error: {0}")]
    Signer(String),
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "vite_0000000000000000000000000000000000000000a4f3a0cb58";

    #[test]
    fn test_network_prefix_parse() {
        assert_eq!("test".parse::<Network>().unwrap(), Network::TestNet);
        assert_eq!("MainNet".parse::<Network>().unwrap(), Network::MainNet);
        assert_eq!("b".parse::<Network>().unwrap(), Network::Bridge);
        assert!("".parse::<Network>().is_err());
        assert!("ropsten".parse::<Network>().is_err());
    }

    #[test]
    fn test_address_validation() {
        let addr: Address = ADDR.parse().unwrap();
        assert_eq!(addr.short(), "cb58");
        assert!("0x1234".parse::<Address>().is_err());
        assert!("vite_zz".parse::<Address>().is_err());
    }

    #[test]
    fn test_block_type_tags() {
        assert_eq!(BlockType::from(4), BlockType::Response);
        assert_eq!(u8::from(BlockType::ResponseFail), 5);
        assert_eq!(BlockType::from(42), BlockType::Unknown(42));
        assert!(BlockType::Response.is_response());
        assert!(!BlockType::TransferRequest.is_response());
    }

    #[test]
    fn test_account_block_wire_shape() {
        let json = serde_json::json!({
            "blockType": 4,
            "hash": "ab",
            "address": ADDR,
            "data": "3q0=",
            "confirmedHash": "cd",
        });
        let block: AccountBlock = serde_json::from_value(json).unwrap();
        assert_eq!(block.block_type, BlockType::Response);
        assert_eq!(block.payload().unwrap(), Some(vec![0xde, 0xad]));
        assert!(block.is_confirmed());
        assert!(block.receive_block_hash.is_none());

        let out = serde_json::to_value(&block).unwrap();
        assert!(out.get("receiveBlockHash").is_none());
        assert_eq!(out["blockType"], 4);
    }

    #[test]
    fn test_empty_payload_is_absent() {
        let mut block = AccountBlock::request(BlockType::TransferRequest, ADDR.parse().unwrap());
        block.set_payload(&[]);
        assert!(block.data.is_none());
        assert_eq!(block.payload().unwrap(), None);
    }

    #[test]
    fn test_error_display() {
        let err = LedgerError::RequestTimeout {
            method: "ledger_getSnapshotChainHeight".into(),
            secs: 5,
        };
        assert_eq!(
            err.to_string(),
            "ledger_getSnapshotChainHeight timed out after 5 seconds"
        );
    }
}
