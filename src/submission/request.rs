//! Outgoing transfer / contract call request.

use serde_json::Value;

use crate::ledger::amount::Amount;
use crate::ledger::types::{AccountBlock, Address, BlockType, Network, TokenId};

/// Everything needed to build one outgoing account block.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub network: Network,
    pub from: Address,
    pub to: Address,
    pub token_id: TokenId,
    pub amount: Amount,
    pub fee: Option<Amount>,
    pub payload: Vec<u8>,
    pub block_type: BlockType,
    /// Function ABI forwarded to the relay so it can render the call.
    pub abi: Option<Value>,
    /// Human label for logs and errors (`"transfer"`, a method name, ...).
    pub label: String,
}

impl TransferRequest {
    /// Plain native-token transfer of zero, to be refined with the builder
    /// methods.
    pub fn new(network: Network, from: Address, to: Address) -> Self {
        Self {
            network,
            from,
            to,
            token_id: TokenId::native(),
            amount: Amount::ZERO,
            fee: None,
            payload: Vec::new(),
            block_type: BlockType::TransferRequest,
            abi: None,
            label: "transfer".to_string(),
        }
    }

    pub fn amount(mut self, amount: Amount) -> Self {
        self.amount = amount;
        self
    }

    pub fn token(mut self, token_id: TokenId) -> Self {
        self.token_id = token_id;
        self
    }

    pub fn fee(mut self, fee: Amount) -> Self {
        self.fee = Some(fee);
        self
    }

    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn block_type(mut self, block_type: BlockType) -> Self {
        self.block_type = block_type;
        self
    }

    /// Mark as a contract call: sets the label and the ABI for the relay.
    pub fn call(mut self, method: impl Into<String>, abi: Option<Value>) -> Self {
        self.label = method.into();
        self.abi = abi;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Unsigned block carrying this request.
    pub fn to_block(&self) -> AccountBlock {
        let mut block = AccountBlock::request(self.block_type, self.from.clone());
        block.to_address = Some(self.to.clone());
        block.token_id = Some(self.token_id.clone());
        block.amount = Some(self.amount.to_string());
        block.fee = self.fee.map(|f| f.to_string());
        block.set_payload(&self.payload);
        block
    }
}
