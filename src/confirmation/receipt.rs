//! Receive-block receipt decoding.
//!
//! A contract response block carries a fixed 33-byte payload: a 32-byte
//! execution digest followed by one status byte.

use crate::error::EngineError;
use crate::ledger::types::AccountBlock;

/// Length of the receipt payload on a response block.
pub const RECEIPT_LEN: usize = 33;

/// Terminal outcome of a receive block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    Success,
    Revert,
    StackOverflow,
    MalformedReceipt(String),
}

impl ReceiveOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ReceiveOutcome::Success)
    }

    /// Metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiveOutcome::Success => "success",
            ReceiveOutcome::Revert => "revert",
            ReceiveOutcome::StackOverflow => "stack_overflow",
            ReceiveOutcome::MalformedReceipt(_) => "malformed_receipt",
        }
    }

    /// `Ok(())` for success, otherwise the matching engine error.
    pub fn into_result(self, label: &str, hash: &str) -> Result<(), EngineError> {
        match self {
            ReceiveOutcome::Success => Ok(()),
            ReceiveOutcome::Revert => Err(EngineError::Revert {
                label: label.to_string(),
                hash: hash.to_string(),
            }),
            ReceiveOutcome::StackOverflow => Err(EngineError::StackOverflow {
                label: label.to_string(),
                hash: hash.to_string(),
            }),
            ReceiveOutcome::MalformedReceipt(reason) => Err(EngineError::MalformedReceipt {
                hash: hash.to_string(),
                reason,
            }),
        }
    }
}

/// Classify a confirmed receive block.
pub fn validate(block: &AccountBlock) -> ReceiveOutcome {
    if !block.block_type.is_response() {
        return ReceiveOutcome::MalformedReceipt(format!(
            "block type {} is not a response",
            u8::from(block.block_type)
        ));
    }

    let payload = match block.payload() {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return ReceiveOutcome::MalformedReceipt("missing receipt payload".to_string()),
        Err(e) => return ReceiveOutcome::MalformedReceipt(e.to_string()),
    };

    if payload.len() != RECEIPT_LEN {
        return ReceiveOutcome::MalformedReceipt(format!(
            "receipt is {} bytes, expected {}",
            payload.len(),
            RECEIPT_LEN
        ));
    }

    match payload[RECEIPT_LEN - 1] {
        0 => ReceiveOutcome::Success,
        1 => ReceiveOutcome::Revert,
        2 => ReceiveOutcome::StackOverflow,
        code => ReceiveOutcome::MalformedReceipt(format!("unknown receipt status {}", code)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::types::BlockType;

    fn response(block_type: u8, payload: &[u8]) -> AccountBlock {
        let address = "vite_0000000000000000000000000000000000000000a4f3a0cb58"
            .parse()
            .unwrap();
        let mut block = AccountBlock::request(BlockType::from(block_type), address);
        block.set_payload(payload);
        block
    }

    fn receipt(status: u8) -> Vec<u8> {
        let mut bytes = vec![0xabu8; 32];
        bytes.push(status);
        bytes
    }

    #[test]
    fn test_status_byte_mapping() {
        assert_eq!(validate(&response(4, &receipt(0))), ReceiveOutcome::Success);
        assert_eq!(validate(&response(4, &receipt(1))), ReceiveOutcome::Revert);
        assert_eq!(validate(&response(5, &receipt(2))), ReceiveOutcome::StackOverflow);
        assert!(matches!(
            validate(&response(4, &receipt(7))),
            ReceiveOutcome::MalformedReceipt(_)
        ));
    }

    #[test]
    fn test_wrong_type_or_length_is_malformed() {
        assert!(matches!(
            validate(&response(2, &receipt(0))),
            ReceiveOutcome::MalformedReceipt(_)
        ));
        assert!(matches!(
            validate(&response(4, &[0u8; 32])),
            ReceiveOutcome::MalformedReceipt(_)
        ));
        assert!(matches!(
            validate(&response(4, &[])),
            ReceiveOutcome::MalformedReceipt(_)
        ));
    }

    #[test]
    fn test_outcome_to_error() {
        let err = ReceiveOutcome::Revert.into_result("transfer", "ab").unwrap_err();
        assert_eq!(err.to_string(), "revert, methodName: transfer");
        assert!(ReceiveOutcome::Success.into_result("x", "y").is_ok());
    }
}
