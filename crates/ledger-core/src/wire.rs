//! JSON bodies exchanged between the node and its clients.

use crate::{Block, PreviousHash, Transaction};
use serde::{Deserialize, Serialize};
use serde_json::Number;

/// `POST /mine`. Both fields are optional on the wire so that a missing
/// field can be told apart from a zero proof.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MineRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MineResponse {
    pub message: String,
    pub index: u64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: PreviousHash,
}

impl MineResponse {
    pub fn forged(block: Block) -> Self {
        Self {
            message: "New Block Forged".to_string(),
            index: block.index,
            transactions: block.transactions,
            proof: block.proof,
            previous_hash: block.previous_hash,
        }
    }
}

/// `POST /transactions/new`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransactionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Number>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainResponse {
    pub length: usize,
    pub chain: Vec<Block>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub id: String,
    pub balance: Number,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mine_request_distinguishes_zero_from_missing() {
        let zero: MineRequest = serde_json::from_str(r#"{"id":"m","proof":0}"#).unwrap();
        assert_eq!(zero.proof, Some(0));
        let missing: MineRequest = serde_json::from_str(r#"{"id":"m"}"#).unwrap();
        assert_eq!(missing.proof, None);
    }

    #[test]
    fn transaction_request_accepts_any_number() {
        let req: TransactionRequest =
            serde_json::from_str(r#"{"sender":"a","recipient":"b","amount":2.5}"#).unwrap();
        assert_eq!(req.amount.and_then(|n| n.as_f64()), Some(2.5));
        let req: TransactionRequest =
            serde_json::from_str(r#"{"sender":"a","recipient":"b","amount":-3}"#).unwrap();
        assert_eq!(req.amount.and_then(|n| n.as_i64()), Some(-3));
    }

    #[test]
    fn mine_response_field_names() {
        let block = crate::chain::genesis_block();
        let json = serde_json::to_value(MineResponse::forged(block)).unwrap();
        let mut keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            ["index", "message", "previous_hash", "proof", "transactions"]
        );
    }
}
