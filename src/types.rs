/*
    Copyright © 2023, Mocknet Runtime Contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Data types that cross the boundary between the mocknet and its callers, and the `env`/`info`
//! documents that the mocknet hands to contract entry points.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Funds attached to a message. The mocknet forwards them to the contract but keeps no balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

impl Coin {
    pub fn new(amount: u128, denom: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount: amount.to_string(),
        }
    }
}

/// Result of uploading code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uploaded {
    pub code_id: String,
    pub code_hash: String,
}

/// Parameters of an instantiation.
#[derive(Debug, Clone, PartialEq)]
pub struct Instantiate {
    pub code_id: String,
    /// When present, must match the hash of the uploaded code.
    pub code_hash: Option<String>,
    pub label: String,
    pub init_msg: Value,
    pub funds: Vec<Coin>,
}

impl Instantiate {
    pub fn new(code_id: impl Into<String>, label: impl Into<String>, init_msg: Value) -> Self {
        Self {
            code_id: code_id.into(),
            code_hash: None,
            label: label.into(),
            init_msg,
            funds: Vec::new(),
        }
    }

    pub fn with_code_hash(mut self, code_hash: impl Into<String>) -> Self {
        self.code_hash = Some(code_hash.into());
        self
    }

    pub fn with_funds(mut self, funds: Vec<Coin>) -> Self {
        self.funds = funds;
        self
    }
}

/// Result of an instantiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instantiated {
    pub address: String,
    pub code_id: String,
    pub code_hash: String,
    pub label: String,
}

/// Reference to a deployed contract. The code hash is optional; when given it is checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractLink {
    pub address: String,
    pub code_hash: Option<String>,
}

impl ContractLink {
    pub fn new(address: impl Into<String>, code_hash: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            code_hash: Some(code_hash.into()),
        }
    }
}

impl From<&str> for ContractLink {
    fn from(address: &str) -> Self {
        Self {
            address: address.to_string(),
            code_hash: None,
        }
    }
}

impl From<String> for ContractLink {
    fn from(address: String) -> Self {
        Self {
            address,
            code_hash: None,
        }
    }
}

impl From<&Instantiated> for ContractLink {
    fn from(instance: &Instantiated) -> Self {
        Self::new(instance.address.clone(), instance.code_hash.clone())
    }
}

/// Block data of the mock chain at the time of a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockInfo {
    pub height: u64,
    /// Nanoseconds since the Unix epoch, as a decimal string (`Timestamp` in contracts).
    pub time: String,
    pub chain_id: String,
}

impl BlockInfo {
    pub fn new(height: u64, time_secs: u64, chain_id: &str) -> Self {
        Self {
            height,
            time: (u128::from(time_secs) * 1_000_000_000).to_string(),
            chain_id: chain_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractInfo {
    pub address: String,
    pub code_hash: String,
}

/// The `env` argument of every entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractEnv {
    pub block: BlockInfo,
    pub transaction: Option<Value>,
    pub contract: ContractInfo,
    pub contract_key: Option<String>,
    pub contract_code_hash: String,
}

impl ContractEnv {
    pub fn new(block: BlockInfo, address: &str, code_hash: &str) -> Self {
        Self {
            block,
            transaction: None,
            contract: ContractInfo {
                address: address.to_string(),
                code_hash: code_hash.to_string(),
            },
            contract_key: None,
            contract_code_hash: code_hash.to_string(),
        }
    }
}

/// The `info` argument of `instantiate` and `execute`. `sent_funds` repeats `funds` under the
/// name older contracts look for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageInfo {
    pub sender: String,
    pub funds: Vec<Coin>,
    pub sent_funds: Vec<Coin>,
}

impl MessageInfo {
    pub fn new(sender: &str, funds: &[Coin]) -> Self {
        Self {
            sender: sender.to_string(),
            funds: funds.to_vec(),
            sent_funds: funds.to_vec(),
        }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_env_document() {
        let env = ContractEnv::new(BlockInfo::new(7, 1_700_000_000, "mocknet-1"), "mocknet1xyz", "abcd");
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({
                "block": {"height": 7, "time": "1700000000000000000", "chain_id": "mocknet-1"},
                "transaction": null,
                "contract": {"address": "mocknet1xyz", "code_hash": "abcd"},
                "contract_key": null,
                "contract_code_hash": "abcd",
            })
        );
    }

    #[test]
    fn test_info_document() {
        let info = MessageInfo::new("mocknet1sender", &[Coin::new(100, "uscrt")]);
        assert_eq!(
            serde_json::to_value(&info).unwrap(),
            json!({
                "sender": "mocknet1sender",
                "funds": [{"denom": "uscrt", "amount": "100"}],
                "sent_funds": [{"denom": "uscrt", "amount": "100"}],
            })
        );
    }
}
