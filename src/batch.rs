/*
    Copyright © 2023, Mocknet Runtime Contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! batch submits an ordered list of instantiate and execute messages as one simulated transaction.
//!
//! Messages run one at a time in list order, so a message observes everything the messages before it wrote. The
//! first failing message aborts the batch; messages that ran before it are not rolled back.
//!
//! An exec message may target the contract created by an init message earlier in the same batch
//! ([BatchTarget::Instantiated]), whose address is only known once the batch runs.

use serde::Deserialize;
use serde_json::Value;

use crate::{
    backend::{Backend, CodeId},
    types::{Coin, ContractLink, Instantiate, Instantiated},
    MocknetError,
};

/// A message of a [Batch].
#[derive(Debug, Clone, PartialEq)]
pub enum BatchMessage {
    Init {
        sender: String,
        instantiate: Instantiate,
    },
    Exec {
        sender: String,
        contract: BatchTarget,
        msg: Value,
        funds: Vec<Coin>,
    },
    /// An init or exec message whose fields could not be read. Submitting it aborts the batch.
    Malformed {
        operation: String,
        message: Value,
        reason: String,
    },
    /// A message that is neither init nor exec, kept so that submitting can report it.
    Unknown(Value),
}

/// The contract an exec message of a batch is sent to.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchTarget {
    Contract(ContractLink),
    /// The contract instantiated by the init message at this index of the same batch.
    Instantiated(usize),
}

impl BatchMessage {
    /// Reads a message of the form `{"init": {...}}` or `{"exec": {...}}`. A message with neither key is
    /// [BatchMessage::Unknown]; one whose fields cannot be read is [BatchMessage::Malformed].
    pub fn from_json(message: Value) -> Self {
        let (operation, parsed) = if let Some(body) = message.get("init") {
            ("init", serde_json::from_value::<InitMessage>(body.clone()).map(InitMessage::into_message))
        } else if let Some(body) = message.get("exec") {
            ("exec", serde_json::from_value::<ExecMessage>(body.clone()).map(ExecMessage::into_message))
        } else {
            return BatchMessage::Unknown(message);
        };
        parsed.unwrap_or_else(|e| BatchMessage::Malformed {
            operation: operation.to_string(),
            message,
            reason: e.to_string(),
        })
    }
}

/// Outcome of one message of a submitted batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchResult {
    Instantiated(Instantiated),
    Executed(Value),
}

/// Batch collects messages to be run against a [Backend] by [Batch::submit].
pub struct Batch {
    backend: Backend,
    messages: Vec<BatchMessage>,
}

impl Batch {
    pub(crate) fn new(backend: Backend) -> Self {
        Self {
            backend,
            messages: Vec::new(),
        }
    }

    pub fn init(&mut self, sender: &str, instantiate: Instantiate) -> &mut Self {
        self.push(BatchMessage::Init {
            sender: sender.to_string(),
            instantiate,
        })
    }

    pub fn exec(&mut self, sender: &str, contract: impl Into<ContractLink>, msg: Value, funds: Vec<Coin>) -> &mut Self {
        self.push(BatchMessage::Exec {
            sender: sender.to_string(),
            contract: BatchTarget::Contract(contract.into()),
            msg,
            funds,
        })
    }

    /// Appends an exec message to the contract that the init message at `init_index` of this batch creates.
    pub fn exec_instantiated(&mut self, sender: &str, init_index: usize, msg: Value, funds: Vec<Coin>) -> &mut Self {
        self.push(BatchMessage::Exec {
            sender: sender.to_string(),
            contract: BatchTarget::Instantiated(init_index),
            msg,
            funds,
        })
    }

    pub fn push(&mut self, message: BatchMessage) -> &mut Self {
        self.messages.push(message);
        self
    }

    pub fn push_json(&mut self, message: Value) -> &mut Self {
        self.push(BatchMessage::from_json(message))
    }

    pub fn messages(&self) -> &[BatchMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Runs the messages in order. Returns one entry per message, `None` for unknown messages that were skipped.
    ///
    /// A failing or malformed message aborts the batch with [MocknetError::BatchAborted], and an exec message
    /// targeting anything but an earlier init message with [MocknetError::InvalidBatchTarget]. With
    /// [strict_batches](crate::MocknetConfig::strict_batches), an unknown message aborts it with
    /// [MocknetError::UnknownBatchMessage].
    pub fn submit(self) -> Result<Vec<Option<BatchResult>>, MocknetError> {
        tracing::info!(messages = self.messages.len(), "submitting batch");
        let strict = self.backend.config().strict_batches;
        let mut results: Vec<Option<BatchResult>> = Vec::with_capacity(self.messages.len());

        for (index, message) in self.messages.into_iter().enumerate() {
            let aborted = |source: MocknetError| MocknetError::BatchAborted {
                index,
                source: Box::new(source),
            };
            let result = match message {
                BatchMessage::Init { sender, instantiate } => {
                    let instantiated = self.backend.instantiate(&sender, instantiate).map_err(aborted)?;
                    Some(BatchResult::Instantiated(instantiated))
                }
                BatchMessage::Exec {
                    sender,
                    contract,
                    msg,
                    funds,
                } => {
                    let contract = match contract {
                        BatchTarget::Contract(link) => link,
                        BatchTarget::Instantiated(target) => match results.get(target) {
                            Some(Some(BatchResult::Instantiated(instantiated))) => ContractLink::from(instantiated),
                            _ => return Err(MocknetError::InvalidBatchTarget { index, target }),
                        },
                    };
                    let response = self
                        .backend
                        .execute(&sender, contract, &msg, &funds)
                        .map_err(aborted)?;
                    Some(BatchResult::Executed(response))
                }
                BatchMessage::Malformed {
                    operation,
                    message,
                    reason,
                } => {
                    let sender = message
                        .get(operation.as_str())
                        .and_then(|body| body.get("sender"))
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    return Err(aborted(MocknetError::MalformedPayload {
                        address: sender.to_string(),
                        operation,
                        reason,
                    }));
                }
                BatchMessage::Unknown(message) => {
                    if strict {
                        return Err(MocknetError::UnknownBatchMessage { index });
                    }
                    tracing::warn!(index, %message, "found unknown message in batch, ignoring");
                    None
                }
            };
            results.push(result);
        }
        Ok(results)
    }

    /// Batches cannot be exported for signing on the mocknet.
    pub fn save(&self, name: &str) -> Result<(), MocknetError> {
        tracing::warn!(name, "cannot save a mocknet batch");
        Err(MocknetError::BatchSaveUnsupported)
    }
}

#[derive(Deserialize)]
struct InitMessage {
    sender: String,
    #[serde(alias = "codeId")]
    code_id: CodeId,
    #[serde(default, alias = "codeHash")]
    code_hash: Option<String>,
    #[serde(default)]
    label: String,
    #[serde(default, alias = "initMsg")]
    msg: Value,
    #[serde(default)]
    funds: Vec<Coin>,
}

impl InitMessage {
    fn into_message(self) -> BatchMessage {
        let mut instantiate = Instantiate::new(self.code_id.to_string(), self.label, self.msg).with_funds(self.funds);
        instantiate.code_hash = self.code_hash;
        BatchMessage::Init {
            sender: self.sender,
            instantiate,
        }
    }
}

#[derive(Deserialize)]
struct ExecMessage {
    sender: String,
    #[serde(alias = "address")]
    contract: JsonTarget,
    #[serde(default, alias = "codeHash")]
    code_hash: Option<String>,
    #[serde(default)]
    msg: Value,
    #[serde(default, alias = "send")]
    funds: Vec<Coin>,
}

impl ExecMessage {
    fn into_message(self) -> BatchMessage {
        let contract = match self.contract {
            JsonTarget::Address(address) => BatchTarget::Contract(ContractLink {
                address,
                code_hash: self.code_hash,
            }),
            JsonTarget::Instantiated { instantiated } => BatchTarget::Instantiated(instantiated),
        };
        BatchMessage::Exec {
            sender: self.sender,
            contract,
            msg: self.msg,
            funds: self.funds,
        }
    }
}

/// `"mocknet1..."`, or `{"instantiated": <index of an init message>}`
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonTarget {
    Address(String),
    Instantiated { instantiated: usize },
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::MocknetConfig;

    #[test]
    fn test_messages_from_json() {
        let init = BatchMessage::from_json(json!({"init": {
            "sender": "mocknet1sender", "codeId": 1, "codeHash": "ab", "label": "a", "msg": {"count": 0}
        }}));
        assert_eq!(
            init,
            BatchMessage::Init {
                sender: "mocknet1sender".to_string(),
                instantiate: Instantiate::new("1", "a", json!({"count": 0})).with_code_hash("ab"),
            }
        );

        let exec = BatchMessage::from_json(json!({"exec": {
            "sender": "mocknet1sender", "contract": "mocknet1contract", "msg": {"increment": {}},
            "send": [{"denom": "uscrt", "amount": "5"}]
        }}));
        assert_eq!(
            exec,
            BatchMessage::Exec {
                sender: "mocknet1sender".to_string(),
                contract: BatchTarget::Contract(ContractLink::from("mocknet1contract")),
                msg: json!({"increment": {}}),
                funds: vec![Coin::new(5, "uscrt")],
            }
        );

        let unknown = json!({"migrate": {"contract": "mocknet1contract"}});
        assert_eq!(BatchMessage::from_json(unknown.clone()), BatchMessage::Unknown(unknown));
    }

    #[test]
    fn test_tagged_messages_are_never_unknown() {
        let unlabeled = BatchMessage::from_json(json!({"init": {"sender": "mocknet1sender", "code_id": "1", "msg": {}}}));
        assert!(matches!(
            unlabeled,
            BatchMessage::Init { instantiate, .. } if instantiate.label.is_empty()
        ));

        let no_sender = BatchMessage::from_json(json!({"init": {"code_id": "1", "label": "a"}}));
        assert!(matches!(no_sender, BatchMessage::Malformed { operation, .. } if operation == "init"));

        let bad_funds = BatchMessage::from_json(json!({"exec": {"sender": "mocknet1sender", "contract": "x", "funds": 5}}));
        assert!(matches!(bad_funds, BatchMessage::Malformed { operation, .. } if operation == "exec"));

        let chained = BatchMessage::from_json(json!({"exec": {"sender": "mocknet1sender", "contract": {"instantiated": 0}}}));
        assert!(matches!(
            chained,
            BatchMessage::Exec { contract: BatchTarget::Instantiated(0), .. }
        ));
    }

    #[test]
    fn test_malformed_message_aborts_batch() {
        let mut batch = Backend::default().batch();
        batch
            .push_json(json!({"bogus": 1}))
            .push_json(json!({"init": {"sender": "mocknet1sender", "label": "no code id"}}));
        match batch.submit() {
            Err(MocknetError::BatchAborted { index, source }) => {
                assert_eq!(index, 1);
                assert!(matches!(
                    *source,
                    MocknetError::MalformedPayload { address, operation, .. }
                        if address == "mocknet1sender" && operation == "init"
                ));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_invalid_batch_targets() {
        let mut batch = Backend::default().batch();
        batch.exec_instantiated("mocknet1sender", 0, json!({}), vec![]);
        assert_eq!(batch.submit(), Err(MocknetError::InvalidBatchTarget { index: 0, target: 0 }));

        let mut batch = Backend::default().batch();
        batch
            .push_json(json!({"bogus": 1}))
            .exec_instantiated("mocknet1sender", 0, json!({}), vec![]);
        assert_eq!(batch.submit(), Err(MocknetError::InvalidBatchTarget { index: 1, target: 0 }));
    }

    #[test]
    fn test_unknown_messages() {
        let mut batch = Backend::default().batch();
        batch.push_json(json!({"bogus": 1})).push_json(json!(null));
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.submit().unwrap(), vec![None, None]);

        let mut strict = Backend::new(MocknetConfig::strict()).batch();
        strict.push_json(json!({"bogus": 1}));
        assert_eq!(strict.submit(), Err(MocknetError::UnknownBatchMessage { index: 0 }));
    }

    #[test]
    fn test_failure_aborts_batch() {
        let mut batch = Backend::default().batch();
        batch
            .push_json(json!({"bogus": 1}))
            .exec("mocknet1sender", "mocknet1nobody", json!({}), vec![])
            .push_json(json!({"bogus": 2}));
        match batch.submit() {
            Err(MocknetError::BatchAborted { index, source }) => {
                assert_eq!(index, 1);
                assert!(matches!(*source, MocknetError::UnknownContract { .. }));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_save_is_unsupported() {
        let batch = Backend::default().batch();
        assert_eq!(batch.save("deploy"), Err(MocknetError::BatchSaveUnsupported));
    }
}
