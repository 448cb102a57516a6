/*
    Copyright © 2023, Mocknet Runtime Contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! backend is the registry of uploaded code and instantiated contracts, and the entry point for calling them.
//!
//! ```text
//! upload(code) -> code id        instantiate(code id) -> address        execute / query(address)
//! ```
//!
//! Every contract is a [ContractHost] holding a weak handle back to the registry, through which its `query_chain` host
//! function reaches other contracts. The registry itself is only changed by `upload` and `instantiate`; locks on it
//! are never held while contract code runs.

use std::collections::{hash_map::Entry, BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    batch::Batch,
    contract::{
        wasmer::{env::Storage, store},
        ContractHost, ContractModule, HostIdentity,
    },
    encoding,
    types::{BlockInfo, Coin, ContractEnv, ContractLink, Instantiate, Instantiated, MessageInfo, Uploaded},
    MocknetConfig, MocknetError,
};

/// Backend is a handle to an in-process mock chain. Clones share the same chain.
#[derive(Clone)]
pub struct Backend {
    inner: Arc<Registry>,
}

impl Default for Backend {
    fn default() -> Self {
        Self::new(MocknetConfig::default())
    }
}

impl Backend {
    pub fn new(config: MocknetConfig) -> Self {
        Self {
            inner: Registry::new(config),
        }
    }

    pub fn config(&self) -> &MocknetConfig {
        &self.inner.config
    }

    /// Stores contract code under the next code id. Compilation is deferred to the first instantiation.
    pub fn upload(&self, code: &[u8]) -> Uploaded {
        self.inner.upload(code)
    }

    /// Creates a contract from uploaded code and calls its `instantiate` entry point.
    pub fn instantiate(&self, sender: &str, instantiate: Instantiate) -> Result<Instantiated, MocknetError> {
        self.inner.instantiate(sender, instantiate)
    }

    /// Calls the `execute` entry point of a contract and returns its response, with `data` decoded.
    pub fn execute(
        &self,
        sender: &str,
        contract: impl Into<ContractLink>,
        msg: &Value,
        funds: &[Coin],
    ) -> Result<Value, MocknetError> {
        self.inner.execute(sender, &contract.into(), msg, funds)
    }

    /// Calls the `query` entry point of a contract and returns the JSON document it answered with.
    pub fn query(&self, contract: impl Into<ContractLink>, msg: &Value) -> Result<Value, MocknetError> {
        self.inner.query(&contract.into(), msg)
    }

    /// Starts a batch of messages to be submitted together.
    pub fn batch(&self) -> Batch {
        Batch::new(self.clone())
    }

    pub fn get_instance(&self, address: &str) -> Option<Arc<ContractHost>> {
        self.inner.get_instance(address)
    }

    pub fn code(&self, code_id: &str) -> Option<Arc<CodeEntry>> {
        self.inner.code(code_id)
    }

    pub fn code_id_of(&self, address: &str) -> Option<String> {
        self.get_instance(address).map(|host| host.code_id().to_string())
    }

    pub fn code_hash_of(&self, address: &str) -> Option<String> {
        self.get_instance(address).map(|host| host.code_hash().to_string())
    }

    pub fn label_of(&self, address: &str) -> Option<String> {
        self.get_instance(address).map(|host| host.label().to_string())
    }

    pub fn storage_snapshot(&self, address: &str) -> Option<Storage> {
        self.get_instance(address).map(|host| host.storage_snapshot())
    }

    /// Addresses of all contracts, in no particular order.
    pub fn contracts(&self) -> Vec<String> {
        self.inner.contracts.read().keys().cloned().collect()
    }

    /// The current mock block.
    pub fn block(&self) -> BlockInfo {
        self.inner.block()
    }
}

/// Uploaded contract code.
pub struct CodeEntry {
    code_id: String,
    code_hash: String,
    code: Vec<u8>,
    module: Mutex<Option<ContractModule>>,
}

impl CodeEntry {
    pub fn code_id(&self) -> &str {
        &self.code_id
    }

    pub fn code_hash(&self) -> &str {
        &self.code_hash
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// the compiled module, compiling it on first use
    fn module(&self, store: &wasmer::Store) -> Result<ContractModule, MocknetError> {
        let mut module = self.module.lock();
        if let Some(module) = module.as_ref() {
            return Ok(module.clone());
        }
        let compiled = ContractModule::from_contract_code(&self.code, store)?;
        *module = Some(compiled.clone());
        Ok(compiled)
    }
}

/// Registry holds the state of a mock chain.
pub(crate) struct Registry {
    config: MocknetConfig,
    store: wasmer::Store,
    codes: RwLock<BTreeMap<u64, Arc<CodeEntry>>>,
    contracts: RwLock<HashMap<String, Arc<ContractHost>>>,
    height: Mutex<u64>,
    query_depth: AtomicU32,
    message_depth: AtomicU32,
    self_ref: Weak<Registry>,
}

impl Registry {
    fn new(config: MocknetConfig) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Registry {
            height: Mutex::new(config.genesis_height),
            config,
            store: store::instantiate_store(),
            codes: RwLock::new(BTreeMap::new()),
            contracts: RwLock::new(HashMap::new()),
            query_depth: AtomicU32::new(0),
            message_depth: AtomicU32::new(0),
            self_ref: self_ref.clone(),
        })
    }

    fn upload(&self, code: &[u8]) -> Uploaded {
        let mut codes = self.codes.write();
        let id = codes.keys().next_back().map_or(1, |last| last + 1);
        let entry = CodeEntry {
            code_id: id.to_string(),
            code_hash: encoding::code_hash_for_blob(code),
            code: code.to_vec(),
            module: Mutex::new(None),
        };
        tracing::info!(code_id = %entry.code_id, code_hash = %entry.code_hash, size = code.len(), "code uploaded");
        let uploaded = Uploaded {
            code_id: entry.code_id.clone(),
            code_hash: entry.code_hash.clone(),
        };
        codes.insert(id, Arc::new(entry));
        uploaded
    }

    fn code(&self, code_id: &str) -> Option<Arc<CodeEntry>> {
        let id = code_id.parse::<u64>().ok()?;
        self.codes.read().get(&id).cloned()
    }

    fn get_instance(&self, address: &str) -> Option<Arc<ContractHost>> {
        self.contracts.read().get(address).cloned()
    }

    fn block(&self) -> BlockInfo {
        self.block_at(*self.height.lock())
    }

    /// advances the mock chain by one block
    fn next_block(&self) -> BlockInfo {
        let mut height = self.height.lock();
        *height += 1;
        self.block_at(*height)
    }

    fn block_at(&self, height: u64) -> BlockInfo {
        let elapsed = height.saturating_sub(self.config.genesis_height) * self.config.block_time_secs;
        BlockInfo::new(height, self.config.genesis_time_secs + elapsed, &self.config.chain_id)
    }

    fn instantiate(&self, sender: &str, instantiate: Instantiate) -> Result<Instantiated, MocknetError> {
        let code = self.code(&instantiate.code_id).ok_or_else(|| MocknetError::UnknownCode {
            code_id: instantiate.code_id.clone(),
        })?;
        match &instantiate.code_hash {
            Some(expected) if !expected.is_empty() && *expected != code.code_hash => {
                return Err(MocknetError::CodeHashMismatch {
                    code_id: code.code_id.clone(),
                    expected: expected.clone(),
                    actual: code.code_hash.clone(),
                })
            }
            _ => {}
        }
        self.check_label(&self.contracts.read(), &instantiate.label)?;

        let module = code.module(&self.store)?;
        let host = loop {
            let address = encoding::random_address(&self.config.address_prefix)?;
            if self.contracts.read().contains_key(&address) {
                continue;
            }
            let host = Arc::new(ContractHost::load(
                &module,
                HostIdentity {
                    address: address.clone(),
                    code_id: code.code_id.clone(),
                    code_hash: code.code_hash.clone(),
                    label: instantiate.label.clone(),
                },
                Some(self.self_ref.clone()),
                self.config.clone(),
            )?);

            let mut contracts = self.contracts.write();
            self.check_label(&contracts, &instantiate.label)?;
            match contracts.entry(address) {
                Entry::Vacant(vacant) => {
                    vacant.insert(host.clone());
                    break host;
                }
                Entry::Occupied(occupied) => {
                    tracing::debug!(address = %occupied.key(), "address collision, generating another");
                }
            }
        };

        let address = host.address().to_string();
        let env = ContractEnv::new(self.next_block(), &address, host.code_hash());
        let info = MessageInfo::new(sender, &instantiate.funds);
        let response = host
            .init(&env, &info, &instantiate.init_msg)
            .and_then(|result| encoding::parse_result(result, "instantiate", &address));
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                self.contracts.write().remove(&address);
                return Err(e);
            }
        };
        tracing::info!(%address, code_id = %code.code_id, label = %instantiate.label, "contract instantiated");

        self.dispatch_messages(&address, &response)?;

        Ok(Instantiated {
            address,
            code_id: code.code_id.clone(),
            code_hash: code.code_hash.clone(),
            label: instantiate.label,
        })
    }

    /// Labels are unique among contracts, except the empty label.
    fn check_label(&self, contracts: &HashMap<String, Arc<ContractHost>>, label: &str) -> Result<(), MocknetError> {
        if label.is_empty() {
            return Ok(());
        }
        match contracts.values().find(|host| host.label() == label) {
            Some(host) => Err(MocknetError::LabelTaken {
                label: label.to_string(),
                address: host.address().to_string(),
            }),
            None => Ok(()),
        }
    }

    /// looks up a contract, checking its code hash when one is given
    fn resolve(&self, target: &str, code_hash: Option<&str>, caller: Option<&str>) -> Result<Arc<ContractHost>, MocknetError> {
        let host = self.get_instance(target).ok_or_else(|| MocknetError::UnknownContract {
            target: target.to_string(),
            caller: caller.map(str::to_string),
        })?;
        match code_hash {
            Some(expected) if !expected.is_empty() && expected != host.code_hash() => Err(MocknetError::CodeHashMismatch {
                code_id: host.code_id().to_string(),
                expected: expected.to_string(),
                actual: host.code_hash().to_string(),
            }),
            _ => Ok(host),
        }
    }

    fn execute(&self, sender: &str, contract: &ContractLink, msg: &Value, funds: &[Coin]) -> Result<Value, MocknetError> {
        let host = self.resolve(&contract.address, contract.code_hash.as_deref(), None)?;
        let env = ContractEnv::new(self.next_block(), host.address(), host.code_hash());
        let info = MessageInfo::new(sender, funds);

        let result = host.execute(&env, &info, msg)?;
        let mut response = encoding::parse_result(result, "execute", host.address())?;
        self.dispatch_messages(host.address(), &response)?;

        if let Some(Value::String(b64)) = response.get("data") {
            let data = decode_data(b64, host.address())?;
            response["data"] = data;
        }
        Ok(response)
    }

    fn query(&self, contract: &ContractLink, msg: &Value) -> Result<Value, MocknetError> {
        let host = self.resolve(&contract.address, contract.code_hash.as_deref(), None)?;
        let env = ContractEnv::new(self.block(), host.address(), host.code_hash());

        let result = host.query(&env, msg)?;
        let binary = encoding::parse_result(result, "query", host.address())?;
        let Value::String(b64) = binary else {
            return Err(MocknetError::MalformedPayload {
                address: host.address().to_string(),
                operation: "query".to_string(),
                reason: format!("expected a base64 binary, got {binary}"),
            });
        };
        decode_data(&b64, host.address())
    }

    /// Serves `query_chain` of `caller`: queries `target` and returns the binary it answered with, unchanged.
    pub(crate) fn query_chain(&self, caller: &str, target: &str, code_hash: &str, msg: &[u8]) -> Result<Value, MocknetError> {
        let host = self.resolve(target, Some(code_hash), Some(caller))?;

        let depth = DepthGuard::enter(&self.query_depth);
        if depth.depth() > self.config.max_query_depth {
            return Err(MocknetError::QueryDepthExceeded {
                address: caller.to_string(),
                target: target.to_string(),
                limit: self.config.max_query_depth,
            });
        }
        tracing::debug!(%caller, %target, depth = depth.depth(), "query_chain");

        let env = ContractEnv::new(self.block(), host.address(), host.code_hash());
        let result = host.query_bytes(&env, msg)?;
        encoding::parse_result(result, "query", host.address())
    }

    /// Runs the wasm messages of a contract response, with the contract as sender. Replies are not delivered.
    fn dispatch_messages(&self, contract: &str, response: &Value) -> Result<(), MocknetError> {
        let Some(messages) = response.get("messages").and_then(Value::as_array) else {
            return Ok(());
        };
        if messages.is_empty() {
            return Ok(());
        }

        let depth = DepthGuard::enter(&self.message_depth);
        if depth.depth() > self.config.max_message_depth {
            return Err(MocknetError::MessageDepthExceeded {
                address: contract.to_string(),
                limit: self.config.max_message_depth,
            });
        }
        tracing::debug!(%contract, messages = messages.len(), depth = depth.depth(), "dispatching messages");

        for entry in messages {
            // either a SubMsg or a bare CosmosMsg
            let message = entry.get("msg").unwrap_or(entry);
            let CosmosMsg::Wasm(wasm) = match serde_json::from_value::<CosmosMsg>(message.clone()) {
                Ok(msg) => msg,
                Err(_) => {
                    tracing::warn!(%contract, %message, "skipping a message that is not a wasm instantiate or execute");
                    continue;
                }
            };
            match wasm {
                WasmMsg::Instantiate {
                    code_id,
                    callback_code_hash,
                    label,
                    msg,
                    funds,
                } => {
                    let init_msg = decode_msg(&msg, contract)?;
                    let instantiate =
                        Instantiate::new(code_id.to_string(), label, init_msg).with_code_hash(callback_code_hash).with_funds(funds);
                    self.instantiate(contract, instantiate)?;
                }
                WasmMsg::Execute {
                    contract_addr,
                    callback_code_hash,
                    msg,
                    funds,
                } => {
                    let msg = decode_msg(&msg, contract)?;
                    let link = ContractLink {
                        address: contract_addr,
                        code_hash: Some(callback_code_hash),
                    };
                    self.execute(contract, &link, &msg, &funds)?;
                }
            }
        }
        Ok(())
    }
}

/// Decodes a base64 `Binary` returned by a contract: JSON when it parses, text otherwise.
fn decode_data(b64: &str, address: &str) -> Result<Value, MocknetError> {
    let bytes = encoding::b64_to_bytes(b64).map_err(|e| MocknetError::MalformedPayload {
        address: address.to_string(),
        operation: "decode".to_string(),
        reason: e.to_string(),
    })?;
    if let Ok(value) = serde_json::from_slice(&bytes) {
        return Ok(value);
    }
    String::from_utf8(bytes)
        .map(Value::String)
        .map_err(|e| MocknetError::MalformedPayload {
            address: address.to_string(),
            operation: "decode".to_string(),
            reason: e.to_string(),
        })
}

/// Decodes the base64 JSON `msg` of a message sent by a contract.
fn decode_msg(b64: &str, contract: &str) -> Result<Value, MocknetError> {
    let malformed = |reason: String| MocknetError::MalformedPayload {
        address: contract.to_string(),
        operation: "dispatch".to_string(),
        reason,
    };
    let bytes = encoding::b64_to_bytes(b64).map_err(|e| malformed(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| malformed(e.to_string()))
}

/// Counts a level of nested calls until dropped.
struct DepthGuard<'a> {
    counter: &'a AtomicU32,
    depth: u32,
}

impl<'a> DepthGuard<'a> {
    fn enter(counter: &'a AtomicU32) -> Self {
        let depth = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Self { counter, depth }
    }

    fn depth(&self) -> u32 {
        self.depth
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Messages that contracts may return for the mocknet to run.
#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum CosmosMsg {
    Wasm(WasmMsg),
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum WasmMsg {
    Instantiate {
        code_id: CodeId,
        #[serde(default, alias = "code_hash")]
        callback_code_hash: String,
        label: String,
        msg: String,
        #[serde(default, alias = "send")]
        funds: Vec<Coin>,
    },
    Execute {
        contract_addr: String,
        #[serde(default, alias = "code_hash")]
        callback_code_hash: String,
        msg: String,
        #[serde(default, alias = "send")]
        funds: Vec<Coin>,
    },
}

/// Code ids are numbers in CosmWasm and strings in some forks.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum CodeId {
    Number(u64),
    Text(String),
}

impl std::fmt::Display for CodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodeId::Number(id) => write!(f, "{id}"),
            CodeId::Text(id) => f.write_str(id),
        }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_code_ids_are_sequential() {
        let backend = Backend::default();
        let first = backend.upload(b"first");
        let second = backend.upload(b"second");
        let again = backend.upload(b"first");
        assert_eq!(first.code_id, "1");
        assert_eq!(second.code_id, "2");
        assert_eq!(again.code_id, "3");
        assert_eq!(again.code_hash, first.code_hash);
        assert_ne!(second.code_hash, first.code_hash);
        assert_eq!(backend.code("2").unwrap().code(), b"second");
        assert!(backend.code("4").is_none());
        assert!(backend.code("two").is_none());
    }

    #[test]
    fn test_block_clock() {
        let config = MocknetConfig::default();
        let backend = Backend::new(config.clone());
        let genesis = backend.block();
        assert_eq!(genesis.height, config.genesis_height);
        assert_eq!(genesis.chain_id, config.chain_id);

        let next = backend.inner.next_block();
        assert_eq!(next.height, config.genesis_height + 1);
        let expected_secs = u128::from(config.genesis_time_secs + config.block_time_secs);
        assert_eq!(next.time, (expected_secs * 1_000_000_000).to_string());
        assert_eq!(backend.block(), next);
    }

    #[test]
    fn test_unknown_targets() {
        let backend = Backend::default();
        assert!(matches!(
            backend.instantiate("mocknet1sender", Instantiate::new("1", "label", json!({}))),
            Err(MocknetError::UnknownCode { .. })
        ));
        assert!(matches!(
            backend.query("mocknet1nobody", &json!({})),
            Err(MocknetError::UnknownContract { caller: None, .. })
        ));
        assert!(matches!(
            backend.inner.query_chain("mocknet1caller", "mocknet1nobody", "", b"{}"),
            Err(MocknetError::UnknownContract { caller: Some(_), .. })
        ));
    }

    #[test]
    fn test_invalid_code_fails_at_instantiation() {
        let backend = Backend::default();
        let uploaded = backend.upload(b"");
        assert!(matches!(
            backend.instantiate("mocknet1sender", Instantiate::new(uploaded.code_id.clone(), "empty", json!({}))),
            Err(MocknetError::CannotCompile(_))
        ));
        assert!(matches!(
            backend.instantiate(
                "mocknet1sender",
                Instantiate::new(uploaded.code_id, "empty", json!({})).with_code_hash("00")
            ),
            Err(MocknetError::CodeHashMismatch { .. })
        ));
        assert!(backend.contracts().is_empty());
    }

    #[test]
    fn test_depth_guard_unwinds() {
        let counter = AtomicU32::new(0);
        {
            let outer = DepthGuard::enter(&counter);
            let inner = DepthGuard::enter(&counter);
            assert_eq!((outer.depth(), inner.depth()), (1, 2));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_decode_data() {
        assert_eq!(decode_data("eyJhIjoxfQ==", "a").unwrap(), json!({"a": 1}));
        assert_eq!(decode_data(&encoding::utf8_to_b64("plain text"), "a").unwrap(), json!("plain text"));
        assert!(decode_data("%%%", "a").is_err());
    }

    #[test]
    fn test_parse_wasm_messages() {
        let instantiate = json!({"wasm": {"instantiate": {
            "code_id": 3, "callback_code_hash": "ab", "label": "child", "msg": "e30=", "send": []
        }}});
        match serde_json::from_value::<CosmosMsg>(instantiate).unwrap() {
            CosmosMsg::Wasm(WasmMsg::Instantiate { code_id, label, .. }) => {
                assert_eq!(code_id.to_string(), "3");
                assert_eq!(label, "child");
            }
            _ => panic!("expected an instantiate message"),
        }
        let execute = json!({"wasm": {"execute": {"contract_addr": "mocknet1x", "code_hash": "ab", "msg": "e30="}}});
        assert!(matches!(
            serde_json::from_value::<CosmosMsg>(execute).unwrap(),
            CosmosMsg::Wasm(WasmMsg::Execute { funds, .. }) if funds.is_empty()
        ));
        let bank = json!({"bank": {"send": {"to_address": "x", "amount": []}}});
        assert!(serde_json::from_value::<CosmosMsg>(bank).is_err());
    }
}
