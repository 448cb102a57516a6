/*
    Copyright © 2023, Mocknet Runtime Contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Defines [ContractHost], one instantiated contract together with its private storage.
//!
//! A host is created `Loaded` (compiled, linked and instantiated) and becomes `Ready` once `init` has run. Every
//! entry point takes JSON documents, copies them into guest memory as Regions, and parses the JSON document that the
//! guest returns. The returned document is the contract's raw result envelope; see [crate::encoding::parse_result].

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::{
    backend::Registry,
    contract::{
        wasmer::{
            env::{Env, ReadOnlyGuard, Storage},
            instance::{GuestExports, Instance},
            memory::MemoryContext,
            store,
        },
        ContractModule,
    },
    encoding,
    types::{ContractEnv, MessageInfo},
    MocknetConfig, MocknetError,
};

/// ContractHost is a loaded contract instance that can be called through its entry points.
pub struct ContractHost {
    address: String,
    code_id: String,
    code_hash: String,
    label: String,
    instance: Instance,
    exports: GuestExports,
    storage: Arc<Mutex<Storage>>,
    read_only: Arc<AtomicU32>,
    initialized: AtomicBool,
    query_arity: usize,
}

/// Identity of a contract being loaded.
pub(crate) struct HostIdentity {
    pub address: String,
    pub code_id: String,
    pub code_hash: String,
    pub label: String,
}

impl ContractHost {
    pub(crate) fn load(
        module: &ContractModule,
        identity: HostIdentity,
        backend: Option<Weak<Registry>>,
        config: MocknetConfig,
    ) -> Result<Self, MocknetError> {
        let storage = Arc::new(Mutex::new(Storage::new()));
        let read_only = Arc::new(AtomicU32::new(0));
        let environment = Env::new(
            identity.address.clone(),
            storage.clone(),
            read_only.clone(),
            backend,
            config,
        );

        let instance = module.instantiate(&environment)?;
        let exports = GuestExports::from_instance(&instance.0, &identity.address)?;
        let query_arity = instance
            .arity("query")
            .ok_or_else(|| MocknetError::MissingExport("query".to_string()))?;

        tracing::debug!(address = %identity.address, code_id = %identity.code_id, label = %identity.label, "contract loaded");

        Ok(Self {
            address: identity.address,
            code_id: identity.code_id,
            code_hash: identity.code_hash,
            label: identity.label,
            instance,
            exports,
            storage,
            read_only,
            initialized: AtomicBool::new(false),
            query_arity,
        })
    }

    /// Loads contract code outside of any backend. The contract runs normally, except that `query_chain` fails with
    /// [MocknetError::IsolatedQuery].
    pub fn isolated(code: &[u8], config: MocknetConfig) -> Result<Self, MocknetError> {
        let store = store::instantiate_store();
        let module = ContractModule::from_contract_code(code, &store)?;
        let identity = HostIdentity {
            address: encoding::random_address(&config.address_prefix)?,
            code_id: "0".to_string(),
            code_hash: encoding::code_hash_for_blob(code),
            label: String::new(),
        };
        Self::load(&module, identity, None, config)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn code_id(&self) -> &str {
        &self.code_id
    }

    pub fn code_hash(&self) -> &str {
        &self.code_hash
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// A copy of the contract's storage.
    pub fn storage_snapshot(&self) -> Storage {
        self.storage.lock().clone()
    }

    /// Calls the `instantiate` entry point. Runs at most once per contract.
    pub fn init(&self, env: &ContractEnv, info: &MessageInfo, msg: &Value) -> Result<Value, MocknetError> {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(MocknetError::AlreadyInitialized {
                address: self.address.clone(),
            });
        }
        let args = [
            self.to_json(env, "instantiate")?,
            self.to_json(info, "instantiate")?,
            self.to_json(msg, "instantiate")?,
        ];
        self.call_entry_point("instantiate", &args)
    }

    /// Calls the `execute` entry point.
    pub fn execute(&self, env: &ContractEnv, info: &MessageInfo, msg: &Value) -> Result<Value, MocknetError> {
        let args = [
            self.to_json(env, "execute")?,
            self.to_json(info, "execute")?,
            self.to_json(msg, "execute")?,
        ];
        self.call_entry_point("execute", &args)
    }

    /// Calls the `query` entry point. Storage is read-only for the duration of the call.
    pub fn query(&self, env: &ContractEnv, msg: &Value) -> Result<Value, MocknetError> {
        let msg = self.to_json(msg, "query")?;
        self.query_bytes(env, &msg)
    }

    /// Calls the `query` entry point with a message that is already serialized.
    pub(crate) fn query_bytes(&self, env: &ContractEnv, msg: &[u8]) -> Result<Value, MocknetError> {
        let _read_only = ReadOnlyGuard::acquire(&self.read_only);
        if self.query_arity == 1 {
            self.call_entry_point("query", &[msg.to_vec()])
        } else {
            let env = self.to_json(env, "query")?;
            self.call_entry_point("query", &[env, msg.to_vec()])
        }
    }

    fn call_entry_point(&self, operation: &str, args: &[Vec<u8>]) -> Result<Value, MocknetError> {
        tracing::debug!(contract = %self.address, operation, "calling entry point");

        let mut pointers = Vec::with_capacity(args.len());
        for arg in args {
            pointers.push(self.exports.write_region(arg)?);
        }

        let result_ptr = self
            .instance
            .call_method(operation, &pointers)
            .map_err(|e| MocknetError::from_call(e, &self.address, operation))
            .map_err(|e| {
                match &e {
                    MocknetError::GuestTrap { message, .. } => {
                        tracing::error!(contract = %self.address, operation, message = %message, "contract trapped")
                    }
                    e => tracing::error!(contract = %self.address, operation, error = %e, "entry point failed"),
                }
                e
            })?;

        let response = self.exports.read_region(result_ptr)?;
        serde_json::from_slice(&response).map_err(|e| MocknetError::MalformedPayload {
            address: self.address.clone(),
            operation: operation.to_string(),
            reason: e.to_string(),
        })
    }

    fn to_json<T: Serialize>(&self, value: &T, operation: &str) -> Result<Vec<u8>, MocknetError> {
        serde_json::to_vec(value).map_err(|e| MocknetError::MalformedPayload {
            address: self.address.clone(),
            operation: operation.to_string(),
            reason: e.to_string(),
        })
    }
}

impl std::fmt::Debug for ContractHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractHost")
            .field("address", &self.address)
            .field("code_id", &self.code_id)
            .field("code_hash", &self.code_hash)
            .field("label", &self.label)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
