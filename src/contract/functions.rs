/*
    Copyright © 2023, Mocknet Runtime Contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Implementation of the host functions of [HostImports] against the storage of the calling contract and the backend
//! it is registered in.

use std::sync::Weak;

use serde::Deserialize;
use serde_json::json;

use crate::{
    contract::{wasmer::env::Env, wasmer::memory::MemoryContext, HostImports},
    encoding, MocknetError,
};

/// [MocknetHostFunctions] implements trait [HostImports].
pub(crate) struct MocknetHostFunctions {}

impl HostImports<Env> for MocknetHostFunctions {
    fn db_read(env: &Env, key_ptr: u32) -> Result<u32, MocknetError> {
        let key = env.read_region(key_ptr)?;
        // released before write_region calls into the guest
        let value = env.storage.lock().get(&key).cloned();
        tracing::trace!(contract = %env.address, key = %String::from_utf8_lossy(&key), found = value.is_some(), "db_read");
        match value {
            Some(value) => env.write_region(&value),
            None => Ok(0),
        }
    }

    fn db_write(env: &Env, key_ptr: u32, value_ptr: u32) -> Result<(), MocknetError> {
        env.ensure_writable("db_write")?;
        let key = env.read_region(key_ptr)?;
        let value = env.read_region(value_ptr)?;
        tracing::trace!(contract = %env.address, key = %String::from_utf8_lossy(&key), len = value.len(), "db_write");
        env.storage.lock().insert(key, value);
        Ok(())
    }

    fn db_remove(env: &Env, key_ptr: u32) -> Result<(), MocknetError> {
        env.ensure_writable("db_remove")?;
        let key = env.read_region(key_ptr)?;
        tracing::trace!(contract = %env.address, key = %String::from_utf8_lossy(&key), "db_remove");
        env.storage.lock().remove(&key);
        Ok(())
    }

    fn addr_validate(env: &Env, _: u32) -> Result<u32, MocknetError> {
        stub(env, "addr_validate")?;
        Ok(0)
    }

    fn addr_canonicalize(env: &Env, source_ptr: u32, destination_ptr: u32) -> Result<u32, MocknetError> {
        let human = env.read_utf8(source_ptr, "addr_canonicalize")?;
        match encoding::canonicalize(&human) {
            Ok(canonical) => {
                env.write_to_region(destination_ptr, &canonical)?;
                Ok(0)
            }
            Err(e) => env.write_region(e.to_string().as_bytes()),
        }
    }

    fn addr_humanize(env: &Env, source_ptr: u32, destination_ptr: u32) -> Result<u32, MocknetError> {
        let canonical = env.read_region(source_ptr)?;
        match encoding::humanize(&env.config.address_prefix, &canonical) {
            Ok(human) => {
                env.write_to_region(destination_ptr, human.as_bytes())?;
                Ok(0)
            }
            Err(e) => env.write_region(e.to_string().as_bytes()),
        }
    }

    fn secp256k1_verify(env: &Env, _: u32, _: u32, _: u32) -> Result<u32, MocknetError> {
        stub(env, "secp256k1_verify")?;
        Ok(0)
    }

    fn secp256k1_recover_pubkey(env: &Env, _: u32, _: u32, _: u32) -> Result<u64, MocknetError> {
        stub(env, "secp256k1_recover_pubkey")?;
        Ok(0)
    }

    fn secp256k1_sign(env: &Env, _: u32, _: u32) -> Result<u64, MocknetError> {
        stub(env, "secp256k1_sign")?;
        Ok(0)
    }

    fn ed25519_verify(env: &Env, _: u32, _: u32, _: u32) -> Result<u32, MocknetError> {
        stub(env, "ed25519_verify")?;
        Ok(0)
    }

    fn ed25519_batch_verify(env: &Env, _: u32, _: u32, _: u32) -> Result<u32, MocknetError> {
        stub(env, "ed25519_batch_verify")?;
        Ok(0)
    }

    fn ed25519_sign(env: &Env, _: u32, _: u32) -> Result<u64, MocknetError> {
        stub(env, "ed25519_sign")?;
        Ok(0)
    }

    fn debug(env: &Env, source_ptr: u32) -> Result<(), MocknetError> {
        let message = env.read_region(source_ptr)?;
        tracing::warn!(contract = %env.address, message = %String::from_utf8_lossy(&message), "debug");
        Ok(())
    }

    fn query_chain(env: &Env, request_ptr: u32) -> Result<u32, MocknetError> {
        let request = env.read_region(request_ptr)?;
        let malformed = || MocknetError::MalformedQuery {
            address: env.address.clone(),
            request: String::from_utf8_lossy(&request).into_owned(),
        };

        let QueryRequest {
            wasm: WasmQuery::Smart {
                contract_addr,
                callback_code_hash,
                msg,
            },
        } = serde_json::from_slice(&request).map_err(|_| malformed())?;
        let msg = encoding::b64_to_bytes(&msg).map_err(|_| malformed())?;

        let registry = env
            .backend
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or_else(|| MocknetError::IsolatedQuery {
                address: env.address.clone(),
                request: String::from_utf8_lossy(&request).into_owned(),
            })?;

        let binary = registry.query_chain(&env.address, &contract_addr, &callback_code_hash, &msg)?;
        env.write_json(&json!({ "Ok": { "Ok": binary } }), "query_chain")
    }

    fn abort(env: &Env, message_ptr: u32) -> Result<(), MocknetError> {
        let message = env.read_region(message_ptr)?;
        Err(MocknetError::GuestTrap {
            address: env.address.clone(),
            operation: "abort".to_string(),
            message: String::from_utf8_lossy(&message).into_owned(),
        })
    }

    fn gas_evaporate(_: &Env, _: u32) -> Result<u32, MocknetError> {
        Ok(0)
    }

    fn check_gas(_: &Env) -> Result<u64, MocknetError> {
        Ok(0)
    }
}

/// Host functions the mocknet does not implement succeed with a warning, or fail when stubs are strict.
fn stub(env: &Env, function: &str) -> Result<(), MocknetError> {
    if env.config.strict_host_stubs {
        return Err(MocknetError::NotImplementedHostCall {
            function: function.to_string(),
        });
    }
    tracing::warn!(contract = %env.address, function, "host function is not implemented in the mocknet, returning 0");
    Ok(())
}

/// The only kind of query request that the mocknet routes.
#[derive(Deserialize)]
struct QueryRequest {
    wasm: WasmQuery,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum WasmQuery {
    Smart {
        contract_addr: String,
        #[serde(default, alias = "code_hash")]
        callback_code_hash: String,
        msg: String,
    },
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_smart_query() {
        let request = br#"{"wasm":{"smart":{"contract_addr":"mocknet1a","code_hash":"ab","msg":"e30="}}}"#;
        let QueryRequest {
            wasm: WasmQuery::Smart {
                contract_addr,
                callback_code_hash,
                msg,
            },
        } = serde_json::from_slice(request).unwrap();
        assert_eq!(contract_addr, "mocknet1a");
        assert_eq!(callback_code_hash, "ab");
        assert_eq!(msg, "e30=");
    }

    #[test]
    fn test_reject_other_queries() {
        for request in [
            r#"{"bank":{"balance":{"address":"a","denom":"b"}}}"#.as_bytes(),
            r#"{"wasm":{"raw":{"contract_addr":"a","key":"b"}}}"#.as_bytes(),
            r#"{"wasm":{"smart":{"contract_addr":"a"}}}"#.as_bytes(),
            "not json".as_bytes(),
        ] {
            assert!(serde_json::from_slice::<QueryRequest>(request).is_err());
        }
    }
}
