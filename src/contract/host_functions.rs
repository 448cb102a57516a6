/*
    Copyright © 2023, Mocknet Runtime Contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definition of host functions that are imported by CosmWasm contracts.
//!
//! The names and signatures are those of the `env` import module of CosmWasm 1.x (with the Secret Network additions),
//! so that unmodified contract binaries link against the mocknet.

use wasmer::{imports, Function, ImportObject, Store};

use crate::MocknetError;

/// HostImports defines the interface of host functions used in [wasmer::WasmerEnv].
/// The Importable resource that is provided to the Wasm module during instantiation needs to expose these functions.
///
/// Every argument named `*_ptr` is a pointer to a Region in guest memory. Functions returning a pointer return a
/// Region that the host allocated through the guest's `allocate`, or 0 for "nothing".
pub trait HostImports<T>
where
    T: wasmer::WasmerEnv,
{
    /// Gets the value corresponding to a key in the contract's storage. Returns 0 if the key is absent.
    fn db_read(env: &T, key_ptr: u32) -> Result<u32, MocknetError>;

    /// Sets a key to a value in the contract's storage.
    fn db_write(env: &T, key_ptr: u32, value_ptr: u32) -> Result<(), MocknetError>;

    /// Removes a key from the contract's storage.
    fn db_remove(env: &T, key_ptr: u32) -> Result<(), MocknetError>;

    fn addr_validate(env: &T, source_ptr: u32) -> Result<u32, MocknetError>;

    /// Decodes the human address in `source_ptr` into canonical bytes written to `destination_ptr`.
    /// Returns 0 on success, or a pointer to a Region holding the error message.
    fn addr_canonicalize(env: &T, source_ptr: u32, destination_ptr: u32) -> Result<u32, MocknetError>;

    /// Encodes the canonical bytes in `source_ptr` into a human address written to `destination_ptr`.
    /// Returns 0 on success, or a pointer to a Region holding the error message.
    fn addr_humanize(env: &T, source_ptr: u32, destination_ptr: u32) -> Result<u32, MocknetError>;

    fn secp256k1_verify(env: &T, hash_ptr: u32, signature_ptr: u32, public_key_ptr: u32) -> Result<u32, MocknetError>;

    fn secp256k1_recover_pubkey(
        env: &T,
        hash_ptr: u32,
        signature_ptr: u32,
        recovery_param: u32,
    ) -> Result<u64, MocknetError>;

    fn secp256k1_sign(env: &T, message_ptr: u32, private_key_ptr: u32) -> Result<u64, MocknetError>;

    fn ed25519_verify(env: &T, message_ptr: u32, signature_ptr: u32, public_key_ptr: u32) -> Result<u32, MocknetError>;

    fn ed25519_batch_verify(
        env: &T,
        messages_ptr: u32,
        signatures_ptr: u32,
        public_keys_ptr: u32,
    ) -> Result<u32, MocknetError>;

    fn ed25519_sign(env: &T, message_ptr: u32, private_key_ptr: u32) -> Result<u64, MocknetError>;

    /// Prints a debug message from the contract.
    fn debug(env: &T, source_ptr: u32) -> Result<(), MocknetError>;

    /// Queries another contract. `request_ptr` references a JSON `QueryRequest`; the returned Region holds a JSON
    /// `SystemResult<ContractResult<Binary>>`.
    fn query_chain(env: &T, request_ptr: u32) -> Result<u32, MocknetError>;

    /// Terminates the contract call with the message in `message_ptr`.
    fn abort(env: &T, message_ptr: u32) -> Result<(), MocknetError>;

    fn gas_evaporate(env: &T, evaporate: u32) -> Result<u32, MocknetError>;

    fn check_gas(env: &T) -> Result<u64, MocknetError>;
}

/// Create importable for instantiation of contract module.
pub(crate) fn create_importable<'a, T, K>(store: &'a Store, env: &T) -> Importable<'a>
where
    T: wasmer::WasmerEnv + 'static,
    K: HostImports<T> + 'static,
{
    Importable(
        imports! {
            "env" => {
                "db_read" => Function::new_native_with_env(store, env.clone(), K::db_read),
                "db_write" => Function::new_native_with_env(store, env.clone(), K::db_write),
                "db_remove" => Function::new_native_with_env(store, env.clone(), K::db_remove),

                "addr_validate" => Function::new_native_with_env(store, env.clone(), K::addr_validate),
                "addr_canonicalize" => Function::new_native_with_env(store, env.clone(), K::addr_canonicalize),
                "addr_humanize" => Function::new_native_with_env(store, env.clone(), K::addr_humanize),

                "secp256k1_verify" => Function::new_native_with_env(store, env.clone(), K::secp256k1_verify),
                "secp256k1_recover_pubkey" => Function::new_native_with_env(store, env.clone(), K::secp256k1_recover_pubkey),
                "secp256k1_sign" => Function::new_native_with_env(store, env.clone(), K::secp256k1_sign),
                "ed25519_verify" => Function::new_native_with_env(store, env.clone(), K::ed25519_verify),
                "ed25519_batch_verify" => Function::new_native_with_env(store, env.clone(), K::ed25519_batch_verify),
                "ed25519_sign" => Function::new_native_with_env(store, env.clone(), K::ed25519_sign),

                "debug" => Function::new_native_with_env(store, env.clone(), K::debug),
                "query_chain" => Function::new_native_with_env(store, env.clone(), K::query_chain),
                "abort" => Function::new_native_with_env(store, env.clone(), K::abort),

                "gas_evaporate" => Function::new_native_with_env(store, env.clone(), K::gas_evaporate),
                "check_gas" => Function::new_native_with_env(store, env.clone(), K::check_gas),
            }
        },
        store,
    )
}

/// Importable is data object required to instantiate contract module
pub(crate) struct Importable<'a>(pub(crate) ImportObject, #[allow(dead_code)] &'a Store);
