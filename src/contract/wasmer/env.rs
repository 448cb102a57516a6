/*
    Copyright © 2023, Mocknet Runtime Contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Defines environment used for constructing the Wasm (specifically Wasmer) instance.
//!
//! The environment (Env) is what every host function receives. It holds the storage of the contract that owns the
//! instance, whether that storage is currently read-only, and a weak handle to the backend through which
//! `query_chain` reaches other contracts.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use wasmer::{LazyInit, Memory, NativeFunc};

use crate::{backend::Registry, MocknetConfig, MocknetError};

use super::memory::MemoryContext;

/// Key-value storage of one contract.
pub type Storage = BTreeMap<Vec<u8>, Vec<u8>>;

/// Env provides the functions in `exports` (which are in turn 'imported' by WASM smart contracts)
/// access to complex functionality that typically cannot cross the host-WASM barrier.
///
/// Wasmer handles everything for us.
#[derive(wasmer::WasmerEnv, Clone)]
pub(crate) struct Env {
    /// Address of the contract that owns the instance.
    pub address: String,

    pub storage: Arc<Mutex<Storage>>,

    /// Number of queries currently running on the owning contract. Storage is read-only while non-zero.
    pub read_only: Arc<AtomicU32>,

    /// None for contracts loaded outside of a backend.
    pub backend: Option<Weak<Registry>>,

    pub config: MocknetConfig,

    #[wasmer(export)]
    pub memory: LazyInit<Memory>,

    #[wasmer(export(name = "allocate"))]
    pub allocate: LazyInit<NativeFunc<u32, u32>>,
}

impl Env {
    pub fn new(
        address: String,
        storage: Arc<Mutex<Storage>>,
        read_only: Arc<AtomicU32>,
        backend: Option<Weak<Registry>>,
        config: MocknetConfig,
    ) -> Env {
        Env {
            address,
            storage,
            read_only,
            backend,
            config,
            memory: LazyInit::default(),
            allocate: LazyInit::default(),
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::SeqCst) > 0
    }

    /// fails with ReadOnlyStorage if the owning contract is serving a query
    pub fn ensure_writable(&self, function: &str) -> Result<(), MocknetError> {
        if self.is_read_only() {
            return Err(MocknetError::ReadOnlyStorage {
                address: self.address.clone(),
                function: function.to_string(),
            });
        }
        Ok(())
    }
}

impl MemoryContext for Env {
    fn get_memory(&self) -> Result<&Memory, MocknetError> {
        self.memory_ref()
            .ok_or_else(|| MocknetError::MissingExport("memory".to_string()))
    }

    fn get_allocate(&self) -> Result<&NativeFunc<u32, u32>, MocknetError> {
        self.allocate_ref()
            .ok_or_else(|| MocknetError::MissingExport("allocate".to_string()))
    }

    fn owner(&self) -> &str {
        &self.address
    }
}

/// Marks the storage behind `counter` read-only until dropped.
pub(crate) struct ReadOnlyGuard(Arc<AtomicU32>);

impl ReadOnlyGuard {
    pub fn acquire(counter: &Arc<AtomicU32>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for ReadOnlyGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_read_only_guard_nests() {
        let env = Env::new(
            "mocknet1test".to_string(),
            Arc::default(),
            Arc::default(),
            None,
            MocknetConfig::default(),
        );
        assert!(env.ensure_writable("db_write").is_ok());
        {
            let _outer = ReadOnlyGuard::acquire(&env.read_only);
            {
                let _inner = ReadOnlyGuard::acquire(&env.read_only);
            }
            assert_eq!(
                env.ensure_writable("db_remove"),
                Err(MocknetError::ReadOnlyStorage {
                    address: "mocknet1test".to_string(),
                    function: "db_remove".to_string(),
                })
            );
        }
        assert!(!env.is_read_only());
    }
}
