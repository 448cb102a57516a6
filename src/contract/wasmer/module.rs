/*
    Copyright © 2023, Mocknet Runtime Contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Defines a struct to use [wasmer::Module] as underlying WASM module to work with compiled contract bytecode.

use wasmer::ExternType;

use crate::contract::Importable;
use crate::MocknetError;

use super::instance::Instance;

/// Exports that every contract must provide, with the kind of each.
pub const REQUIRED_FUNCTIONS: [&str; 4] = ["allocate", "instantiate", "execute", "query"];
pub const REQUIRED_MEMORY: &str = "memory";

/// Module is a structure representing a WebAssembly executable that has been compiled down to architecture-specific
/// machine code in preparation for execution.
#[derive(Clone)]
pub(crate) struct Module(pub wasmer::Module);

impl Module {
    /// from_wasm_bytecode returns the contract Module produced by compiling the wasm bytecode provided as an argument.
    pub fn from_wasm_bytecode(bytecode: &[u8], wasmer_store: &wasmer::Store) -> Result<Module, MocknetError> {
        wasmer::Module::from_binary(wasmer_store, bytecode)
            .map(Module)
            .map_err(|e| MocknetError::CannotCompile(e.to_string()))
    }

    /// validate_contract returns whether this contract Module exports its memory and every entry point of the
    /// calling convention.
    pub fn validate_contract(&self) -> Result<(), MocknetError> {
        let has_memory = self
            .0
            .exports()
            .any(|e| e.name() == REQUIRED_MEMORY && matches!(e.ty(), ExternType::Memory(_)));
        if !has_memory {
            return Err(MocknetError::MissingExport(REQUIRED_MEMORY.to_string()));
        }
        for name in REQUIRED_FUNCTIONS {
            if !self.0.exports().functions().any(|f| f.name() == name) {
                return Err(MocknetError::MissingExport(name.to_string()));
            }
        }
        Ok(())
    }

    /// instantiate creates a new instance of this contract Module.
    pub fn instantiate(&self, importable: &Importable) -> Result<Instance, MocknetError> {
        wasmer::Instance::new(&self.0, &importable.0)
            .map(Instance)
            .map_err(|e| MocknetError::CannotInstantiate(e.to_string()))
    }
}
