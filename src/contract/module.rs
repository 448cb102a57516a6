/*
    Copyright © 2023, Mocknet Runtime Contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Defines the compiled form of uploaded contract code, from which contract instances are created.

use crate::{
    contract::{
        self,
        wasmer::{env::Env, instance::Instance, module::Module},
        MocknetHostFunctions,
    },
    MocknetError,
};

/// ContractModule is contract code that has been compiled and checked against the CosmWasm calling convention.
#[derive(Clone)]
pub(crate) struct ContractModule {
    module: Module,
}

impl ContractModule {
    pub(crate) fn from_contract_code(contract_code: &[u8], store: &wasmer::Store) -> Result<Self, MocknetError> {
        let module = Module::from_wasm_bytecode(contract_code, store)?;
        module.validate_contract()?;
        Ok(Self { module })
    }

    /// instantiate links a fresh instance of the module against the host functions, which act on `environment`.
    pub(crate) fn instantiate(&self, environment: &Env) -> Result<Instance, MocknetError> {
        let store = self.module.0.store();
        let importable = contract::create_importable::<Env, MocknetHostFunctions>(store, environment);
        self.module.instantiate(&importable)
    }
}
