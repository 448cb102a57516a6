/*
    Copyright © 2023, Mocknet Runtime Contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Defines a struct containing [wasmer::Instance] to call the entry points of a CosmWasm contract.

use wasmer::{Memory, NativeFunc, Val};

use crate::MocknetError;

use super::memory::MemoryContext;

/// Instance represents a stateful instance of a WebAssembly module (quasi-process) and ready for contract method execution
/// through its exported entry points.
pub(crate) struct Instance(pub(crate) wasmer::Instance);

impl Instance {
    /// call_method executes the named entry point with Region pointers as arguments, and returns the Region pointer
    /// that the entry point returns.
    pub(crate) fn call_method(&self, method: &str, args: &[u32]) -> Result<u32, MethodCallError> {
        let function = self
            .0
            .exports
            .get_function(method)
            .map_err(|_| MethodCallError::NoExportedMethod(method.to_string()))?;

        // pointers are passed as i32 with the same bits
        let params: Vec<Val> = args.iter().map(|arg| Val::I32(*arg as i32)).collect();
        let results = function.call(&params).map_err(MethodCallError::Runtime)?;

        match results.first() {
            Some(Val::I32(ptr)) => Ok(*ptr as u32),
            _ => Err(MethodCallError::Runtime(wasmer::RuntimeError::new(format!(
                "{method} did not return a region pointer"
            )))),
        }
    }

    /// number of parameters of an exported function, if the function is exported
    pub(crate) fn arity(&self, method: &str) -> Option<usize> {
        self.0
            .exports
            .get_function(method)
            .ok()
            .map(|f| f.ty().params().len())
    }
}

/// MethodCallError enumerates through the possible reasons why a call into a contract Instance's exported methods might
/// terminate early.
#[derive(Debug)]
pub enum MethodCallError {
    Runtime(wasmer::RuntimeError),
    NoExportedMethod(String),
}

/// GuestExports holds the exports of an instance that the host side needs to marshal data: its linear memory and its
/// allocator.
pub(crate) struct GuestExports {
    owner: String,
    memory: Memory,
    allocate: NativeFunc<u32, u32>,
}

impl GuestExports {
    pub(crate) fn from_instance(instance: &wasmer::Instance, owner: &str) -> Result<Self, MocknetError> {
        let memory = instance
            .exports
            .get_memory("memory")
            .map_err(|_| MocknetError::MissingExport("memory".to_string()))?
            .clone();
        let allocate = instance
            .exports
            .get_native_function::<u32, u32>("allocate")
            .map_err(|_| MocknetError::MissingExport("allocate".to_string()))?;
        Ok(Self {
            owner: owner.to_string(),
            memory,
            allocate,
        })
    }
}

impl MemoryContext for GuestExports {
    fn get_memory(&self) -> Result<&Memory, MocknetError> {
        Ok(&self.memory)
    }

    fn get_allocate(&self) -> Result<&NativeFunc<u32, u32>, MocknetError> {
        Ok(&self.allocate)
    }

    fn owner(&self) -> &str {
        &self.owner
    }
}
