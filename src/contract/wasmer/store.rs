/*
    Copyright © 2023, Mocknet Runtime Contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Implementation of Store instantiation for contract modules.

use wasmer::Store;
use wasmer_compiler_singlepass::Singlepass;
use wasmer_engine_universal::Universal;

/// Instantiate a Store that represents the states that can be manipulated by WASM program.
///
/// Contracts run without metering or opcode filtering: the mocknet charges no gas and does not
/// need determinism across nodes.
pub fn instantiate_store() -> Store {
    // use the Singlepass compiler which is optimised for fast compilation
    let compiler_config = Singlepass::new();
    let engine = Universal::new(compiler_config).engine();
    Store::new(&engine)
}
