/*
    Copyright © 2023, Mocknet Runtime Contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Defines types and functions that provide a convenient and succinct object-oriented interface for loading,
//! instantiating and calling (WASM) CosmWasm contracts.
//!
//! Contract code is compiled into a [module]. Each contract is an [instance] of a module linked against the
//! [host functions](host_functions) that the mocknet implements in [functions].

pub mod host_functions;
pub use host_functions::*;

pub mod functions;
pub(crate) use functions::*;

pub mod instance;
pub use instance::*;

pub mod module;
pub(crate) use module::*;

pub mod wasmer;
