/*
    Copyright © 2023, Mocknet Runtime Contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Utilizes [Wasmer](https://wasmer.io/) for contract execution in a Wasm environment.
//!
//! Contract code is compiled into a [module] in a [store] and run as an [instance]. The [environment](mod@env) handed
//! to host functions gives them read-write access to [Wasm linear memory](memory) through the Region convention.

pub mod env;

pub mod memory;

pub mod module;

pub mod store;

pub mod instance;
