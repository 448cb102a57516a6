/*
    Copyright © 2023, Mocknet Runtime Contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Mocknet Runtime is an in-process simulation of the compute module of a CosmWasm chain. It runs real contract
//! binaries through their `instantiate`, `execute` and `query` entry points without a node, consensus or persistent
//! state.
//!
//! ```text
//! upload(code)                         -> { code_id, code_hash }
//! instantiate(sender, code_id, msg)    -> { address, code_hash, label }
//! execute(sender, address, msg)        -> response
//! query(address, msg)                  -> answer
//! ```
//!
//! ### Example
//!
//! ```rust
//! let backend = mocknet_runtime::Backend::default();
//! let code = backend.upload(&wasm);
//! let contract = backend.instantiate("mocknet1sender", Instantiate::new(code.code_id, "counter", json!({})))?;
//! backend.execute("mocknet1sender", &contract, &json!({"increment": {}}), &[])?;
//! let count = backend.query(&contract, &json!({"get": {}}))?;
//! ```
//!
//! Contracts live in a [Backend], which allocates code ids and addresses and routes the queries that contracts make
//! to each other. Each [contract] is a wasmer instance exchanging JSON with the host through Regions in its linear
//! memory. Several messages can be applied in order as one [batch].

pub mod backend;
pub use backend::{Backend, CodeEntry};

pub mod batch;
pub use batch::{Batch, BatchMessage, BatchResult, BatchTarget};

pub mod contract;
pub use contract::{wasmer::env::Storage, ContractHost};

pub mod encoding;

pub mod error;
pub use error::MocknetError;

pub mod params;
pub use params::MocknetConfig;

pub mod types;
pub use types::{BlockInfo, Coin, ContractLink, Instantiate, Instantiated, Uploaded};

// Link-compat shim: wasmer-vm 2.3.0 references `__rust_probestack`, which Rust 1.85+ no longer exports from
// compiler_builtins. Provided only so binaries link; stack overflow is still caught by the kernel guard page.
#[cfg(all(any(target_arch = "x86_64", target_arch = "x86"), not(target_os = "windows")))]
#[no_mangle]
pub extern "C" fn __rust_probestack() {}
