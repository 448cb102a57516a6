/*
    Copyright © 2023, Mocknet Runtime Contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! error defines the set of errors observable by callers of the mocknet: uploads, instantiations,
//! executions, queries and batches.

use crate::contract::wasmer::instance::MethodCallError;

/// Descriptive error definitions of a mocknet call.
///
/// Errors raised inside host functions travel through the guest as [wasmer::RuntimeError]s and are
/// recovered by downcast, so this type has to stay `Send + Sync + 'static`.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MocknetError {
    /// The contract code itself trapped or aborted.
    #[error("{address} crashed on {operation}: {message}")]
    GuestTrap {
        address: String,
        operation: String,
        message: String,
    },

    /// A Region pointer was null, out of bounds, or described more bytes than it holds.
    #[error("invalid pointer {ptr:#x}: {reason}")]
    InvalidPointer { ptr: u32, reason: String },

    /// Bytes read from a Region were not the UTF-8/JSON document the call site expected.
    #[error("{address} returned a malformed payload on {operation}: {reason}")]
    MalformedPayload {
        address: String,
        operation: String,
        reason: String,
    },

    /// `query_chain` was given a request that is not a smart wasm query.
    #[error("{address} made a query that is not a smart wasm query: {request}")]
    MalformedQuery { address: String, request: String },

    /// A contract address that is not registered in the backend.
    #[error("contract {target} was not found in the mocknet (queried by {caller:?})")]
    UnknownContract {
        target: String,
        caller: Option<String>,
    },

    /// `query_chain` was called by a contract that has no backend to route the query through.
    #[error("{address} made a query while isolated from the mocknet backend: {request}")]
    IsolatedQuery { address: String, request: String },

    /// A host function that the mocknet deliberately does not implement.
    #[error("host function {function} is not implemented in the mocknet")]
    NotImplementedHostCall { function: String },

    /// `init` was called a second time on the same contract.
    #[error("{address} is already initialized")]
    AlreadyInitialized { address: String },

    /// No code was uploaded under this code id.
    #[error("no code with id {code_id}")]
    UnknownCode { code_id: String },

    /// The code hash supplied with an instantiation does not match the uploaded code.
    #[error("code {code_id} has hash {actual}, not {expected}")]
    CodeHashMismatch {
        code_id: String,
        expected: String,
        actual: String,
    },

    /// Another contract was already instantiated with this label.
    #[error("label {label:?} is already taken by {address}")]
    LabelTaken { label: String, address: String },

    /// The code cannot be compiled into machine code (it is probably invalid WASM).
    #[error("cannot compile code: {0}")]
    CannotCompile(String),

    /// The contract module does not export something the calling convention requires.
    #[error("contract does not export {0}")]
    MissingExport(String),

    /// The module failed to link against the host functions or its start function trapped.
    #[error("cannot instantiate module: {0}")]
    CannotInstantiate(String),

    /// The contract ran to completion and returned an error result.
    #[error("{address} returned an error on {operation}: {error}")]
    ContractError {
        address: String,
        operation: String,
        error: String,
    },

    /// The contract tried to change its storage while serving a query.
    #[error("{address} tried to {function} during a query")]
    ReadOnlyStorage { address: String, function: String },

    /// Nested `query_chain` calls went deeper than the configured limit.
    #[error("query depth exceeded {limit} while {address} queried {target}")]
    QueryDepthExceeded {
        address: String,
        target: String,
        limit: u32,
    },

    /// Messages returned by contracts dispatched further messages deeper than the configured limit.
    #[error("message depth exceeded {limit} while dispatching the messages of {address}")]
    MessageDepthExceeded { address: String, limit: u32 },

    /// A bech32 address could not be decoded, or canonical bytes could not be encoded.
    #[error("invalid address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// A message in a batch failed; messages before it have already been applied.
    #[error("batch aborted at message {index}: {source}")]
    BatchAborted {
        index: usize,
        source: Box<MocknetError>,
    },

    /// A batch message matched neither `init` nor `exec` while batches are strict.
    #[error("batch message {index} is neither init nor exec")]
    UnknownBatchMessage { index: usize },

    /// A batch message refers to the contract of another message that did not instantiate one before it.
    #[error("batch message {index} targets message {target}, which did not instantiate a contract before it")]
    InvalidBatchTarget { index: usize, target: usize },

    /// Batches cannot be exported for signing: the mocknet has no signer.
    #[error("batches cannot be saved for signing on the mocknet")]
    BatchSaveUnsupported,
}

impl MocknetError {
    /// Converts the failure of a call into a contract entry point into a MocknetError. Errors that
    /// a host function raised keep their identity; anything else is a trap of the guest itself.
    pub(crate) fn from_call(call_error: MethodCallError, address: &str, operation: &str) -> Self {
        match call_error {
            MethodCallError::NoExportedMethod(name) => MocknetError::MissingExport(name),
            MethodCallError::Runtime(e) => match e.downcast::<MocknetError>() {
                Ok(host_error) => host_error,
                Err(e) => MocknetError::GuestTrap {
                    address: address.to_string(),
                    operation: operation.to_string(),
                    message: e.message(),
                },
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_host_error_survives_trap() {
        let raised = MocknetError::UnknownContract {
            target: "mocknet1xyz".to_string(),
            caller: Some("mocknet1abc".to_string()),
        };
        let trap = wasmer::RuntimeError::user(Box::new(raised.clone()));
        let error = MocknetError::from_call(MethodCallError::Runtime(trap), "mocknet1abc", "query");
        assert_eq!(error, raised);
    }

    #[test]
    fn test_guest_trap_keeps_context() {
        let trap = wasmer::RuntimeError::new("unreachable");
        let error = MocknetError::from_call(MethodCallError::Runtime(trap), "mocknet1abc", "execute");
        match error {
            MocknetError::GuestTrap {
                address, operation, ..
            } => {
                assert_eq!(address, "mocknet1abc");
                assert_eq!(operation, "execute");
            }
            e => panic!("unexpected error {e:?}"),
        }
    }
}
