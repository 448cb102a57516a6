/*
    Copyright © 2023, Mocknet Runtime Contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Encodings shared by the host functions and the backend: base64 `Binary` payloads, bech32
//! addresses, code hashes and the `Ok`/`Err` result envelopes that contracts return.
//!
//! Fields of type `Binary` (query responses, the `data` of execute responses, the `msg` of
//! sub-messages) are returned by contracts as base64 strings, usually wrapping JSON.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bech32::{FromBase32, ToBase32, Variant};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::MocknetError;

/// Length in bytes of the canonical form of generated addresses.
pub const CANONICAL_ADDRESS_LENGTH: usize = 20;

/// Errors in decoding a base64 `Binary` into text.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Decodes a base64 string into the UTF-8 text it carries.
pub fn b64_to_utf8(b64: &str) -> Result<String, DecodeError> {
    Ok(String::from_utf8(STANDARD.decode(b64)?)?)
}

/// Encodes UTF-8 text as a base64 string.
pub fn utf8_to_b64(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

pub fn bytes_to_b64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn b64_to_bytes(b64: &str) -> Result<Vec<u8>, DecodeError> {
    Ok(STANDARD.decode(b64)?)
}

/// Lowercase hex SHA-256 of a code blob.
pub fn code_hash_for_blob(code: &[u8]) -> String {
    hex::encode(Sha256::digest(code))
}

/// A random bech32 address with the given prefix.
pub fn random_address(prefix: &str) -> Result<String, MocknetError> {
    let canonical: [u8; CANONICAL_ADDRESS_LENGTH] = rand::random();
    humanize(prefix, &canonical)
}

/// Decodes a bech32 address into its canonical bytes.
pub fn canonicalize(human: &str) -> Result<Vec<u8>, MocknetError> {
    let invalid = |reason: String| MocknetError::InvalidAddress {
        address: human.to_string(),
        reason,
    };
    let (_prefix, words, _variant) = bech32::decode(human).map_err(|e| invalid(e.to_string()))?;
    Vec::<u8>::from_base32(&words).map_err(|e| invalid(e.to_string()))
}

/// Encodes canonical bytes into a bech32 address.
pub fn humanize(prefix: &str, canonical: &[u8]) -> Result<String, MocknetError> {
    bech32::encode(prefix, canonical.to_base32(), Variant::Bech32).map_err(|e| {
        MocknetError::InvalidAddress {
            address: hex::encode(canonical),
            reason: e.to_string(),
        }
    })
}

/// Unwraps the result envelope of a contract call. Both the capitalized (`Ok`/`Err`) and the
/// snake case (`ok`/`error`) spellings are accepted.
pub fn parse_result(response: Value, operation: &str, address: &str) -> Result<Value, MocknetError> {
    let Value::Object(mut envelope) = response else {
        return Err(malformed_envelope(&response, operation, address));
    };
    if let Some(error) = envelope.remove("Err").or_else(|| envelope.remove("error")) {
        return Err(MocknetError::ContractError {
            address: address.to_string(),
            operation: operation.to_string(),
            error: match error {
                Value::String(message) => message,
                other => other.to_string(),
            },
        });
    }
    if let Some(ok) = envelope.remove("Ok").or_else(|| envelope.remove("ok")) {
        return Ok(ok);
    }
    Err(malformed_envelope(&Value::Object(envelope), operation, address))
}

fn malformed_envelope(response: &Value, operation: &str, address: &str) -> MocknetError {
    MocknetError::MalformedPayload {
        address: address.to_string(),
        operation: operation.to_string(),
        reason: format!("expected an Ok or Err result, got {response}"),
    }
}
