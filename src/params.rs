/*
    Copyright © 2023, Mocknet Runtime Contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Configuration of a mocknet [Backend](crate::Backend).

/// Default bech32 prefix of contract addresses.
pub const DEFAULT_ADDRESS_PREFIX: &str = "mocknet";

/// Default chain id reported to contracts in `env.block.chain_id`.
pub const DEFAULT_CHAIN_ID: &str = "mocknet-1";

/// Default limit of nested `query_chain` calls.
pub const DEFAULT_MAX_QUERY_DEPTH: u32 = 32;

/// Default limit of nested sub-message dispatch.
pub const DEFAULT_MAX_MESSAGE_DEPTH: u32 = 32;

/// Default genesis time of the mock block clock (2024-01-01 00:00:00 UTC).
pub const DEFAULT_GENESIS_TIME_SECS: u64 = 1_704_067_200;

/// Seconds between two consecutive mock blocks.
pub const DEFAULT_BLOCK_TIME_SECS: u64 = 5;

/// MocknetConfig defines the knobs of the simulated compute module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MocknetConfig {
    /// Chain id passed to contracts in their `env`.
    pub chain_id: String,

    /// Human readable part of generated contract addresses, also used by `addr_humanize`.
    pub address_prefix: String,

    /// Maximum nesting of cross-contract queries before the innermost one fails with
    /// [QueryDepthExceeded](crate::MocknetError::QueryDepthExceeded).
    pub max_query_depth: u32,

    /// Maximum nesting of messages returned by contracts (a message dispatched from the response of a message
    /// dispatched from ...) before the innermost dispatch fails with
    /// [MessageDepthExceeded](crate::MocknetError::MessageDepthExceeded).
    pub max_message_depth: u32,

    /// When true, calls to the stubbed host functions (signatures, `addr_validate`) fail with
    /// [NotImplementedHostCall](crate::MocknetError::NotImplementedHostCall) instead of returning 0.
    pub strict_host_stubs: bool,

    /// When true, a batch message that is neither init nor exec aborts the batch instead of being
    /// skipped with a `None` result.
    pub strict_batches: bool,

    /// Height of the mock block before the first state-changing call.
    pub genesis_height: u64,

    /// Unix time of the mock block at `genesis_height`.
    pub genesis_time_secs: u64,

    /// Seconds added to the mock block time for every new block.
    pub block_time_secs: u64,
}

impl Default for MocknetConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID.to_string(),
            address_prefix: DEFAULT_ADDRESS_PREFIX.to_string(),
            max_query_depth: DEFAULT_MAX_QUERY_DEPTH,
            max_message_depth: DEFAULT_MAX_MESSAGE_DEPTH,
            strict_host_stubs: false,
            strict_batches: false,
            genesis_height: 1,
            genesis_time_secs: DEFAULT_GENESIS_TIME_SECS,
            block_time_secs: DEFAULT_BLOCK_TIME_SECS,
        }
    }
}

impl MocknetConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// A configuration that refuses everything the mocknet only pretends to support.
    pub fn strict() -> Self {
        Self {
            strict_host_stubs: true,
            strict_batches: true,
            ..Default::default()
        }
    }

    pub fn with_chain_id(mut self, chain_id: impl Into<String>) -> Self {
        self.chain_id = chain_id.into();
        self
    }

    pub fn with_address_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.address_prefix = prefix.into();
        self
    }

    pub fn with_max_query_depth(mut self, depth: u32) -> Self {
        self.max_query_depth = depth;
        self
    }

    pub fn with_max_message_depth(mut self, depth: u32) -> Self {
        self.max_message_depth = depth;
        self
    }
}
