// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![warn(missing_docs)]
//! # OCR Checker Utils 🕸️
//!
//! The shared error type plus the small cross-cutting modules every
//! other checker crate leans on: retry policies, cooperative
//! cancellation, probe targets for machine-readable logs, and the
//! Prometheus metrics family.

use std::time::Duration;

use ethers::types::Address;
use ocr_checker_types::BlockRange;

/// Cooperative cancellation primitives.
pub mod cancel;
/// Metrics functionality.
pub mod metric;
/// A module used for debugging the checker lifecycle and harvest state.
pub mod probe;
/// Retry policies for async calls.
pub mod retry;

/// An enum of all possible errors that could be encountered during the
/// execution of the OCR checker.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An Io error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// JSON Error occurred.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Config loading error.
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    /// Error while parsing the config files.
    #[error("Config parse error: {}", _0)]
    ParseConfig(#[from] serde_path_to_error::Error<config::ConfigError>),
    /// Error while iterating over a glob pattern.
    #[error(transparent)]
    GlobPattern(#[from] glob::PatternError),
    /// Error from Glob Iterator.
    #[error(transparent)]
    Glob(#[from] glob::GlobError),
    /// Error while parsing a URL.
    #[error(transparent)]
    Url(#[from] url::ParseError),
    /// Error in the underlying Http server.
    #[error(transparent)]
    Axum(#[from] axum::Error),
    /// Error in Http Provider (ethers client).
    #[error(transparent)]
    EthersProvider(#[from] ethers::providers::ProviderError),
    /// ABI Codec error while decoding an event log.
    #[error(transparent)]
    EthersAbi(#[from] ethers::abi::Error),
    /// ABI Codec error while decoding a view call return.
    #[error(transparent)]
    EthersAbiDecode(#[from] ethers::abi::AbiError),
    /// Reqwest error.
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    /// Prometheus error.
    #[error(transparent)]
    Prometheus(#[from] prometheus::Error),
    /// Malformed caller input, never retried.
    #[error("Invalid range: {}", reason)]
    InvalidRange {
        /// What made the range invalid.
        reason: String,
    },
    /// A round endpoint could not be pinned to a block after retries
    /// and the log-search fallback.
    #[error("Round {} not locatable on {:?}", round, contract)]
    RoundNotLocatable {
        /// The aggregator contract searched.
        contract: Address,
        /// The round that could not be located.
        round: u32,
    },
    /// An RPC failure that persisted past the retry budget.
    #[error("Transport error on blocks {}: {}", range, message)]
    Transport {
        /// The block range the failing query covered.
        range: BlockRange,
        /// The underlying failure.
        message: String,
    },
    /// The node rejected a log query for covering too many blocks.
    #[error("Log query over {} exceeds the node's range cap", range)]
    RangeTooLarge {
        /// The rejected range.
        range: BlockRange,
    },
    /// The node asked us to back off.
    #[error("Rate limited by the node")]
    RateLimited {
        /// Server-provided delay hint, when the node sent one.
        retry_after: Option<Duration>,
    },
    /// A block number the node does not have (yet).
    #[error("Block #{} not found", _0)]
    BlockNotFound(u64),
    /// The call's cancellation token fired.
    #[error("Operation cancelled")]
    Cancelled,
    /// Invariant violation; should never happen.
    #[error("Internal invariant violated: {}", _0)]
    Internal(String),
    /// EVM Chain not found in the configuration.
    #[error("Chain Not Found: {}", chain_id)]
    ChainNotFound {
        /// The chain id of the chain.
        chain_id: String,
    },
}

impl Error {
    /// Whether the node rejected the query for spanning too many blocks,
    /// which the harvester answers by splitting the chunk.
    pub fn is_range_too_large(&self) -> bool {
        matches!(self, Self::RangeTooLarge { .. })
    }

    /// Whether the node asked us to back off.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// The server-provided backoff hint, when one exists.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Whether a retry with the same parameters can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::EthersProvider(_)
                | Self::RateLimited { .. }
                | Self::Transport { .. }
        )
    }
}

/// A type alias for the result used across the OCR checker crates.
pub type Result<T> = std::result::Result<T, Error>;
