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

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;

/// DiscoveryConfig is the configuration for the transmission discovery
/// engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DiscoveryConfig {
    /// Shared cap on simultaneous outbound RPC calls across every
    /// harvest in the process.
    #[serde(default = "defaults::max_concurrency")]
    pub max_concurrency: usize,
    /// Maximum blocks one log query may cover; also the preferred chunk
    /// size of the range planner.
    #[serde(default = "defaults::rpc_max_range")]
    pub rpc_max_range: u64,
    /// Retry budget per chunk query.
    #[serde(default = "defaults::max_retries")]
    pub max_retries: usize,
    /// Base delay of the exponential retry schedule, in milliseconds.
    #[serde(default = "defaults::base_retry_delay_ms")]
    pub base_retry_delay_ms: u64,
    /// Per-RPC timeout, in milliseconds.
    #[serde(default = "defaults::rpc_call_timeout_ms")]
    pub rpc_call_timeout_ms: u64,
    /// Guardrail on the span of one fetch-by-rounds call.
    #[serde(default = "defaults::max_round_span")]
    pub max_round_span: u32,
    /// Round→block cache entry lifetime, in seconds.
    #[serde(default = "defaults::round_cache_ttl_secs")]
    pub round_cache_ttl_secs: u64,
    /// Round→block cache size bound; exceeding it triggers an
    /// opportunistic sweep of expired entries.
    #[serde(default = "defaults::round_cache_max_entries")]
    pub round_cache_max_entries: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_concurrency: defaults::max_concurrency(),
            rpc_max_range: defaults::rpc_max_range(),
            max_retries: defaults::max_retries(),
            base_retry_delay_ms: defaults::base_retry_delay_ms(),
            rpc_call_timeout_ms: defaults::rpc_call_timeout_ms(),
            max_round_span: defaults::max_round_span(),
            round_cache_ttl_secs: defaults::round_cache_ttl_secs(),
            round_cache_max_entries: defaults::round_cache_max_entries(),
        }
    }
}

impl DiscoveryConfig {
    /// Base delay of the exponential retry schedule.
    pub const fn base_retry_delay(&self) -> Duration {
        Duration::from_millis(self.base_retry_delay_ms)
    }

    /// Per-RPC timeout.
    pub const fn rpc_call_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_call_timeout_ms)
    }

    /// Round→block cache entry lifetime.
    pub const fn round_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.round_cache_ttl_secs)
    }
}
