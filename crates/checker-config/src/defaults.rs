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

//! Default values for the checker configuration.

/// The default port the metrics endpoint will listen on.
pub const fn port() -> u16 {
    9955
}

/// Shared cap on simultaneous outbound RPC calls.
pub const fn max_concurrency() -> usize {
    30
}

/// Maximum blocks one log query may cover.
pub const fn rpc_max_range() -> u64 {
    5_000
}

/// Retry budget per chunk query.
pub const fn max_retries() -> usize {
    3
}

/// Base delay of the exponential retry schedule, in milliseconds.
pub const fn base_retry_delay_ms() -> u64 {
    1_000
}

/// Per-RPC timeout, in milliseconds.
pub const fn rpc_call_timeout_ms() -> u64 {
    30_000
}

/// Guardrail on the span of one `fetch-by-rounds` call.
pub const fn max_round_span() -> u32 {
    10_000
}

/// Round→block cache entry lifetime, in seconds.
pub const fn round_cache_ttl_secs() -> u64 {
    300
}

/// Round→block cache size bound.
pub const fn round_cache_max_entries() -> usize {
    1_000
}

/// How often the monitor re-checks every transmitter, in seconds.
pub const fn monitor_interval_secs() -> u64 {
    300
}

/// How many recent rounds a watch pass inspects per contract.
pub const fn rounds_to_check() -> u32 {
    10
}

/// Transmissions older than this many days count as stale.
pub const fn stale_after_days() -> i64 {
    1
}

/// Webhook delivery timeout, in milliseconds.
pub const fn webhook_timeout_ms() -> u64 {
    10_000
}
