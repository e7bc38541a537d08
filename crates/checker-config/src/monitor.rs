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

use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::defaults;

/// MonitorConfig is the configuration for the scheduled watch passes and
/// the alerting surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MonitorConfig {
    /// How often every transmitter is re-checked, in seconds.
    #[serde(default = "defaults::monitor_interval_secs")]
    pub interval_secs: u64,
    /// How many recent rounds a watch pass inspects per contract.
    #[serde(default = "defaults::rounds_to_check")]
    pub rounds_to_check: u32,
    /// Transmissions older than this many days count as stale.
    #[serde(default = "defaults::stale_after_days")]
    pub stale_after_days: i64,
    /// The transmitter addresses watched by the monitor.
    #[serde(default)]
    pub transmitters: Vec<Address>,
    /// Where to send alerts; alerting is disabled when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook: Option<WebhookConfig>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::monitor_interval_secs(),
            rounds_to_check: defaults::rounds_to_check(),
            stale_after_days: defaults::stale_after_days(),
            transmitters: Vec::new(),
            webhook: None,
        }
    }
}

impl MonitorConfig {
    /// The monitor re-check interval.
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Outbound chat webhook configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WebhookConfig {
    /// The webhook endpoint to POST alert payloads to.
    #[serde(skip_serializing)]
    pub url: url::Url,
    /// Delivery timeout, in milliseconds.
    #[serde(default = "defaults::webhook_timeout_ms")]
    pub timeout_ms: u64,
}

impl WebhookConfig {
    /// Delivery timeout.
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
