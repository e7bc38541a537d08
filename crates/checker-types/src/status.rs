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

use chrono::{DateTime, Utc};
use derive_more::Display;
use ethers::types::Address;
use serde::{Deserialize, Serialize};

/// The verdict for one transmitter on one aggregator contract.
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    /// A recent transmission from the transmitter was found.
    #[display(fmt = "Found")]
    Found,
    /// The transmitter transmitted, but not since the staleness cutoff.
    #[display(fmt = "Stale")]
    Stale,
    /// No transmission from the transmitter in the checked span.
    #[display(fmt = "Missing")]
    Missing,
    /// The job/contract is not active for this transmitter.
    #[display(fmt = "No Active")]
    NoActive,
    /// The check itself failed.
    #[display(fmt = "Error")]
    Error,
}

/// Current status of one transmitter on one contract.
#[derive(Debug, Clone, Serialize)]
pub struct TransmitterStatus {
    /// The watched transmitter.
    pub transmitter: Address,
    /// The aggregator contract checked.
    pub contract: Address,
    /// The last round the transmitter was seen in, if any.
    pub last_round: Option<u32>,
    /// Block timestamp of the last transmission seen, if any.
    pub last_seen: Option<DateTime<Utc>>,
    /// The verdict.
    pub status: JobStatus,
    /// The failure message when `status` is [`JobStatus::Error`].
    pub error: Option<String>,
}

/// Per-verdict counts over every contract checked for one transmitter.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct WatchSummary {
    /// Total contracts checked.
    pub total: usize,
    /// Contracts with a fresh transmission.
    pub found: usize,
    /// Contracts with only stale transmissions.
    pub stale: usize,
    /// Contracts with no transmission at all.
    pub missing: usize,
    /// Contracts not active for the transmitter.
    pub no_active: usize,
    /// Contracts whose check failed.
    pub errored: usize,
}

impl WatchSummary {
    /// Tallies a verdict into the summary.
    pub fn record(&mut self, status: JobStatus) {
        self.total += 1;
        match status {
            JobStatus::Found => self.found += 1,
            JobStatus::Stale => self.stale += 1,
            JobStatus::Missing => self.missing += 1,
            JobStatus::NoActive => self.no_active += 1,
            JobStatus::Error => self.errored += 1,
        }
    }

    /// Fraction of checked contracts that are healthy, in `[0, 1]`.
    pub fn health_score(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.found as f64 / self.total as f64
    }
}

/// The complete outcome of one watch pass for one transmitter.
#[derive(Debug, Clone, Serialize)]
pub struct WatchReport {
    /// The watched transmitter.
    pub transmitter: Address,
    /// One status per checked contract.
    pub statuses: Vec<TransmitterStatus>,
    /// Aggregated verdict counts.
    pub summary: WatchSummary,
    /// When the pass ran.
    pub checked_at: DateTime<Utc>,
}
