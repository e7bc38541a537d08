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

//! The watch decider: per-contract verdicts for one transmitter.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use ethers::types::Address;

use ocr_checker_discovery::TransmissionFetcher;
use ocr_checker_types::{
    JobStatus, TransmitterStatus, WatchReport, WatchSummary,
};
use ocr_checker_utils::cancel::CancelToken;
use ocr_checker_utils::{probe, Result};

use crate::registry::JobRegistry;

/// Hard cap on how many recent rounds one watch pass may inspect.
const MAX_ROUNDS_TO_CHECK: u32 = 100;

/// Checks a transmitter's recent activity across every contract the
/// registry assigns to it and maps what it finds to verdicts.
pub struct TransmitterWatcher {
    fetcher: TransmissionFetcher,
    registry: Arc<dyn JobRegistry>,
    rounds_to_check: u32,
    stale_after: Duration,
}

impl TransmitterWatcher {
    /// Creates a watcher inspecting the last `rounds_to_check` rounds
    /// (clamped to `1..=100`) and treating transmissions older than
    /// `stale_after_days` as stale.
    pub fn new(
        fetcher: TransmissionFetcher,
        registry: Arc<dyn JobRegistry>,
        rounds_to_check: u32,
        stale_after_days: i64,
    ) -> Self {
        Self {
            fetcher,
            registry,
            rounds_to_check: rounds_to_check.clamp(1, MAX_ROUNDS_TO_CHECK),
            stale_after: Duration::days(stale_after_days.max(0)),
        }
    }

    /// Runs one watch pass for `transmitter`.
    pub async fn check(
        &self,
        transmitter: Address,
        cancel: &CancelToken,
    ) -> Result<WatchReport> {
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::TRACE,
            kind = %probe::Kind::MonitorCheck,
            transmitter = ?transmitter,
        );
        let contracts =
            self.registry.contracts_for_transmitter(transmitter).await?;
        if contracts.is_empty() {
            tracing::warn!(
                ?transmitter,
                "no contracts found for transmitter"
            );
        }

        let cutoff = Utc::now() - self.stale_after;
        let mut statuses = Vec::with_capacity(contracts.len());
        let mut summary = WatchSummary::default();
        for contract in contracts {
            let status = self
                .check_contract(contract, transmitter, cutoff, cancel)
                .await;
            summary.record(status.status);
            statuses.push(status);
        }

        tracing::info!(
            ?transmitter,
            total = summary.total,
            found = summary.found,
            stale = summary.stale,
            missing = summary.missing,
            no_active = summary.no_active,
            errored = summary.errored,
            "transmitter watch completed"
        );
        Ok(WatchReport {
            transmitter,
            statuses,
            summary,
            checked_at: Utc::now(),
        })
    }

    async fn check_contract(
        &self,
        contract: Address,
        transmitter: Address,
        cutoff: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> TransmitterStatus {
        let mut status = TransmitterStatus {
            transmitter,
            contract,
            last_round: None,
            last_seen: None,
            status: JobStatus::Missing,
            error: None,
        };

        let reader = self.fetcher.reader(contract);

        // a transmitter absent from the current roster has no active job
        // on this contract, whatever the history says
        if let Ok(roster) = reader.transmitters(None).await {
            if !roster.contains(&transmitter) {
                status.status = JobStatus::NoActive;
                return status;
            }
        }

        let latest = match reader.latest_round_data().await {
            Ok(latest) => latest,
            Err(e) => {
                tracing::error!(
                    ?contract,
                    "failed to read the latest round: {}",
                    e
                );
                status.status = JobStatus::Error;
                status.error = Some(e.to_string());
                return status;
            }
        };

        let end_round = latest.round_id;
        if end_round == 0 {
            // the contract has never completed a round
            status.status = JobStatus::Missing;
            return status;
        }
        let start_round =
            end_round.saturating_sub(self.rounds_to_check - 1).max(1);
        let result = match self
            .fetcher
            .fetch_by_rounds(contract, start_round, end_round, cancel)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(
                    ?contract,
                    "failed to fetch transmissions: {}",
                    e
                );
                status.status = JobStatus::Error;
                status.error = Some(e.to_string());
                return status;
            }
        };

        for t in result
            .transmissions
            .iter()
            .filter(|t| t.transmitter == transmitter)
        {
            if status.last_seen.map_or(true, |seen| t.block_timestamp > seen)
            {
                status.last_seen = Some(t.block_timestamp);
                status.last_round = Some(t.round_id);
            }
        }

        status.status = match status.last_seen {
            None => JobStatus::Missing,
            Some(seen) if seen < cutoff => JobStatus::Stale,
            Some(_) => JobStatus::Found,
        };
        status
    }
}
