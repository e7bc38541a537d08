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

use std::sync::Arc;

use ocr_checker_config::discovery::DiscoveryConfig;
use ocr_checker_types::BlockRange;
use ocr_checker_utils::{Error, Result};

use crate::aggregator::AggregatorReader;
use crate::cache::RoundBlockCache;
use crate::gateway::ChainGateway;
use crate::locator::BlockLocator;

/// Which end of a round range is being located; steers the log-search
/// fallback when a probe window is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// The lower endpoint.
    Start,
    /// The upper endpoint.
    End,
}

/// Sampling window (in blocks, back from head) used to estimate the
/// blocks-per-round rate.
const SAMPLE_WINDOW: u64 = 10_000;

/// Probe window of the log-search fallback.
const PROBE_WINDOW: u64 = 1_000;

/// Probe window after a transport failure.
const REDUCED_PROBE_WINDOW: u64 = 100;

/// How far around the rate estimate the binary search is narrowed.
const ESTIMATE_MARGIN: u64 = 100_000;

/// Pins a round id to a block number: cache probe, then the contract's
/// own `getTimestamp` view handed to the block locator, then a
/// log-scanning binary search for contract variants that do not index
/// historical rounds.
pub struct RoundLocator {
    gateway: Arc<dyn ChainGateway>,
    reader: AggregatorReader,
    blocks: BlockLocator,
    cache: Arc<RoundBlockCache>,
    cfg: DiscoveryConfig,
}

impl RoundLocator {
    /// Creates a locator for the reader's contract.
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        reader: AggregatorReader,
        blocks: BlockLocator,
        cache: Arc<RoundBlockCache>,
        cfg: DiscoveryConfig,
    ) -> Self {
        Self {
            gateway,
            reader,
            blocks,
            cache,
            cfg,
        }
    }

    /// A block number containing `round`'s transmission.
    pub async fn locate(&self, round: u32, endpoint: Endpoint) -> Result<u64> {
        let contract = self.reader.address();
        if let Some(block) = self.cache.get(contract, round) {
            tracing::debug!(round, block, "round located from cache");
            return Ok(block);
        }

        match self.reader.round_timestamp(round).await {
            Ok(Some(timestamp)) => {
                let block = self.blocks.locate(timestamp).await?;
                self.cache.insert(contract, round, block);
                return Ok(block);
            }
            Ok(None) => {
                tracing::debug!(
                    round,
                    "contract does not index this round, trying log search"
                );
            }
            Err(e) => {
                tracing::debug!(
                    round,
                    "getTimestamp unavailable ({}), trying log search",
                    e
                );
            }
        }

        // a round past the contract's latest can never be located;
        // report it as bad input instead of searching for it
        if let Ok(latest) = self.reader.latest_round_data().await {
            if round > latest.round_id {
                return Err(Error::InvalidRange {
                    reason: format!(
                        "round {round} is beyond the latest round {}",
                        latest.round_id
                    ),
                });
            }
        }

        self.locate_by_logs(round, endpoint).await
    }

    /// Binary search over `NewTransmission` windows.
    async fn locate_by_logs(
        &self,
        round: u32,
        endpoint: Endpoint,
    ) -> Result<u64> {
        let contract = self.reader.address();
        let head = self.gateway.head_block().await?;

        let mut lo = 0u64;
        let mut hi = head;
        if let Some(estimate) = self.estimate_block(round, head).await {
            lo = estimate.saturating_sub(ESTIMATE_MARGIN);
            hi = estimate.saturating_add(ESTIMATE_MARGIN).min(head);
            tracing::debug!(
                round,
                estimate,
                lo,
                hi,
                "narrowed log search from rate estimate"
            );
        }

        let mut best: Option<u64> = None;
        let mut failures = 0usize;
        let mut window = PROBE_WINDOW;
        while lo <= hi {
            let mid = lo + (hi - lo) / 2;
            let probe =
                BlockRange::new(mid, mid.saturating_add(window).min(head));
            let transmissions = match self.reader.transmissions_in(probe).await
            {
                Ok(transmissions) => {
                    window = PROBE_WINDOW;
                    transmissions
                }
                Err(e) if e.is_transient() || e.is_range_too_large() => {
                    failures += 1;
                    if failures >= self.cfg.max_retries {
                        return Err(Error::RoundNotLocatable {
                            contract,
                            round,
                        });
                    }
                    tracing::debug!(
                        round,
                        %probe,
                        "probe failed ({}), shrinking the window",
                        e
                    );
                    window = REDUCED_PROBE_WINDOW;
                    continue;
                }
                Err(e) => return Err(e),
            };

            if transmissions.is_empty() {
                match endpoint {
                    Endpoint::Start => lo = mid + 1,
                    Endpoint::End => {
                        let Some(next) = mid.checked_sub(1) else {
                            break;
                        };
                        hi = next;
                    }
                }
                continue;
            }

            let min_round =
                transmissions.iter().map(|t| t.round_id()).min().unwrap_or(0);
            let max_round =
                transmissions.iter().map(|t| t.round_id()).max().unwrap_or(0);

            if (min_round..=max_round).contains(&round) {
                if let Some(hit) =
                    transmissions.iter().find(|t| t.round_id() == round)
                {
                    self.cache.insert(contract, round, hit.block_number);
                    return Ok(hit.block_number);
                }
                // the window brackets the round id but the event is not
                // there: a gap in the contract's history
                return Err(Error::RoundNotLocatable { contract, round });
            }

            if round < min_round {
                let Some(next) = mid.checked_sub(1) else {
                    break;
                };
                hi = next;
            } else {
                if matches!(endpoint, Endpoint::Start) && max_round < round {
                    best = Some(probe.end);
                }
                lo = probe.end + 1;
            }
        }

        if let Some(block) = best {
            tracing::warn!(
                round,
                block,
                "exact round not found, using closest block"
            );
            self.cache.insert(contract, round, block);
            return Ok(block);
        }
        Err(Error::RoundNotLocatable { contract, round })
    }

    /// Projects a starting block for `round` by linear interpolation
    /// over a recent sample of transmissions.
    async fn estimate_block(&self, round: u32, head: u64) -> Option<u64> {
        let span = SAMPLE_WINDOW.min(self.cfg.rpc_max_range).min(head);
        let sample = self
            .reader
            .transmissions_in(BlockRange::new(head - span, head))
            .await
            .ok()?;
        let (first, last) = (sample.first()?, sample.last()?);
        let (first_round, last_round) =
            (first.round_id() as i64, last.round_id() as i64);
        if last_round <= first_round {
            return None;
        }
        let blocks_per_round = (last.block_number - first.block_number) as f64
            / (last_round - first_round) as f64;
        let offset = round as i64 - last_round;
        let estimate =
            last.block_number as f64 + blocks_per_round * offset as f64;
        if estimate < 0.0 {
            return Some(0);
        }
        Some((estimate as u64).min(head))
    }
}
