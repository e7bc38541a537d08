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

//! The discovery facade: the three public harvest operations plus the
//! streaming variant.
//!
//! Every call owns its own config timeline and result accumulator; the
//! round cache and the RPC fan-out gate are shared engine state handed
//! in at construction. All calls are cancellable through a token and
//! never return partial output.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ethers::types::Address;
use tokio::sync::{mpsc, Semaphore};

use ocr_checker_config::discovery::DiscoveryConfig;
use ocr_checker_types::{BlockRange, Roster, Transmission, TransmissionResult};
use ocr_checker_utils::cancel::CancelToken;
use ocr_checker_utils::metric::Metrics;
use ocr_checker_utils::{probe, Error, Result};

use crate::aggregator::AggregatorReader;
use crate::cache::RoundBlockCache;
use crate::gateway::{ChainGateway, GatedGateway};
use crate::harvester::{fetch_chunk, run_sweep};
use crate::locator::{BlockLocator, Endpoint, RoundLocator};
use crate::planner::plan_chunks;
use crate::resolver;
use crate::timeline::ConfigTimeline;

/// One completed chunk of a streaming harvest.
#[derive(Debug)]
pub struct ChunkEvent {
    /// First block of the chunk this event covers.
    pub start_block: u64,
    /// The attributed transmissions of the chunk, ordered.
    pub transmissions: Vec<Transmission>,
    /// Set on the terminal event when the harvest failed; the channel
    /// closes right after.
    pub error: Option<Error>,
}

/// The transmission discovery engine's public entry points.
#[derive(Clone)]
pub struct TransmissionFetcher {
    gateway: Arc<dyn ChainGateway>,
    cfg: DiscoveryConfig,
    cache: Arc<RoundBlockCache>,
    cadence_hint: Option<u64>,
}

impl TransmissionFetcher {
    /// Builds a fetcher over `gateway`. The `gate` semaphore and the
    /// round `cache` are shared across every fetcher built on the same
    /// engine instance; both are owned by the caller, not by globals.
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        cfg: DiscoveryConfig,
        gate: Arc<Semaphore>,
        cache: Arc<RoundBlockCache>,
        metrics: Option<Arc<Metrics>>,
        cadence_hint: Option<u64>,
    ) -> Self {
        let gateway: Arc<dyn ChainGateway> =
            Arc::new(GatedGateway::new(gateway, gate, metrics));
        Self {
            gateway,
            cfg,
            cache,
            cadence_hint,
        }
    }

    /// A schema-aware reader for `contract` over this engine's gated
    /// gateway; downstream consumers use it for the latest-round and
    /// roster view calls.
    pub fn reader(&self, contract: Address) -> AggregatorReader {
        AggregatorReader::new(self.gateway.clone(), contract)
    }

    fn round_locator(&self, contract: Address) -> RoundLocator {
        RoundLocator::new(
            self.gateway.clone(),
            self.reader(contract),
            BlockLocator::new(self.gateway.clone(), self.cadence_hint),
            self.cache.clone(),
            self.cfg,
        )
    }

    /// Every transmission whose round id falls in
    /// `[start_round, end_round]`, exactly once, ordered.
    pub async fn fetch_by_rounds(
        &self,
        contract: Address,
        start_round: u32,
        end_round: u32,
        cancel: &CancelToken,
    ) -> Result<TransmissionResult> {
        if start_round > end_round {
            return Err(Error::InvalidRange {
                reason: format!(
                    "invalid round range: start={start_round}, end={end_round}"
                ),
            });
        }
        if end_round - start_round > self.cfg.max_round_span {
            return Err(Error::InvalidRange {
                reason: format!(
                    "round span {} exceeds the cap of {}",
                    end_round - start_round,
                    self.cfg.max_round_span
                ),
            });
        }

        self.guarded(cancel, |call| {
            let this = self.clone();
            async move {
                tracing::event!(
                    target: probe::TARGET,
                    tracing::Level::TRACE,
                    kind = %probe::Kind::Locating,
                    contract = ?contract,
                    start_round,
                    end_round,
                );
                let locator = this.round_locator(contract);
                // both endpoints are located in parallel
                let (a, b) = tokio::try_join!(
                    locator.locate(start_round, Endpoint::Start),
                    locator.locate(end_round, Endpoint::End),
                )?;
                let window = BlockRange::new(a.min(b), a.max(b));
                let mut result =
                    this.harvest(contract, window, &call).await?;
                result
                    .transmissions
                    .retain(|t| {
                        (start_round..=end_round).contains(&t.round_id)
                    });
                result.start_round = start_round;
                result.end_round = end_round;
                Ok(result)
            }
        })
        .await
    }

    /// Every transmission in `[start_block, end_block]`, exactly once,
    /// ordered. The result's round bounds are the min/max found.
    pub async fn fetch_by_blocks(
        &self,
        contract: Address,
        start_block: u64,
        end_block: u64,
        cancel: &CancelToken,
    ) -> Result<TransmissionResult> {
        if start_block > end_block {
            return Err(Error::InvalidRange {
                reason: format!(
                    "invalid block range: start={start_block}, end={end_block}"
                ),
            });
        }
        let window = BlockRange::new(start_block, end_block);
        self.guarded(cancel, |call| {
            let this = self.clone();
            async move { this.harvest(contract, window, &call).await }
        })
        .await
    }

    /// Every transmission between two wall-clock instants; endpoints are
    /// translated through the block locator in parallel.
    pub async fn fetch_by_time(
        &self,
        contract: Address,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> Result<TransmissionResult> {
        if start_time > end_time {
            return Err(Error::InvalidRange {
                reason: format!(
                    "invalid time range: start={start_time}, end={end_time}"
                ),
            });
        }
        self.guarded(cancel, |call| {
            let this = self.clone();
            async move {
                tracing::event!(
                    target: probe::TARGET,
                    tracing::Level::TRACE,
                    kind = %probe::Kind::Locating,
                    contract = ?contract,
                    start = %start_time,
                    end = %end_time,
                );
                let locator =
                    BlockLocator::new(this.gateway.clone(), this.cadence_hint);
                let (a, b) = tokio::try_join!(
                    locator.locate(start_time.timestamp() as u64),
                    locator.locate(end_time.timestamp() as u64),
                )?;
                let window = BlockRange::new(a.min(b), a.max(b));
                this.harvest(contract, window, &call).await
            }
        })
        .await
    }

    /// The streaming variant of [`Self::fetch_by_blocks`]: per-chunk
    /// events over a bounded channel, in chunk order, closed exactly
    /// once. A failed harvest surfaces one terminal event carrying the
    /// error before the channel closes.
    pub fn stream_by_blocks(
        &self,
        contract: Address,
        start_block: u64,
        end_block: u64,
        cancel: &CancelToken,
        capacity: usize,
    ) -> mpsc::Receiver<ChunkEvent> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        if start_block > end_block {
            let tx_err = tx;
            tokio::spawn(async move {
                let _ = tx_err
                    .send(ChunkEvent {
                        start_block,
                        transmissions: vec![],
                        error: Some(Error::InvalidRange {
                            reason: format!(
                                "invalid block range: start={start_block}, \
                                 end={end_block}"
                            ),
                        }),
                    })
                    .await;
            });
            return rx;
        }
        let this = self.clone();
        let mut ext = cancel.signal();
        tokio::spawn(async move {
            let call = CancelToken::new();
            let _guard = call.drop_guard();
            let window = BlockRange::new(start_block, end_block);
            let driver = this.stream_window(contract, window, &call, &tx);
            let result = ext.guard(driver).await.and_then(|inner| inner);
            if let Err(e) = result {
                let _ = tx
                    .send(ChunkEvent {
                        start_block,
                        transmissions: vec![],
                        error: Some(e),
                    })
                    .await;
            }
            // tx drops here; the channel closes exactly once
        });
        rx
    }

    /// Wraps an inner call with the caller token: a child token scopes
    /// the spawned chunk tasks to this call, and firing the caller's
    /// token abandons the call and tears the children down.
    async fn guarded<F, Fut>(
        &self,
        cancel: &CancelToken,
        make: F,
    ) -> Result<TransmissionResult>
    where
        F: FnOnce(CancelToken) -> Fut,
        Fut: std::future::Future<Output = Result<TransmissionResult>>,
    {
        let call = CancelToken::new();
        let _guard = call.drop_guard();
        let mut ext = cancel.signal();
        let inner = make(call.clone());
        match ext.guard(inner).await {
            Ok(result) => match result {
                Err(_) if cancel.is_cancelled() => Err(Error::Cancelled),
                other => other,
            },
            Err(_) => Err(Error::Cancelled),
        }
    }

    /// The shared harvest pipeline: plan, dual sweep, seed, attribute.
    async fn harvest(
        &self,
        contract: Address,
        window: BlockRange,
        call: &CancelToken,
    ) -> Result<TransmissionResult> {
        let chunks =
            plan_chunks(window, self.cfg.rpc_max_range, self.cfg.max_concurrency);
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::TRACE,
            kind = %probe::Kind::Planning,
            contract = ?contract,
            window = %window,
            chunks = chunks.len(),
        );
        tracing::debug!(
            ?contract,
            %window,
            chunks = chunks.len(),
            "harvesting transmissions"
        );

        tracing::event!(
            target: probe::TARGET,
            tracing::Level::TRACE,
            kind = %probe::Kind::Harvesting,
            contract = ?contract,
        );
        let reader = self.reader(contract);
        let transmissions_reader = reader.clone();
        let configs_reader = reader.clone();
        let sweep_transmissions = run_sweep(&chunks, self.cfg, call, move |range| {
            let reader = transmissions_reader.clone();
            async move { reader.transmissions_in(range).await }
        });
        let sweep_configs = run_sweep(&chunks, self.cfg, call, move |range| {
            let reader = configs_reader.clone();
            async move { reader.configs_in(range).await }
        });
        let (transmissions_res, configs_res) =
            tokio::join!(sweep_transmissions, sweep_configs);
        let (mut raw_transmissions, mut raw_configs) =
            match (transmissions_res, configs_res) {
                (Ok(t), Ok(c)) => (t, c),
                (Err(e), Ok(_)) | (Ok(_), Err(e)) => return Err(e),
                // a fatal error in one sweep cancels the other; surface
                // the root cause, not the cancellation it triggered
                (Err(Error::Cancelled), Err(e)) => return Err(e),
                (Err(e), Err(_)) => return Err(e),
            };
        raw_transmissions.sort_by_key(|t| (t.block_number, t.log_index));
        raw_configs.sort_by_key(|c| (c.block_number, c.log_index));

        if raw_transmissions.is_empty() {
            return Ok(TransmissionResult {
                contract,
                start_round: 0,
                end_round: 0,
                transmissions: vec![],
            });
        }

        let seed = self.seed_roster(&reader).await;
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::TRACE,
            kind = %probe::Kind::Resolving,
            contract = ?contract,
            events = raw_transmissions.len(),
            configs = raw_configs.len(),
        );
        let mut timeline = ConfigTimeline::build(seed, &raw_configs);
        let transmissions = resolver::resolve(
            &reader,
            &self.gateway,
            &mut timeline,
            raw_transmissions,
        )
        .await?;

        let start_round =
            transmissions.iter().map(|t| t.round_id).min().unwrap_or(0);
        let end_round =
            transmissions.iter().map(|t| t.round_id).max().unwrap_or(0);
        Ok(TransmissionResult {
            contract,
            start_round,
            end_round,
            transmissions,
        })
    }

    /// The roster active before the first `ConfigSet` in the window,
    /// from the latest view calls. Best effort: without it, attribution
    /// falls back to historical gap-filling.
    async fn seed_roster(
        &self,
        reader: &AggregatorReader,
    ) -> Option<(ocr_checker_types::ConfigDigest, Roster)> {
        match tokio::try_join!(
            reader.latest_config_details(),
            reader.transmitters(None),
        ) {
            Ok(((_, _, digest), transmitters)) => {
                Some((digest, Roster::new(transmitters)))
            }
            Err(e) => {
                tracing::warn!(
                    "could not seed the config timeline from view calls: {}",
                    e
                );
                None
            }
        }
    }

    /// Drives a streaming harvest: timeline first, then per-chunk
    /// transmission sweeps forwarded in chunk order.
    async fn stream_window(
        &self,
        contract: Address,
        window: BlockRange,
        call: &CancelToken,
        tx: &mpsc::Sender<ChunkEvent>,
    ) -> Result<()> {
        let chunks =
            plan_chunks(window, self.cfg.rpc_max_range, self.cfg.max_concurrency);
        let reader = self.reader(contract);

        // drain the config sweep before any chunk is resolved, so every
        // chunk sees the same timeline snapshot
        let configs_reader = reader.clone();
        let mut raw_configs =
            run_sweep(&chunks, self.cfg, call, move |range| {
                let reader = configs_reader.clone();
                async move { reader.configs_in(range).await }
            })
            .await?;
        raw_configs.sort_by_key(|c| (c.block_number, c.log_index));
        let seed = self.seed_roster(&reader).await;
        let mut timeline = ConfigTimeline::build(seed, &raw_configs);

        let (chunk_tx, mut chunk_rx) =
            mpsc::unbounded_channel::<(usize, Result<_>)>();
        for (index, chunk) in chunks.iter().enumerate() {
            let chunk_tx = chunk_tx.clone();
            let chunk_reader = reader.clone();
            let task = fetch_chunk(*chunk, self.cfg, call.clone(), move |range| {
                let reader = chunk_reader.clone();
                async move { reader.transmissions_in(range).await }
            });
            tokio::spawn(async move {
                let _ = chunk_tx.send((index, task.await));
            });
        }
        drop(chunk_tx);

        let mut pending = BTreeMap::new();
        let mut next = 0usize;
        while let Some((index, result)) = chunk_rx.recv().await {
            pending.insert(index, result?);
            while let Some(raw) = pending.remove(&next) {
                let transmissions = resolver::resolve(
                    &reader,
                    &self.gateway,
                    &mut timeline,
                    raw,
                )
                .await?;
                let event = ChunkEvent {
                    start_block: chunks[next].start,
                    transmissions,
                    error: None,
                };
                if tx.send(event).await.is_err() {
                    // receiver hung up; stop harvesting
                    return Ok(());
                }
                next += 1;
            }
        }
        Ok(())
    }
}
