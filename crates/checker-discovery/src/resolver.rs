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

//! The attribution pass: joins raw `NewTransmission` events against the
//! config timeline to produce fully populated transmission records.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};

use ocr_checker_types::{
    ObserverRecord, Transmission, UNKNOWN_OBSERVER,
};
use ocr_checker_utils::{Error, Result};

use crate::aggregator::{AggregatorReader, RawTransmission};
use crate::gateway::ChainGateway;
use crate::timeline::{ConfigTimeline, TimelineEntry};

/// Attributes `raw` (already merged and ordered) against `timeline`,
/// producing the final transmission records in the same order.
pub(crate) async fn resolve(
    reader: &AggregatorReader,
    gateway: &Arc<dyn ChainGateway>,
    timeline: &mut ConfigTimeline,
    raw: Vec<RawTransmission>,
) -> Result<Vec<Transmission>> {
    // one timestamp lookup per unique block, issued concurrently under
    // the shared rpc gate
    let mut blocks: Vec<u64> = raw.iter().map(|t| t.block_number).collect();
    blocks.sort_unstable();
    blocks.dedup();
    let lookups = blocks.iter().map(|block| {
        let gateway = gateway.clone();
        let block = *block;
        async move { Ok::<_, Error>((block, gateway.block_time(block).await?)) }
    });
    let times: HashMap<u64, u64> =
        futures::future::try_join_all(lookups).await?.into_iter().collect();

    let mut out = Vec::with_capacity(raw.len());
    for event in raw {
        let digest = event.config_digest();
        if timeline.resolve(event.block_number, &digest).is_none() {
            // a config change slipped between emission and read; ask the
            // contract for the roster as of the event's block
            match reader.transmitters(Some(event.block_number)).await {
                Ok(transmitters) => {
                    timeline.insert_synthetic(TimelineEntry {
                        first_seen_block: event.block_number,
                        config_digest: digest,
                        roster: transmitters.into(),
                        layout: event.layout(),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        block = event.block_number,
                        "historical roster lookup unsupported ({}), \
                         attributing with unknown indices",
                        e
                    );
                }
            }
        }

        let roster = timeline
            .resolve(event.block_number, &digest)
            .map(|entry| entry.roster.clone())
            .unwrap_or_default();
        timeline.record_layout(event.block_number, &digest, event.layout());

        let transmitter_index = roster
            .position(event.event.transmitter)
            .unwrap_or(UNKNOWN_OBSERVER);
        if transmitter_index == UNKNOWN_OBSERVER {
            tracing::warn!(
                block = event.block_number,
                transmitter = ?event.event.transmitter,
                "transmitter not found in the active roster"
            );
        }

        let mut observers = Vec::with_capacity(event.event.observers.len());
        for &index in event.event.observers.iter() {
            match roster.get(index) {
                Some(address) => {
                    observers.push(ObserverRecord { index, address })
                }
                None => tracing::warn!(
                    block = event.block_number,
                    observer = index,
                    roster_size = roster.len(),
                    "observer index outside the active roster"
                ),
            }
        }

        let seconds =
            times.get(&event.block_number).copied().ok_or_else(|| {
                Error::Internal(format!(
                    "no timestamp for block {}",
                    event.block_number
                ))
            })?;
        let block_timestamp = Utc
            .timestamp_opt(seconds as i64, 0)
            .single()
            .ok_or_else(|| {
                Error::Internal(format!("invalid block timestamp {seconds}"))
            })?;

        out.push(Transmission {
            contract: reader.address(),
            config_digest: digest,
            round_id: event.round_id(),
            epoch: event.epoch(),
            round: event.round(),
            answer: event.event.answer,
            transmitter: event.event.transmitter,
            transmitter_index,
            observers,
            observations_timestamp: event.event.observations_timestamp,
            block_number: event.block_number,
            log_index: event.log_index,
            block_timestamp,
        });
    }
    Ok(out)
}
