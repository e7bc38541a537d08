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

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use ocr_checker_utils::Result;

use crate::gateway::ChainGateway;

/// Fallback seconds-per-block when neither the head sample nor a
/// configured hint yields a cadence.
const DEFAULT_CADENCE_SECS: u64 = 12;

/// Hard cap on binary-search probes per lookup.
const MAX_PROBES: usize = 50;

/// Finds the block whose timestamp is nearest a target unix time, by an
/// estimate-then-binary-search over `blockTime` lookups.
pub struct BlockLocator {
    gateway: Arc<dyn ChainGateway>,
    cadence_hint: Option<u64>,
}

impl BlockLocator {
    /// Creates a locator. `cadence_hint` seeds the seconds-per-block
    /// estimate for chains whose head sample is unusable (merged blocks,
    /// identical timestamps).
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        cadence_hint: Option<u64>,
    ) -> Self {
        Self {
            gateway,
            cadence_hint,
        }
    }

    /// The block number whose timestamp is closest to `target` (unix
    /// seconds). Targets at or past the head clamp to the head.
    pub async fn locate(&self, target: u64) -> Result<u64> {
        // memoized lookups keep the probe budget at one fetch per block
        let mut memo: HashMap<u64, u64> = HashMap::new();
        let head = self.gateway.head_block().await?;
        let head_time = self.time_at(&mut memo, head).await?;
        if target >= head_time {
            return Ok(head);
        }

        let cadence = self.cadence(&mut memo, head, head_time).await;
        let blocks_behind = (head_time - target).div_ceil(cadence.max(1));
        let guess = head.saturating_sub(blocks_behind);
        tracing::trace!(
            target,
            head,
            cadence,
            guess,
            "locating block by timestamp"
        );

        let mut lo = 0u64;
        let mut hi = head;
        // the first iteration probes the cadence estimate instead of the
        // midpoint; every later probe bisects
        let mut forced = Some(guess);
        for _ in 0..MAX_PROBES {
            if hi - lo <= 1 {
                break;
            }
            let mid = forced
                .take()
                .filter(|g| *g > lo && *g < hi)
                .unwrap_or(lo + (hi - lo) / 2);
            let mid_time = self.time_at(&mut memo, mid).await?;
            match mid_time.cmp(&target) {
                Ordering::Equal => return Ok(mid),
                Ordering::Less => lo = mid,
                Ordering::Greater => hi = mid,
            }
        }

        let lo_time = self.time_at(&mut memo, lo).await?;
        let hi_time = self.time_at(&mut memo, hi).await?;
        let (closest, residual) =
            if target.abs_diff(hi_time) < target.abs_diff(lo_time) {
                (hi, target.abs_diff(hi_time))
            } else {
                (lo, target.abs_diff(lo_time))
            };
        if residual <= cadence {
            Ok(closest)
        } else {
            Ok(lo)
        }
    }

    /// Estimates seconds-per-block from the head and its parent, falling
    /// back to the configured hint when the sample is unusable.
    async fn cadence(
        &self,
        memo: &mut HashMap<u64, u64>,
        head: u64,
        head_time: u64,
    ) -> u64 {
        let fallback =
            || self.cadence_hint.unwrap_or(DEFAULT_CADENCE_SECS);
        let Some(prev) = head.checked_sub(1) else {
            return fallback();
        };
        match self.time_at(memo, prev).await {
            Ok(prev_time) if prev_time < head_time => head_time - prev_time,
            _ => fallback(),
        }
    }

    async fn time_at(
        &self,
        memo: &mut HashMap<u64, u64>,
        block: u64,
    ) -> Result<u64> {
        if let Some(time) = memo.get(&block) {
            return Ok(*time);
        }
        let time = self.gateway.block_time(block).await?;
        memo.insert(block, time);
        Ok(time)
    }
}
