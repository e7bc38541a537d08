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

use ethers::types::Address;

use ocr_checker_discovery::{ChainGateway, TransmissionFetcher};
use ocr_checker_utils::cancel::CancelToken;
use ocr_checker_utils::Result;

/// Maps a transmitter to the aggregator contracts it is assigned to.
/// The backing source is opaque: a node-operator job database, or the
/// static fallback below.
#[async_trait::async_trait]
pub trait JobRegistry: Send + Sync {
    /// The contracts `transmitter` is assigned to.
    async fn contracts_for_transmitter(
        &self,
        transmitter: Address,
    ) -> Result<Vec<Address>>;
}

/// The fallback registry: a configured contract list, filtered down to
/// the contracts where the transmitter actually appeared in a recent
/// block window.
pub struct StaticJobRegistry {
    gateway: Arc<dyn ChainGateway>,
    fetcher: TransmissionFetcher,
    contracts: Vec<Address>,
    scan_depth: u64,
}

impl StaticJobRegistry {
    /// Default number of blocks scanned back from head for activity.
    pub const DEFAULT_SCAN_DEPTH: u64 = 1_000;

    /// Creates a registry over the configured `contracts`.
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        fetcher: TransmissionFetcher,
        contracts: Vec<Address>,
    ) -> Self {
        Self {
            gateway,
            fetcher,
            contracts,
            scan_depth: Self::DEFAULT_SCAN_DEPTH,
        }
    }

    /// Overrides the activity scan depth.
    pub fn with_scan_depth(mut self, scan_depth: u64) -> Self {
        self.scan_depth = scan_depth;
        self
    }
}

#[async_trait::async_trait]
impl JobRegistry for StaticJobRegistry {
    async fn contracts_for_transmitter(
        &self,
        transmitter: Address,
    ) -> Result<Vec<Address>> {
        let head = self.gateway.head_block().await?;
        let start = head.saturating_sub(self.scan_depth);
        let mut active = Vec::new();
        for contract in &self.contracts {
            let recent = self
                .fetcher
                .fetch_by_blocks(*contract, start, head, &CancelToken::new())
                .await;
            match recent {
                Ok(result)
                    if result
                        .transmissions
                        .iter()
                        .any(|t| t.transmitter == transmitter) =>
                {
                    tracing::debug!(
                        ?contract,
                        ?transmitter,
                        "transmitter recently active on contract"
                    );
                    active.push(*contract);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(
                        ?contract,
                        "skipping contract, recent-activity scan failed: {}",
                        e
                    );
                }
            }
        }
        Ok(active)
    }
}
