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

#![warn(missing_docs)]
//! # Checker Context Module 🕸️
//!
//! A module for managing the context of the checker service.

use std::sync::Arc;
use std::time::Duration;

use ethers::providers::{Http, Provider};
use tokio::sync::Semaphore;

use ocr_checker_config::OcrCheckerConfig;
use ocr_checker_utils::cancel::{CancelSignal, CancelToken};
use ocr_checker_utils::metric::Metrics;

/// CheckerContext contains the checker's configuration and the process
/// wide shared state: the metrics registry, the shutdown token, and the
/// semaphore gating outbound RPC fan-out across every running harvest.
#[derive(Clone)]
pub struct CheckerContext {
    /// The configuration of the checker.
    pub config: OcrCheckerConfig,
    /// Represents the metrics for the checker.
    pub metrics: Arc<Metrics>,
    /// Broadcasts a shutdown signal to all active tasks. Harvest calls
    /// derive their cancellation signals from it, so a shutdown also
    /// aborts in-flight discovery work.
    shutdown: CancelToken,
    /// Caps simultaneous outbound RPC calls across all harvests.
    rpc_gate: Arc<Semaphore>,
}

impl CheckerContext {
    /// Creates a new CheckerContext.
    pub fn new(
        config: OcrCheckerConfig,
    ) -> ocr_checker_utils::Result<Self> {
        let metrics = Arc::new(Metrics::new()?);
        let rpc_gate =
            Arc::new(Semaphore::new(config.discovery.max_concurrency));
        Ok(Self {
            config,
            metrics,
            shutdown: CancelToken::new(),
            rpc_gate,
        })
    }

    /// Returns a signal handle for the shutdown token.
    pub fn shutdown_signal(&self) -> CancelSignal {
        self.shutdown.signal()
    }

    /// The shutdown token itself, for deriving per-call cancellation.
    pub fn shutdown_token(&self) -> &CancelToken {
        &self.shutdown
    }

    /// Sends a shutdown signal to all subscribed tasks.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// The process-wide RPC fan-out gate.
    pub fn rpc_gate(&self) -> Arc<Semaphore> {
        self.rpc_gate.clone()
    }

    /// Returns a new `Provider` for the given chain.
    pub fn evm_provider(
        &self,
        chain_id: u32,
    ) -> ocr_checker_utils::Result<Provider<Http>> {
        let chain_config = self.config.chain(chain_id)?;
        let provider =
            Provider::try_from(chain_config.http_endpoint.as_str())?
                .interval(Duration::from_millis(5u64));
        Ok(provider)
    }
}
