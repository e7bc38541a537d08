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

//! # OCR Checker Configuration Module 🕸️
//!
//! A module for configuring the checker.
//!
//! ## Overview
//!
//! Possible configuration includes:
//! * `port`: The port the metrics endpoint will listen on. Defaults to 9955.
//! * `evm`: the watched EVM networks and their aggregator contracts.
//! * `discovery`: the transmission discovery engine knobs.
//! * `monitor`: the scheduled watch / alerting surface.

/// CLI configuration
#[cfg(feature = "cli")]
pub mod cli;
/// Serde default values.
pub mod defaults;
/// Discovery engine configuration.
pub mod discovery;
/// EVM configuration.
pub mod evm;
/// Monitor & alerting configuration.
pub mod monitor;
/// Utils for processing configuration.
pub mod utils;

use std::collections::HashMap;

use discovery::DiscoveryConfig;
use evm::EvmChainConfig;
use monitor::MonitorConfig;
use serde::{Deserialize, Serialize};

/// OcrCheckerConfig is the configuration for the OCR checker.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct OcrCheckerConfig {
    /// HTTP server port for the metrics scrape endpoint.
    ///
    /// default to 9955
    #[serde(default = "defaults::port", skip_serializing)]
    pub port: u16,
    /// EVM based networks and the configuration.
    ///
    /// a map between chain name and its configuration.
    #[serde(default)]
    pub evm: HashMap<String, EvmChainConfig>,
    /// Transmission discovery engine knobs.
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    /// Scheduled watch & alerting configuration.
    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl Default for OcrCheckerConfig {
    fn default() -> Self {
        Self {
            port: defaults::port(),
            evm: HashMap::new(),
            discovery: DiscoveryConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl OcrCheckerConfig {
    /// Looks up a chain configuration by its chain id.
    pub fn chain(
        &self,
        chain_id: u32,
    ) -> ocr_checker_utils::Result<&EvmChainConfig> {
        self.evm
            .get(&chain_id.to_string())
            .ok_or_else(|| ocr_checker_utils::Error::ChainNotFound {
                chain_id: chain_id.to_string(),
            })
    }
}
