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

use ethers::types::Address;
use ocr_checker_types::RpcUrl;
use serde::{Deserialize, Serialize};

/// EvmChainConfig is the configuration for one watched EVM network.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct EvmChainConfig {
    /// String that groups configuration for this chain on a
    /// human-readable name.
    pub name: String,
    /// Boolean indicating this network is enabled or not.
    #[serde(default)]
    pub enabled: bool,
    /// Http(s) Endpoint for quick Req/Res
    #[serde(skip_serializing)]
    pub http_endpoint: RpcUrl,
    /// chain specific id (output of chainId opcode on EVM networks)
    #[serde(rename(serialize = "chainId"))]
    pub chain_id: u32,
    /// Average seconds between blocks on this chain; seeds the block
    /// locator's first cadence estimate when the head sample is unusable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_time_seconds: Option<u64>,
    /// The OCR2 aggregator contracts watched on this chain.
    #[serde(default)]
    pub contracts: Vec<AggregatorContractConfig>,
}

/// One watched OCR2 aggregator contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AggregatorContractConfig {
    /// The address of this contract on this chain.
    pub address: Address,
    /// The block number where this contract got deployed at, used as the
    /// lower bound for log searches when known.
    #[serde(rename(serialize = "deployedAt"))]
    pub deployed_at: Option<u64>,
}
