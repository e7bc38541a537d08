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

//! Schema knowledge for the OCR2 aggregator contract: the two event
//! layouts the engine decodes and the view calls it issues. Everything
//! here goes through the [`ChainGateway`], never a concrete provider,
//! so the whole reader runs unchanged against the in-memory fake.

use std::sync::Arc;

use ethers::abi::{AbiDecode, AbiEncode, RawLog};
use ethers::contract::{EthCall, EthEvent};
use ethers::types::{Address, Bytes, Log, I256, U256};

use ocr_checker_types::{packed_round_id, BlockRange, ConfigDigest, RoundIdLayout};
use ocr_checker_utils::{Error, Result};

use crate::gateway::ChainGateway;

/// The `NewTransmission` event of the OCR2 aggregator.
#[derive(Clone, Debug, PartialEq, EthEvent)]
#[ethevent(
    name = "NewTransmission",
    abi = "NewTransmission(uint32,int192,address,uint32,int192[],bytes,int192,bytes32,uint40)"
)]
pub struct NewTransmissionFilter {
    /// Native round id; zero on older contract variants that only carry
    /// the packed epoch-and-round.
    #[ethevent(indexed)]
    pub aggregator_round_id: u32,
    /// The aggregated answer.
    pub answer: I256,
    /// The node that submitted the report.
    pub transmitter: Address,
    /// When the observations were made.
    pub observations_timestamp: u32,
    /// The individual observations behind the answer.
    pub observations: Vec<I256>,
    /// Observer roster indices, one byte each, in observation order.
    pub observers: Bytes,
    /// LINK/fee-coin exchange rate used for billing.
    pub juels_per_fee_coin: I256,
    /// Digest of the config the report was signed under.
    pub config_digest: [u8; 32],
    /// Packed `(epoch << 8) | subround`.
    pub epoch_and_round: U256,
}

/// The `ConfigSet` event of the OCR2 aggregator.
#[derive(Clone, Debug, PartialEq, EthEvent)]
#[ethevent(
    name = "ConfigSet",
    abi = "ConfigSet(uint32,bytes32,uint64,address[],address[],uint8,bytes,uint64,bytes)"
)]
pub struct ConfigSetFilter {
    /// Block of the previous config change.
    pub previous_config_block_number: u32,
    /// Digest naming the new configuration.
    pub config_digest: [u8; 32],
    /// How many configs this contract has seen.
    pub config_count: u64,
    /// Report signing keys.
    pub signers: Vec<Address>,
    /// The transmitter roster; position is the observer index.
    pub transmitters: Vec<Address>,
    /// Fault tolerance.
    pub f: u8,
    /// Opaque on-chain config blob.
    pub onchain_config: Bytes,
    /// Version of the off-chain config encoding.
    pub offchain_config_version: u64,
    /// Opaque off-chain config blob.
    pub offchain_config: Bytes,
}

#[derive(Clone, Debug, EthCall)]
#[ethcall(name = "latestConfigDetails", abi = "latestConfigDetails()")]
pub(crate) struct LatestConfigDetailsCall;

#[derive(Clone, Debug, EthCall)]
#[ethcall(name = "getTransmitters", abi = "getTransmitters()")]
pub(crate) struct GetTransmittersCall;

#[derive(Clone, Debug, EthCall)]
#[ethcall(name = "getTimestamp", abi = "getTimestamp(uint256)")]
pub(crate) struct GetTimestampCall {
    pub(crate) round_id: U256,
}

#[derive(Clone, Debug, EthCall)]
#[ethcall(name = "latestRoundData", abi = "latestRoundData()")]
pub(crate) struct LatestRoundDataCall;

/// A decoded `NewTransmission` event plus its on-chain position.
#[derive(Clone, Debug)]
pub struct RawTransmission {
    /// The decoded event.
    pub event: NewTransmissionFilter,
    /// Block the event landed in.
    pub block_number: u64,
    /// Index of the log within its block.
    pub log_index: u64,
}

impl RawTransmission {
    /// The logical round id, preferring the native field and falling
    /// back to the packed epoch-and-round.
    pub fn round_id(&self) -> u32 {
        if self.event.aggregator_round_id != 0 {
            self.event.aggregator_round_id
        } else {
            packed_round_id(self.epoch(), self.round())
        }
    }

    /// Which round-id layout [`Self::round_id`] used.
    pub fn layout(&self) -> RoundIdLayout {
        if self.event.aggregator_round_id != 0 {
            RoundIdLayout::Native
        } else {
            RoundIdLayout::EpochAndRound
        }
    }

    /// Epoch part of the packed epoch-and-round.
    pub fn epoch(&self) -> u32 {
        (self.event.epoch_and_round.as_u64() >> 8) as u32
    }

    /// Subround part of the packed epoch-and-round.
    pub fn round(&self) -> u8 {
        (self.event.epoch_and_round.as_u64() & 0xff) as u8
    }

    /// Digest of the config the report was signed under.
    pub fn config_digest(&self) -> ConfigDigest {
        self.event.config_digest
    }
}

/// A decoded `ConfigSet` event plus its on-chain position.
#[derive(Clone, Debug)]
pub struct RawConfigSet {
    /// The decoded event.
    pub event: ConfigSetFilter,
    /// Block the event landed in.
    pub block_number: u64,
    /// Index of the log within its block.
    pub log_index: u64,
}

/// The answer of `latestRoundData`.
#[derive(Clone, Copy, Debug)]
pub struct LatestRound {
    /// The latest round id.
    pub round_id: u32,
    /// The latest answer.
    pub answer: I256,
    /// When the latest answer was updated, unix seconds.
    pub updated_at: u64,
}

/// Per-contract facade over the gateway with schema knowledge for the
/// OCR2 aggregator. It never batches across contracts.
#[derive(Clone)]
pub struct AggregatorReader {
    gateway: Arc<dyn ChainGateway>,
    contract: Address,
}

impl AggregatorReader {
    /// Creates a reader for `contract` on top of `gateway`.
    pub fn new(gateway: Arc<dyn ChainGateway>, contract: Address) -> Self {
        Self { gateway, contract }
    }

    /// The aggregator address this reader queries.
    pub fn address(&self) -> Address {
        self.contract
    }

    fn position_of(log: &Log) -> Result<(u64, u64)> {
        let block = log
            .block_number
            .ok_or_else(|| Error::Internal("log without block number".into()))?
            .as_u64();
        let index = log
            .log_index
            .ok_or_else(|| Error::Internal("log without log index".into()))?
            .as_u64();
        Ok((block, index))
    }

    /// All `NewTransmission` events in `range`, ordered by
    /// `(block_number, log_index)`.
    pub async fn transmissions_in(
        &self,
        range: BlockRange,
    ) -> Result<Vec<RawTransmission>> {
        let logs = self
            .gateway
            .query_logs(self.contract, NewTransmissionFilter::signature(), range)
            .await?;
        let mut out = Vec::with_capacity(logs.len());
        for log in logs {
            let (block_number, log_index) = Self::position_of(&log)?;
            let event =
                <NewTransmissionFilter as EthEvent>::decode_log(&RawLog::from(log))?;
            out.push(RawTransmission {
                event,
                block_number,
                log_index,
            });
        }
        out.sort_by_key(|t| (t.block_number, t.log_index));
        Ok(out)
    }

    /// All `ConfigSet` events in `range`, ordered by
    /// `(block_number, log_index)`.
    pub async fn configs_in(
        &self,
        range: BlockRange,
    ) -> Result<Vec<RawConfigSet>> {
        let logs = self
            .gateway
            .query_logs(self.contract, ConfigSetFilter::signature(), range)
            .await?;
        let mut out = Vec::with_capacity(logs.len());
        for log in logs {
            let (block_number, log_index) = Self::position_of(&log)?;
            let event = <ConfigSetFilter as EthEvent>::decode_log(&RawLog::from(log))?;
            out.push(RawConfigSet {
                event,
                block_number,
                log_index,
            });
        }
        out.sort_by_key(|c| (c.block_number, c.log_index));
        Ok(out)
    }

    /// `latestRoundData()`.
    pub async fn latest_round_data(&self) -> Result<LatestRound> {
        let ret = self
            .gateway
            .call(self.contract, LatestRoundDataCall.encode().into(), None)
            .await?;
        let (round_id, answer, _started_at, updated_at, _answered_in) =
            <(U256, I256, U256, U256, U256)>::decode(ret)?;
        Ok(LatestRound {
            round_id: round_id.low_u32(),
            answer,
            updated_at: updated_at.as_u64(),
        })
    }

    /// `latestConfigDetails()`: `(config_count, block_number, digest)`.
    pub async fn latest_config_details(
        &self,
    ) -> Result<(u32, u64, ConfigDigest)> {
        let ret = self
            .gateway
            .call(self.contract, LatestConfigDetailsCall.encode().into(), None)
            .await?;
        let (config_count, block_number, digest) =
            <(u32, u32, [u8; 32])>::decode(ret)?;
        Ok((config_count, block_number as u64, digest))
    }

    /// `getTransmitters()`, optionally at a historical block. The
    /// historical form backs attribution gap-filling; not every node
    /// supports it, in which case the call errors and the caller
    /// degrades.
    pub async fn transmitters(
        &self,
        at_block: Option<u64>,
    ) -> Result<Vec<Address>> {
        let ret = self
            .gateway
            .call(self.contract, GetTransmittersCall.encode().into(), at_block)
            .await?;
        Ok(<Vec<Address>>::decode(ret)?)
    }

    /// `getTimestamp(round)`: `None` when the contract reports zero,
    /// meaning it does not index that round.
    pub async fn round_timestamp(&self, round: u32) -> Result<Option<u64>> {
        let ret = self
            .gateway
            .call(
                self.contract,
                GetTimestampCall {
                    round_id: U256::from(round),
                }
                .encode()
                .into(),
                None,
            )
            .await?;
        let ts = U256::decode(ret)?;
        Ok((!ts.is_zero()).then(|| ts.as_u64()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_id_prefers_the_native_field() {
        let event = NewTransmissionFilter {
            aggregator_round_id: 42,
            answer: I256::zero(),
            transmitter: Address::zero(),
            observations_timestamp: 0,
            observations: vec![],
            observers: Bytes::new(),
            juels_per_fee_coin: I256::zero(),
            config_digest: [0u8; 32],
            epoch_and_round: U256::from(0x0107u64),
        };
        let raw = RawTransmission {
            event,
            block_number: 1,
            log_index: 0,
        };
        assert_eq!(raw.round_id(), 42);
        assert_eq!(raw.layout(), RoundIdLayout::Native);
    }

    #[test]
    fn round_id_synthesizes_from_epoch_and_round() {
        let event = NewTransmissionFilter {
            aggregator_round_id: 0,
            answer: I256::zero(),
            transmitter: Address::zero(),
            observations_timestamp: 0,
            observations: vec![],
            observers: Bytes::new(),
            juels_per_fee_coin: I256::zero(),
            config_digest: [0u8; 32],
            epoch_and_round: U256::from(0x0107u64),
        };
        let raw = RawTransmission {
            event,
            block_number: 1,
            log_index: 0,
        };
        assert_eq!(raw.epoch(), 1);
        assert_eq!(raw.round(), 7);
        assert_eq!(raw.round_id(), (1 << 8) | 7);
        assert_eq!(raw.layout(), RoundIdLayout::EpochAndRound);
    }
}
