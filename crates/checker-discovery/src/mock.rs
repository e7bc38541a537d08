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

//! A deterministic, in-memory [`ChainGateway`] used by the engine's own
//! tests and by anything downstream that wants to exercise discovery
//! without a node. Events are carried as real ABI-encoded logs so the
//! full decoding path runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use ethers::abi::{self, AbiEncode, Token};
use ethers::contract::EthEvent;
use ethers::types::{Address, Bytes, Log, H256, I256, U256, U64};
use parking_lot::Mutex;

use ocr_checker_types::{BlockRange, ConfigDigest};
use ocr_checker_utils::{Error, Result};

use crate::aggregator::{ConfigSetFilter, NewTransmissionFilter};
use crate::gateway::ChainGateway;

/// One recorded gateway operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    /// `head_block`.
    HeadBlock,
    /// `block_time` for the given block.
    BlockTime(u64),
    /// `query_logs` with the given topic over the given range.
    QueryLogs {
        /// Topic zero of the query.
        topic: H256,
        /// The queried range.
        range: BlockRange,
    },
    /// `call` with the given selector, optionally historical.
    Call {
        /// First four bytes of the calldata.
        selector: [u8; 4],
        /// The historical block, when one was given.
        at_block: Option<u64>,
    },
}

#[derive(Default)]
struct FailurePlans {
    transport: HashMap<(H256, BlockRange), usize>,
    rate_limited: HashMap<(H256, BlockRange), (usize, Option<Duration>)>,
}

/// The deterministic fake gateway.
///
/// Block `n` has timestamp `genesis_time + n * cadence`. Logs and view
/// call answers are scripted up front; failures are injected per
/// `(topic, range)`.
pub struct MockGateway {
    head: u64,
    genesis_time: u64,
    cadence: u64,
    latency: Duration,
    range_cap: Option<u64>,
    logs: Mutex<Vec<Log>>,
    views: Mutex<HashMap<(Address, Vec<u8>, Option<u64>), Bytes>>,
    failures: Mutex<FailurePlans>,
    call_log: Mutex<Vec<GatewayCall>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a MockGateway);

impl<'a> InFlight<'a> {
    fn enter(gateway: &'a MockGateway) -> Self {
        let now = gateway.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        gateway.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(gateway)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockGateway {
    /// A chain whose head is `head` and whose blocks are `cadence`
    /// seconds apart, starting at `genesis_time`.
    pub fn new(head: u64, genesis_time: u64, cadence: u64) -> Self {
        Self {
            head,
            genesis_time,
            cadence,
            latency: Duration::ZERO,
            range_cap: None,
            logs: Mutex::new(Vec::new()),
            views: Mutex::new(HashMap::new()),
            failures: Mutex::new(FailurePlans::default()),
            call_log: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Makes every call take `latency`, so concurrency and cancellation
    /// become observable.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Rejects log queries spanning more than `cap` blocks.
    pub fn with_range_cap(mut self, cap: u64) -> Self {
        self.range_cap = Some(cap);
        self
    }

    /// Registers a `NewTransmission` event log.
    #[allow(clippy::too_many_arguments)]
    pub fn push_transmission(
        &self,
        contract: Address,
        block: u64,
        log_index: u64,
        aggregator_round_id: u32,
        epoch_and_round: u64,
        transmitter: Address,
        observers: &[u8],
        config_digest: ConfigDigest,
    ) {
        let mut topic_round = [0u8; 32];
        topic_round[28..].copy_from_slice(&aggregator_round_id.to_be_bytes());
        let data = abi::encode(&[
            Token::Int(I256::from(42).into_raw()),
            Token::Address(transmitter),
            Token::Uint(U256::from(self.genesis_time + block * self.cadence)),
            Token::Array(vec![]),
            Token::Bytes(observers.to_vec()),
            Token::Int(U256::zero()),
            Token::FixedBytes(config_digest.to_vec()),
            Token::Uint(U256::from(epoch_and_round)),
        ]);
        let log = Log {
            address: contract,
            topics: vec![
                NewTransmissionFilter::signature(),
                H256::from(topic_round),
            ],
            data: data.into(),
            block_number: Some(U64::from(block)),
            log_index: Some(U256::from(log_index)),
            ..Default::default()
        };
        self.logs.lock().push(log);
    }

    /// Registers a `ConfigSet` event log.
    pub fn push_config_set(
        &self,
        contract: Address,
        block: u64,
        log_index: u64,
        config_digest: ConfigDigest,
        transmitters: Vec<Address>,
    ) {
        let data = abi::encode(&[
            Token::Uint(U256::zero()),
            Token::FixedBytes(config_digest.to_vec()),
            Token::Uint(U256::one()),
            Token::Array(vec![]),
            Token::Array(
                transmitters.into_iter().map(Token::Address).collect(),
            ),
            Token::Uint(U256::one()),
            Token::Bytes(vec![]),
            Token::Uint(U256::from(2u64)),
            Token::Bytes(vec![]),
        ]);
        let log = Log {
            address: contract,
            topics: vec![ConfigSetFilter::signature()],
            data: data.into(),
            block_number: Some(U64::from(block)),
            log_index: Some(U256::from(log_index)),
            ..Default::default()
        };
        self.logs.lock().push(log);
    }

    fn script(
        &self,
        contract: Address,
        calldata: Vec<u8>,
        at_block: Option<u64>,
        response: Vec<u8>,
    ) {
        self.views
            .lock()
            .insert((contract, calldata, at_block), response.into());
    }

    /// Scripts `latestConfigDetails()`.
    pub fn script_latest_config_details(
        &self,
        contract: Address,
        config_count: u32,
        block: u64,
        digest: ConfigDigest,
    ) {
        let response = abi::encode(&[
            Token::Uint(U256::from(config_count)),
            Token::Uint(U256::from(block)),
            Token::FixedBytes(digest.to_vec()),
        ]);
        self.script(
            contract,
            crate::aggregator::LatestConfigDetailsCall.encode(),
            None,
            response,
        );
    }

    /// Scripts `getTransmitters()`, current form.
    pub fn script_transmitters(
        &self,
        contract: Address,
        transmitters: Vec<Address>,
    ) {
        let response = abi::encode(&[Token::Array(
            transmitters.into_iter().map(Token::Address).collect(),
        )]);
        self.script(
            contract,
            crate::aggregator::GetTransmittersCall.encode(),
            None,
            response,
        );
    }

    /// Scripts `getTransmitters()` at a historical block.
    pub fn script_transmitters_at(
        &self,
        contract: Address,
        block: u64,
        transmitters: Vec<Address>,
    ) {
        let response = abi::encode(&[Token::Array(
            transmitters.into_iter().map(Token::Address).collect(),
        )]);
        self.script(
            contract,
            crate::aggregator::GetTransmittersCall.encode(),
            Some(block),
            response,
        );
    }

    /// Scripts `getTimestamp(round)`.
    pub fn script_round_timestamp(
        &self,
        contract: Address,
        round: u32,
        timestamp: u64,
    ) {
        let response = abi::encode(&[Token::Uint(U256::from(timestamp))]);
        self.script(
            contract,
            crate::aggregator::GetTimestampCall {
                round_id: U256::from(round),
            }
            .encode(),
            None,
            response,
        );
    }

    /// Scripts `latestRoundData()`.
    pub fn script_latest_round_data(
        &self,
        contract: Address,
        round_id: u32,
        updated_at: u64,
    ) {
        let response = abi::encode(&[
            Token::Uint(U256::from(round_id)),
            Token::Int(I256::from(42).into_raw()),
            Token::Uint(U256::from(updated_at)),
            Token::Uint(U256::from(updated_at)),
            Token::Uint(U256::from(round_id)),
        ]);
        self.script(
            contract,
            crate::aggregator::LatestRoundDataCall.encode(),
            None,
            response,
        );
    }

    /// The next `times` log queries for `(topic, range)` fail with a
    /// transport error.
    pub fn fail_logs(&self, topic: H256, range: BlockRange, times: usize) {
        self.failures.lock().transport.insert((topic, range), times);
    }

    /// Shorthand for [`Self::fail_logs`] on the transmission topic.
    pub fn fail_transmissions(&self, range: BlockRange, times: usize) {
        self.fail_logs(NewTransmissionFilter::signature(), range, times);
    }

    /// The next `times` log queries for `(topic, range)` are rate
    /// limited, optionally with a server delay hint.
    pub fn rate_limit_logs(
        &self,
        topic: H256,
        range: BlockRange,
        times: usize,
        retry_after: Option<Duration>,
    ) {
        self.failures
            .lock()
            .rate_limited
            .insert((topic, range), (times, retry_after));
    }

    /// Shorthand for [`Self::rate_limit_logs`] on the transmission
    /// topic.
    pub fn rate_limit_transmissions(
        &self,
        range: BlockRange,
        times: usize,
        retry_after: Option<Duration>,
    ) {
        self.rate_limit_logs(
            NewTransmissionFilter::signature(),
            range,
            times,
            retry_after,
        );
    }

    /// Every recorded call, in arrival order.
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.call_log.lock().clone()
    }

    /// The recorded log queries for `topic`, in arrival order.
    pub fn log_queries(&self, topic: H256) -> Vec<BlockRange> {
        self.call_log
            .lock()
            .iter()
            .filter_map(|c| match c {
                GatewayCall::QueryLogs { topic: t, range } if *t == topic => {
                    Some(*range)
                }
                _ => None,
            })
            .collect()
    }

    /// The recorded log queries for the transmission topic.
    pub fn transmission_queries(&self) -> Vec<BlockRange> {
        self.log_queries(NewTransmissionFilter::signature())
    }

    /// Total recorded calls.
    pub fn call_count(&self) -> usize {
        self.call_log.lock().len()
    }

    /// The highest number of calls that were ever in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn observe(&self, call: GatewayCall) -> InFlight<'_> {
        self.call_log.lock().push(call);
        let guard = InFlight::enter(self);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        guard
    }
}

#[async_trait::async_trait]
impl ChainGateway for MockGateway {
    async fn head_block(&self) -> Result<u64> {
        let _guard = self.observe(GatewayCall::HeadBlock).await;
        Ok(self.head)
    }

    async fn block_time(&self, number: u64) -> Result<u64> {
        let _guard = self.observe(GatewayCall::BlockTime(number)).await;
        if number > self.head {
            return Err(Error::BlockNotFound(number));
        }
        Ok(self.genesis_time + number * self.cadence)
    }

    async fn query_logs(
        &self,
        contract: Address,
        topic0: H256,
        range: BlockRange,
    ) -> Result<Vec<Log>> {
        let _guard = self
            .observe(GatewayCall::QueryLogs {
                topic: topic0,
                range,
            })
            .await;

        if let Some(cap) = self.range_cap {
            if range.len() > cap {
                return Err(Error::RangeTooLarge { range });
            }
        }
        {
            let mut failures = self.failures.lock();
            if let Some(left) = failures.transport.get_mut(&(topic0, range)) {
                if *left > 0 {
                    *left -= 1;
                    return Err(Error::EthersProvider(
                        ethers::providers::ProviderError::CustomError(
                            "injected transport failure".into(),
                        ),
                    ));
                }
            }
            if let Some((left, retry_after)) =
                failures.rate_limited.get_mut(&(topic0, range))
            {
                if *left > 0 {
                    *left -= 1;
                    return Err(Error::RateLimited {
                        retry_after: *retry_after,
                    });
                }
            }
        }

        let logs = self
            .logs
            .lock()
            .iter()
            .filter(|log| {
                log.address == contract
                    && log.topics.first() == Some(&topic0)
                    && log
                        .block_number
                        .map(|b| range.contains(b.as_u64()))
                        .unwrap_or(false)
            })
            .cloned()
            .collect();
        Ok(logs)
    }

    async fn call(
        &self,
        contract: Address,
        data: Bytes,
        at_block: Option<u64>,
    ) -> Result<Bytes> {
        let selector: [u8; 4] = data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .unwrap_or_default();
        let _guard = self
            .observe(GatewayCall::Call { selector, at_block })
            .await;

        let views = self.views.lock();
        let key = (contract, data.to_vec(), at_block);
        if let Some(response) = views.get(&key) {
            return Ok(response.clone());
        }
        Err(Error::EthersProvider(
            ethers::providers::ProviderError::CustomError(
                "execution reverted: view not scripted".into(),
            ),
        ))
    }
}
