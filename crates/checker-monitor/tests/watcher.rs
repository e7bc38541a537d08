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

//! Watch decider tests over the deterministic fake gateway.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ethers::types::Address;
use tokio::sync::Semaphore;

use ocr_checker_config::discovery::DiscoveryConfig;
use ocr_checker_discovery::mock::MockGateway;
use ocr_checker_discovery::{RoundBlockCache, TransmissionFetcher};
use ocr_checker_monitor::registry::JobRegistry;
use ocr_checker_monitor::{StaticJobRegistry, TransmitterWatcher};
use ocr_checker_types::JobStatus;
use ocr_checker_utils::cancel::CancelToken;
use ocr_checker_utils::Result;

const HEAD: u64 = 100_000;
const CADENCE: u64 = 2;

fn addr(b: u8) -> Address {
    Address::from_low_u64_be(b as u64)
}

fn contract() -> Address {
    addr(0xC1)
}

fn a() -> Address {
    addr(0xA)
}

fn b() -> Address {
    addr(0xB)
}

fn digest() -> [u8; 32] {
    [1u8; 32]
}

/// Genesis pinned so that the head block is "now"; timestamps of old
/// blocks fall behind the staleness cutoff naturally.
fn genesis() -> u64 {
    Utc::now().timestamp() as u64 - HEAD * CADENCE
}

struct FixedRegistry(Vec<Address>);

#[async_trait::async_trait]
impl JobRegistry for FixedRegistry {
    async fn contracts_for_transmitter(
        &self,
        _transmitter: Address,
    ) -> Result<Vec<Address>> {
        Ok(self.0.clone())
    }
}

fn fetcher_over(gateway: Arc<MockGateway>) -> TransmissionFetcher {
    let cfg = DiscoveryConfig {
        base_retry_delay_ms: 10,
        ..Default::default()
    };
    TransmissionFetcher::new(
        gateway,
        cfg,
        Arc::new(Semaphore::new(cfg.max_concurrency)),
        Arc::new(RoundBlockCache::new(
            Duration::from_secs(300),
            cfg.round_cache_max_entries,
        )),
        None,
        Some(CADENCE),
    )
}

/// Roster `[A, B]`; A transmits rounds 9 and 10 near head, B transmitted
/// round 8 long ago (about two days, given the cadence).
fn seed_contract(gateway: &MockGateway, genesis: u64) {
    let roster = vec![a(), b()];
    gateway.push_config_set(contract(), 100, 0, digest(), roster.clone());
    gateway.script_latest_config_details(contract(), 1, 100, digest());
    gateway.script_transmitters(contract(), roster);

    gateway.push_transmission(
        contract(),
        10_000,
        0,
        8,
        0x0108,
        b(),
        &[0, 1],
        digest(),
    );
    gateway.push_transmission(
        contract(),
        99_900,
        0,
        9,
        0x0109,
        a(),
        &[0, 1],
        digest(),
    );
    gateway.push_transmission(
        contract(),
        99_950,
        0,
        10,
        0x010a,
        a(),
        &[0, 1],
        digest(),
    );
    gateway.script_latest_round_data(
        contract(),
        10,
        genesis + 99_950 * CADENCE,
    );
    gateway.script_round_timestamp(contract(), 8, genesis + 10_000 * CADENCE);
    gateway.script_round_timestamp(
        contract(),
        10,
        genesis + 99_950 * CADENCE,
    );
}

fn watcher_over(
    gateway: Arc<MockGateway>,
    contracts: Vec<Address>,
) -> TransmitterWatcher {
    TransmitterWatcher::new(
        fetcher_over(gateway),
        Arc::new(FixedRegistry(contracts)),
        3,
        1,
    )
}

#[tokio::test]
async fn fresh_transmitter_is_found() {
    let genesis = genesis();
    let gateway = Arc::new(MockGateway::new(HEAD, genesis, CADENCE));
    seed_contract(&gateway, genesis);
    let watcher = watcher_over(gateway, vec![contract()]);

    let report = watcher.check(a(), &CancelToken::new()).await.unwrap();
    assert_eq!(report.summary.total, 1);
    assert_eq!(report.summary.found, 1);
    let status = &report.statuses[0];
    assert_eq!(status.status, JobStatus::Found);
    assert_eq!(status.last_round, Some(10));
    assert!(status.last_seen.is_some());
    assert!((report.summary.health_score() - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn old_transmissions_are_stale() {
    let genesis = genesis();
    let gateway = Arc::new(MockGateway::new(HEAD, genesis, CADENCE));
    seed_contract(&gateway, genesis);
    let watcher = watcher_over(gateway, vec![contract()]);

    let report = watcher.check(b(), &CancelToken::new()).await.unwrap();
    let status = &report.statuses[0];
    assert_eq!(status.status, JobStatus::Stale);
    assert_eq!(status.last_round, Some(8));
}

#[tokio::test]
async fn roster_membership_gates_active_jobs() {
    let genesis = genesis();
    let gateway = Arc::new(MockGateway::new(HEAD, genesis, CADENCE));
    seed_contract(&gateway, genesis);
    let watcher = watcher_over(gateway, vec![contract()]);

    // not in the current roster at all
    let report =
        watcher.check(addr(0x99), &CancelToken::new()).await.unwrap();
    assert_eq!(report.statuses[0].status, JobStatus::NoActive);
    assert_eq!(report.summary.no_active, 1);
}

#[tokio::test]
async fn view_failures_surface_as_error_status() {
    let gateway = Arc::new(MockGateway::new(HEAD, genesis(), CADENCE));
    // roster scripted, but latestRoundData left unscripted so it reverts
    gateway.script_transmitters(contract(), vec![a()]);
    let watcher = watcher_over(gateway, vec![contract()]);

    let report = watcher.check(a(), &CancelToken::new()).await.unwrap();
    let status = &report.statuses[0];
    assert_eq!(status.status, JobStatus::Error);
    assert!(status.error.is_some());
    assert_eq!(report.summary.errored, 1);
}

#[tokio::test]
async fn static_registry_filters_by_recent_activity() {
    let genesis = genesis();
    let gateway = Arc::new(MockGateway::new(HEAD, genesis, CADENCE));
    seed_contract(&gateway, genesis);
    // a second configured contract with no activity from A
    let idle = addr(0xC2);
    gateway.push_config_set(idle, 100, 0, [2u8; 32], vec![b()]);
    gateway.script_latest_config_details(idle, 1, 100, [2u8; 32]);
    gateway.script_transmitters(idle, vec![b()]);

    let registry = StaticJobRegistry::new(
        gateway.clone(),
        fetcher_over(gateway.clone()),
        vec![contract(), idle],
    );
    let contracts = registry.contracts_for_transmitter(a()).await.unwrap();
    assert_eq!(contracts, vec![contract()]);
}
