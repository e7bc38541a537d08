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

//! End-to-end discovery tests against the deterministic fake gateway.

use std::sync::Arc;
use std::time::Duration;

use ethers::types::Address;
use tokio::sync::Semaphore;

use ocr_checker_config::discovery::DiscoveryConfig;
use ocr_checker_discovery::locator::{BlockLocator, Endpoint, RoundLocator};
use ocr_checker_discovery::mock::MockGateway;
use ocr_checker_discovery::{
    AggregatorReader, RoundBlockCache, TransmissionFetcher,
};
use ocr_checker_types::BlockRange;
use ocr_checker_utils::cancel::CancelToken;
use ocr_checker_utils::Error;

const HEAD: u64 = 10_000;
const GENESIS: u64 = 1_600_000_000;
const CADENCE: u64 = 2;

fn addr(b: u8) -> Address {
    Address::from_low_u64_be(b as u64)
}

fn digest(b: u8) -> [u8; 32] {
    [b; 32]
}

fn contract() -> Address {
    addr(0xC1)
}

// the four-member roster of the first configuration
fn a() -> Address {
    addr(0xA)
}
fn b() -> Address {
    addr(0xB)
}
fn c() -> Address {
    addr(0xC)
}
fn d() -> Address {
    addr(0xD)
}
fn e() -> Address {
    addr(0xE)
}

fn fast_config() -> DiscoveryConfig {
    DiscoveryConfig {
        base_retry_delay_ms: 10,
        ..Default::default()
    }
}

fn fetcher_over(
    gateway: Arc<MockGateway>,
    cfg: DiscoveryConfig,
) -> TransmissionFetcher {
    TransmissionFetcher::new(
        gateway,
        cfg,
        Arc::new(Semaphore::new(cfg.max_concurrency)),
        Arc::new(RoundBlockCache::new(
            cfg.round_cache_ttl(),
            cfg.round_cache_max_entries,
        )),
        None,
        Some(CADENCE),
    )
}

/// One config at block 100 with roster `[A, B, C, D]`, then three
/// transmissions: round 1 at block 110 by B observing `[0, 2, 3]`,
/// round 2 at block 130 by C observing `[0, 1, 3]`, round 3 at block
/// 150 by A observing `[1, 2, 3]`.
fn seed_single_config(gateway: &MockGateway) {
    let roster = vec![a(), b(), c(), d()];
    gateway.push_config_set(contract(), 100, 0, digest(1), roster.clone());
    gateway.push_transmission(
        contract(),
        110,
        0,
        1,
        0x0101,
        b(),
        &[0, 2, 3],
        digest(1),
    );
    gateway.push_transmission(
        contract(),
        130,
        0,
        2,
        0x0102,
        c(),
        &[0, 1, 3],
        digest(1),
    );
    gateway.push_transmission(
        contract(),
        150,
        0,
        3,
        0x0103,
        a(),
        &[1, 2, 3],
        digest(1),
    );
    gateway.script_latest_config_details(contract(), 1, 100, digest(1));
    gateway.script_transmitters(contract(), roster);
}

#[tokio::test]
async fn s1_dense_range_is_fully_attributed() {
    let gateway = Arc::new(MockGateway::new(HEAD, GENESIS, CADENCE));
    seed_single_config(&gateway);
    let fetcher = fetcher_over(gateway, fast_config());

    let result = fetcher
        .fetch_by_blocks(contract(), 100, 200, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(result.start_round, 1);
    assert_eq!(result.end_round, 3);
    assert_eq!(result.transmissions.len(), 3);
    let rounds: Vec<u32> =
        result.transmissions.iter().map(|t| t.round_id).collect();
    assert_eq!(rounds, vec![1, 2, 3]);

    let first = &result.transmissions[0];
    assert_eq!(first.transmitter, b());
    assert_eq!(first.transmitter_index, 1);
    let observer_addrs: Vec<Address> =
        first.observers.iter().map(|o| o.address).collect();
    assert_eq!(observer_addrs, vec![a(), c(), d()]);
    assert_eq!(
        first.block_timestamp.timestamp() as u64,
        GENESIS + 110 * CADENCE
    );

    // attribution soundness: the roster address at the transmitter's
    // index is the transmitter itself
    let roster = [a(), b(), c(), d()];
    for t in &result.transmissions {
        assert_eq!(roster[t.transmitter_index as usize], t.transmitter);
        for o in &t.observers {
            assert_eq!(roster[o.index as usize], o.address);
        }
    }
}

#[tokio::test]
async fn s2_config_change_mid_window_reattributes() {
    let gateway = Arc::new(MockGateway::new(HEAD, GENESIS, CADENCE));
    seed_single_config(&gateway);
    let new_roster = vec![a(), b(), c(), e()];
    gateway.push_config_set(contract(), 140, 0, digest(2), new_roster.clone());
    gateway.push_transmission(
        contract(),
        160,
        0,
        4,
        0x0104,
        e(),
        &[0, 3],
        digest(2),
    );
    gateway.script_latest_config_details(contract(), 2, 140, digest(2));
    gateway.script_transmitters(contract(), new_roster);
    let fetcher = fetcher_over(gateway, fast_config());

    let result = fetcher
        .fetch_by_blocks(contract(), 100, 200, &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(result.transmissions.len(), 4);

    // round 3 landed after the config change but was signed under the
    // old digest; it must still resolve against the old roster
    let round3 = &result.transmissions[2];
    assert_eq!(round3.round_id, 3);
    assert_eq!(round3.config_digest, digest(1));
    assert_eq!(round3.transmitter, a());
    assert_eq!(round3.transmitter_index, 0);

    let round4 = &result.transmissions[3];
    assert_eq!(round4.config_digest, digest(2));
    assert_eq!(round4.transmitter, e());
    assert_eq!(round4.transmitter_index, 3);
    let observer_addrs: Vec<Address> =
        round4.observers.iter().map(|o| o.address).collect();
    assert_eq!(observer_addrs, vec![a(), e()]);
}

#[tokio::test]
async fn s3_paged_rpc_issues_exactly_the_planned_chunks() {
    let gateway = Arc::new(MockGateway::new(HEAD, GENESIS, CADENCE));
    seed_single_config(&gateway);
    let cfg = DiscoveryConfig {
        rpc_max_range: 50,
        ..fast_config()
    };
    let fetcher = fetcher_over(gateway.clone(), cfg);

    fetcher
        .fetch_by_blocks(contract(), 0, 199, &CancelToken::new())
        .await
        .unwrap();

    let expected = vec![
        BlockRange::new(0, 49),
        BlockRange::new(50, 99),
        BlockRange::new(100, 149),
        BlockRange::new(150, 199),
    ];
    let mut queries = gateway.transmission_queries();
    queries.sort_by_key(|r| r.start);
    assert_eq!(queries, expected);
}

#[tokio::test]
async fn s4_round_range_translates_and_filters() {
    let gateway = Arc::new(MockGateway::new(HEAD, GENESIS, CADENCE));
    seed_single_config(&gateway);
    gateway.script_round_timestamp(contract(), 2, GENESIS + 130 * CADENCE);
    gateway.script_round_timestamp(contract(), 3, GENESIS + 150 * CADENCE);
    let fetcher = fetcher_over(gateway, fast_config());

    let result = fetcher
        .fetch_by_rounds(contract(), 2, 3, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(result.start_round, 2);
    assert_eq!(result.end_round, 3);
    let rounds: Vec<u32> =
        result.transmissions.iter().map(|t| t.round_id).collect();
    assert_eq!(rounds, vec![2, 3]);
}

#[tokio::test]
async fn s4b_time_range_translates_through_the_block_locator() {
    let gateway = Arc::new(MockGateway::new(HEAD, GENESIS, CADENCE));
    seed_single_config(&gateway);
    let fetcher = fetcher_over(gateway, fast_config());

    let start = chrono::DateTime::from_timestamp(
        (GENESIS + 100 * CADENCE) as i64,
        0,
    )
    .unwrap();
    let end = chrono::DateTime::from_timestamp(
        (GENESIS + 200 * CADENCE) as i64,
        0,
    )
    .unwrap();
    let result = fetcher
        .fetch_by_time(contract(), start, end, &CancelToken::new())
        .await
        .unwrap();
    let rounds: Vec<u32> =
        result.transmissions.iter().map(|t| t.round_id).collect();
    assert_eq!(rounds, vec![1, 2, 3]);
}

#[tokio::test]
async fn s5_flaky_chunk_retries_to_the_same_result() {
    let gateway = Arc::new(MockGateway::new(HEAD, GENESIS, CADENCE));
    seed_single_config(&gateway);
    let cfg = DiscoveryConfig {
        rpc_max_range: 50,
        ..fast_config()
    };
    // two transport failures on one chunk; the third attempt passes
    gateway.fail_transmissions(BlockRange::new(100, 149), 2);
    let fetcher = fetcher_over(gateway, cfg);

    let result = fetcher
        .fetch_by_blocks(contract(), 0, 199, &CancelToken::new())
        .await
        .unwrap();
    let rounds: Vec<u32> =
        result.transmissions.iter().map(|t| t.round_id).collect();
    assert_eq!(rounds, vec![1, 2, 3]);
}

#[tokio::test]
async fn s5b_exhausted_retries_fail_the_whole_call() {
    let gateway = Arc::new(MockGateway::new(HEAD, GENESIS, CADENCE));
    seed_single_config(&gateway);
    let cfg = DiscoveryConfig {
        rpc_max_range: 50,
        ..fast_config()
    };
    gateway.fail_transmissions(BlockRange::new(100, 149), 10);
    let fetcher = fetcher_over(gateway, cfg);

    let err = fetcher
        .fetch_by_blocks(contract(), 0, 199, &CancelToken::new())
        .await
        .unwrap_err();
    match err {
        Error::Transport { range, .. } => {
            assert_eq!(range, BlockRange::new(100, 149));
        }
        other => panic!("expected Transport, got {other:?}"),
    }
}

#[tokio::test]
async fn s6_cancellation_stops_dispatch() {
    let gateway = Arc::new(
        MockGateway::new(HEAD, GENESIS, CADENCE)
            .with_latency(Duration::from_millis(50)),
    );
    seed_single_config(&gateway);
    let cfg = DiscoveryConfig {
        rpc_max_range: 50,
        max_concurrency: 4,
        ..fast_config()
    };
    let fetcher = fetcher_over(gateway.clone(), cfg);

    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.cancel();
    });

    let err = fetcher
        .fetch_by_blocks(contract(), 0, 9_999, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));

    // nothing was dispatched beyond the in-flight wave
    assert!(gateway.call_count() <= cfg.max_concurrency + 1);
}

#[tokio::test]
async fn completeness_no_duplicates_and_ordering() {
    let gateway = Arc::new(MockGateway::new(HEAD, GENESIS, CADENCE));
    let roster = vec![a(), b(), c(), d()];
    gateway.push_config_set(contract(), 10, 0, digest(1), roster.clone());
    gateway.script_latest_config_details(contract(), 1, 10, digest(1));
    gateway.script_transmitters(contract(), roster);
    // events straddling chunk boundaries, including two in one block
    let placements: &[(u64, u64, u32)] = &[
        (49, 0, 1),
        (50, 0, 2),
        (99, 0, 3),
        (99, 1, 4),
        (100, 0, 5),
        (173, 0, 6),
    ];
    for (block, log_index, round) in placements {
        gateway.push_transmission(
            contract(),
            *block,
            *log_index,
            *round,
            0x0100 | *round as u64,
            a(),
            &[0, 1],
            digest(1),
        );
    }
    let cfg = DiscoveryConfig {
        rpc_max_range: 50,
        ..fast_config()
    };
    let fetcher = fetcher_over(gateway, cfg);

    let result = fetcher
        .fetch_by_blocks(contract(), 0, 199, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(result.transmissions.len(), placements.len());
    let keys: Vec<(u64, u64)> = result
        .transmissions
        .iter()
        .map(|t| (t.block_number, t.log_index))
        .collect();
    let mut deduped = keys.clone();
    deduped.dedup();
    assert_eq!(keys.len(), deduped.len(), "duplicates in the result");
    let mut sorted = keys.clone();
    sorted.sort_unstable();
    assert_eq!(keys, sorted, "result is not ordered");
    assert_eq!(result.start_round, 1);
    assert_eq!(result.end_round, 6);
}

#[tokio::test]
async fn concurrency_stays_under_the_shared_bound() {
    let gateway = Arc::new(
        MockGateway::new(HEAD, GENESIS, CADENCE)
            .with_latency(Duration::from_millis(5)),
    );
    seed_single_config(&gateway);
    let cfg = DiscoveryConfig {
        rpc_max_range: 50,
        max_concurrency: 4,
        ..fast_config()
    };
    let fetcher = fetcher_over(gateway.clone(), cfg);

    fetcher
        .fetch_by_blocks(contract(), 0, 1_999, &CancelToken::new())
        .await
        .unwrap();
    assert!(
        gateway.peak_in_flight() <= 4,
        "peak in-flight {} exceeded the bound",
        gateway.peak_in_flight()
    );
}

#[tokio::test]
async fn range_cap_rejections_split_until_they_fit() {
    let gateway = Arc::new(
        MockGateway::new(HEAD, GENESIS, CADENCE).with_range_cap(10),
    );
    seed_single_config(&gateway);
    let cfg = DiscoveryConfig {
        rpc_max_range: 50,
        ..fast_config()
    };
    let fetcher = fetcher_over(gateway.clone(), cfg);

    let result = fetcher
        .fetch_by_blocks(contract(), 100, 199, &CancelToken::new())
        .await
        .unwrap();
    let rounds: Vec<u32> =
        result.transmissions.iter().map(|t| t.round_id).collect();
    assert_eq!(rounds, vec![1, 2, 3]);
    // every accepted query fit the cap
    assert!(gateway
        .transmission_queries()
        .iter()
        .any(|r| r.len() <= 10));
}

#[tokio::test]
async fn unsplittable_range_cap_surfaces_as_transport() {
    let gateway = Arc::new(
        MockGateway::new(HEAD, GENESIS, CADENCE).with_range_cap(0),
    );
    seed_single_config(&gateway);
    let fetcher = fetcher_over(gateway, fast_config());

    let err = fetcher
        .fetch_by_blocks(contract(), 100, 100, &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport { .. }));
}

#[tokio::test]
async fn rate_limit_hint_is_honoured_and_recovers() {
    let gateway = Arc::new(MockGateway::new(HEAD, GENESIS, CADENCE));
    seed_single_config(&gateway);
    let cfg = fast_config();
    gateway.rate_limit_transmissions(
        BlockRange::new(100, 200),
        1,
        Some(Duration::from_millis(20)),
    );
    let fetcher = fetcher_over(gateway, cfg);

    let started = std::time::Instant::now();
    let result = fetcher
        .fetch_by_blocks(contract(), 100, 200, &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(result.transmissions.len(), 3);
    assert!(started.elapsed() >= Duration::from_millis(20));
}

#[tokio::test]
async fn empty_range_yields_an_empty_result_not_an_error() {
    let gateway = Arc::new(MockGateway::new(HEAD, GENESIS, CADENCE));
    seed_single_config(&gateway);
    let fetcher = fetcher_over(gateway, fast_config());

    let result = fetcher
        .fetch_by_blocks(contract(), 5_000, 5_000, &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(result.start_round, 0);
    assert_eq!(result.end_round, 0);
    assert!(result.transmissions.is_empty());
}

#[tokio::test]
async fn invalid_ranges_are_rejected_up_front() {
    let gateway = Arc::new(MockGateway::new(HEAD, GENESIS, CADENCE));
    let fetcher = fetcher_over(gateway.clone(), fast_config());

    let err = fetcher
        .fetch_by_blocks(contract(), 10, 5, &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRange { .. }));

    let err = fetcher
        .fetch_by_rounds(contract(), 9, 5, &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRange { .. }));

    let err = fetcher
        .fetch_by_rounds(contract(), 1, 50_000, &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRange { .. }));

    // nothing reached the gateway
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn round_locator_second_lookup_hits_the_cache() {
    let gateway = Arc::new(MockGateway::new(HEAD, GENESIS, CADENCE));
    seed_single_config(&gateway);
    gateway.script_round_timestamp(contract(), 2, GENESIS + 130 * CADENCE);
    let cache = Arc::new(RoundBlockCache::new(Duration::from_secs(300), 16));
    let reader = AggregatorReader::new(gateway.clone(), contract());
    let locator = RoundLocator::new(
        gateway.clone(),
        reader,
        BlockLocator::new(gateway.clone(), Some(CADENCE)),
        cache,
        fast_config(),
    );

    let block = locator.locate(2, Endpoint::Start).await.unwrap();
    assert_eq!(block, 130);
    let calls_after_first = gateway.call_count();

    let block = locator.locate(2, Endpoint::Start).await.unwrap();
    assert_eq!(block, 130);
    assert_eq!(
        gateway.call_count(),
        calls_after_first,
        "cache hit still issued RPCs"
    );
}

#[tokio::test]
async fn round_locator_falls_back_to_log_search() {
    let gateway = Arc::new(MockGateway::new(HEAD, GENESIS, CADENCE));
    // a contract emitting steadily over the whole chain: round n lands
    // at block n * 100
    let roster = vec![a(), b()];
    gateway.push_config_set(contract(), 1, 0, digest(1), roster.clone());
    for round in 1..=100u32 {
        gateway.push_transmission(
            contract(),
            round as u64 * 100,
            0,
            round,
            0x0100 | round as u64,
            a(),
            &[0],
            digest(1),
        );
    }
    // no getTimestamp scripted: the view reverts, the locator scans logs
    gateway.script_latest_round_data(
        contract(),
        100,
        GENESIS + 10_000 * CADENCE,
    );
    let cache = Arc::new(RoundBlockCache::new(Duration::from_secs(300), 16));
    let reader = AggregatorReader::new(gateway.clone(), contract());
    let locator = RoundLocator::new(
        gateway.clone(),
        reader,
        BlockLocator::new(gateway.clone(), Some(CADENCE)),
        cache,
        fast_config(),
    );

    let block = locator.locate(2, Endpoint::Start).await.unwrap();
    assert_eq!(block, 200);
}

#[tokio::test]
async fn rounds_beyond_the_latest_are_invalid_input() {
    let gateway = Arc::new(MockGateway::new(HEAD, GENESIS, CADENCE));
    seed_single_config(&gateway);
    gateway.script_latest_round_data(
        contract(),
        3,
        GENESIS + 150 * CADENCE,
    );
    let cache = Arc::new(RoundBlockCache::new(Duration::from_secs(300), 16));
    let reader = AggregatorReader::new(gateway.clone(), contract());
    let locator = RoundLocator::new(
        gateway.clone(),
        reader,
        BlockLocator::new(gateway.clone(), Some(CADENCE)),
        cache,
        fast_config(),
    );

    let err = locator.locate(99, Endpoint::End).await.unwrap_err();
    assert!(matches!(err, Error::InvalidRange { .. }));
}

#[tokio::test]
async fn block_locator_pins_exact_timestamps() {
    let gateway = Arc::new(MockGateway::new(HEAD, GENESIS, CADENCE));
    let locator = BlockLocator::new(gateway.clone(), Some(CADENCE));

    let block = locator.locate(GENESIS + 7_777 * CADENCE).await.unwrap();
    assert_eq!(block, 7_777);

    // future instants clamp to head, ancient ones to the low end
    let block = locator
        .locate(GENESIS + (HEAD + 500) * CADENCE)
        .await
        .unwrap();
    assert_eq!(block, HEAD);
    let block = locator.locate(GENESIS.saturating_sub(10_000)).await.unwrap();
    assert_eq!(block, 0);
}

#[tokio::test]
async fn gap_fill_uses_the_historical_roster() {
    let gateway = Arc::new(MockGateway::new(HEAD, GENESIS, CADENCE));
    seed_single_config(&gateway);
    // an event signed under a digest with no ConfigSet in the window and
    // no matching seed
    let hidden_roster = vec![e(), d()];
    gateway.push_transmission(
        contract(),
        120,
        0,
        9,
        0x0109,
        e(),
        &[0, 1],
        digest(7),
    );
    gateway.script_transmitters_at(contract(), 120, hidden_roster);
    let fetcher = fetcher_over(gateway, fast_config());

    let result = fetcher
        .fetch_by_blocks(contract(), 100, 200, &CancelToken::new())
        .await
        .unwrap();
    let event = result
        .transmissions
        .iter()
        .find(|t| t.round_id == 9)
        .unwrap();
    assert_eq!(event.transmitter_index, 0);
    let observer_addrs: Vec<Address> =
        event.observers.iter().map(|o| o.address).collect();
    assert_eq!(observer_addrs, vec![e(), d()]);
}

#[tokio::test]
async fn unresolvable_attribution_degrades_to_unknown() {
    let gateway = Arc::new(MockGateway::new(HEAD, GENESIS, CADENCE));
    seed_single_config(&gateway);
    // same hidden digest, but the node cannot serve historical state
    gateway.push_transmission(
        contract(),
        120,
        0,
        9,
        0x0109,
        e(),
        &[0, 1],
        digest(7),
    );
    let fetcher = fetcher_over(gateway, fast_config());

    let result = fetcher
        .fetch_by_blocks(contract(), 100, 200, &CancelToken::new())
        .await
        .unwrap();
    let event = result
        .transmissions
        .iter()
        .find(|t| t.round_id == 9)
        .unwrap();
    assert_eq!(event.transmitter_index, ocr_checker_types::UNKNOWN_OBSERVER);
    assert!(event.observers.is_empty());
}

#[tokio::test]
async fn observer_indices_beyond_the_roster_are_dropped() {
    let gateway = Arc::new(MockGateway::new(HEAD, GENESIS, CADENCE));
    let roster = vec![a(), b()];
    gateway.push_config_set(contract(), 10, 0, digest(1), roster.clone());
    gateway.script_latest_config_details(contract(), 1, 10, digest(1));
    gateway.script_transmitters(contract(), roster);
    gateway.push_transmission(
        contract(),
        50,
        0,
        1,
        0x0101,
        a(),
        &[0, 7, 1],
        digest(1),
    );
    let fetcher = fetcher_over(gateway, fast_config());

    let result = fetcher
        .fetch_by_blocks(contract(), 0, 100, &CancelToken::new())
        .await
        .unwrap();
    let event = &result.transmissions[0];
    let indices: Vec<u8> = event.observers.iter().map(|o| o.index).collect();
    assert_eq!(indices, vec![0, 1]);
}

#[tokio::test]
async fn streaming_emits_chunks_in_order_and_closes_once() {
    let gateway = Arc::new(MockGateway::new(HEAD, GENESIS, CADENCE));
    seed_single_config(&gateway);
    let cfg = DiscoveryConfig {
        rpc_max_range: 50,
        ..fast_config()
    };
    let fetcher = fetcher_over(gateway, cfg);

    let mut rx = fetcher.stream_by_blocks(
        contract(),
        0,
        199,
        &CancelToken::new(),
        8,
    );
    let mut starts = Vec::new();
    let mut total = 0usize;
    while let Some(event) = rx.recv().await {
        assert!(event.error.is_none(), "unexpected error event");
        starts.push(event.start_block);
        total += event.transmissions.len();
    }
    assert_eq!(starts, vec![0, 50, 100, 150]);
    assert_eq!(total, 3);
}

#[tokio::test]
async fn epoch_and_round_layout_synthesizes_round_ids() {
    let gateway = Arc::new(MockGateway::new(HEAD, GENESIS, CADENCE));
    let roster = vec![a(), b()];
    gateway.push_config_set(contract(), 10, 0, digest(1), roster.clone());
    gateway.script_latest_config_details(contract(), 1, 10, digest(1));
    gateway.script_transmitters(contract(), roster);
    // an older-variant event: native round id missing, only the packed
    // epoch-and-round present
    gateway.push_transmission(
        contract(),
        60,
        0,
        0,
        (3 << 8) | 2,
        a(),
        &[0],
        digest(1),
    );
    let fetcher = fetcher_over(gateway, fast_config());

    let result = fetcher
        .fetch_by_blocks(contract(), 0, 100, &CancelToken::new())
        .await
        .unwrap();
    let event = &result.transmissions[0];
    assert_eq!(event.epoch, 3);
    assert_eq!(event.round, 2);
    assert_eq!(event.round_id, (3 << 8) | 2);
}
