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

use ocr_checker_types::{ConfigDigest, Roster, RoundIdLayout};

use crate::aggregator::RawConfigSet;

/// One era of the contract's configuration history.
#[derive(Debug, Clone)]
pub struct TimelineEntry {
    /// First block this config was observed at. The seed entry uses
    /// block zero so it covers everything before the first `ConfigSet`
    /// in the window.
    pub first_seen_block: u64,
    /// The digest naming this configuration.
    pub config_digest: ConfigDigest,
    /// The transmitter roster of this configuration.
    pub roster: Roster,
    /// The round-id layout observed for events attributed to this
    /// entry; contracts that changed layout across upgrades surface it
    /// here.
    pub layout: RoundIdLayout,
}

/// The contract's `ConfigSet` history over one harvest window, ordered
/// by first-seen block. Append-only: gap-filling inserts synthetic
/// entries but never rewrites existing ones.
#[derive(Debug, Default)]
pub struct ConfigTimeline {
    entries: Vec<TimelineEntry>,
}

impl ConfigTimeline {
    /// Builds a timeline from the merged `ConfigSet` sweep plus an
    /// optional seed describing the roster active before the first
    /// event in the window.
    pub fn build(
        seed: Option<(ConfigDigest, Roster)>,
        configs: &[RawConfigSet],
    ) -> Self {
        let mut entries = Vec::with_capacity(configs.len() + 1);
        if let Some((config_digest, roster)) = seed {
            entries.push(TimelineEntry {
                first_seen_block: 0,
                config_digest,
                roster,
                layout: RoundIdLayout::default(),
            });
        }
        for config in configs {
            entries.push(TimelineEntry {
                first_seen_block: config.block_number,
                config_digest: config.event.config_digest,
                roster: Roster::new(config.event.transmitters.clone()),
                layout: RoundIdLayout::default(),
            });
        }
        entries.sort_by_key(|e| e.first_seen_block);
        Self { entries }
    }

    /// The entry with the greatest `first_seen_block ≤ block` whose
    /// digest matches, scanning earlier eras when the newest covering
    /// entry disagrees (a config change between emission and read).
    pub fn resolve(
        &self,
        block: u64,
        digest: &ConfigDigest,
    ) -> Option<&TimelineEntry> {
        self.entries
            .iter()
            .rev()
            .filter(|e| e.first_seen_block <= block)
            .find(|e| e.config_digest == *digest)
    }

    /// Inserts a synthetic entry produced by a historical
    /// `getTransmitters` upcall, keeping the ordering invariant.
    pub fn insert_synthetic(&mut self, entry: TimelineEntry) {
        let at = self
            .entries
            .partition_point(|e| e.first_seen_block <= entry.first_seen_block);
        self.entries.insert(at, entry);
    }

    /// Records the round-id layout observed for the entry that
    /// attributed an event at `block` with `digest`.
    pub fn record_layout(
        &mut self,
        block: u64,
        digest: &ConfigDigest,
        layout: RoundIdLayout,
    ) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .rev()
            .filter(|e| e.first_seen_block <= block)
            .find(|e| e.config_digest == *digest)
        {
            entry.layout = layout;
        }
    }

    /// The ordered entries.
    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::ConfigSetFilter;
    use ethers::types::{Address, Bytes};

    fn addr(b: u8) -> Address {
        Address::from_low_u64_be(b as u64)
    }

    fn config_set(
        block: u64,
        digest: ConfigDigest,
        transmitters: Vec<Address>,
    ) -> RawConfigSet {
        RawConfigSet {
            event: ConfigSetFilter {
                previous_config_block_number: 0,
                config_digest: digest,
                config_count: 1,
                signers: vec![],
                transmitters,
                f: 1,
                onchain_config: Bytes::new(),
                offchain_config_version: 2,
                offchain_config: Bytes::new(),
            },
            block_number: block,
            log_index: 0,
        }
    }

    #[test]
    fn resolves_the_newest_covering_matching_entry() {
        let d1 = [1u8; 32];
        let d2 = [2u8; 32];
        let timeline = ConfigTimeline::build(
            None,
            &[
                config_set(100, d1, vec![addr(1), addr(2)]),
                config_set(140, d2, vec![addr(1), addr(3)]),
            ],
        );
        // before the change: only d1 covers
        let entry = timeline.resolve(120, &d1).unwrap();
        assert_eq!(entry.first_seen_block, 100);
        // after the change, an event still signed under d1 resolves to
        // the earlier era instead of failing
        let entry = timeline.resolve(150, &d1).unwrap();
        assert_eq!(entry.first_seen_block, 100);
        let entry = timeline.resolve(150, &d2).unwrap();
        assert_eq!(entry.first_seen_block, 140);
        // nothing covers blocks before the first entry
        assert!(timeline.resolve(99, &d1).is_none());
    }

    #[test]
    fn seed_covers_blocks_before_the_first_event() {
        let seed_digest = [9u8; 32];
        let timeline = ConfigTimeline::build(
            Some((seed_digest, Roster::new(vec![addr(7)]))),
            &[config_set(100, [1u8; 32], vec![addr(1)])],
        );
        let entry = timeline.resolve(50, &seed_digest).unwrap();
        assert_eq!(entry.first_seen_block, 0);
    }

    #[test]
    fn synthetic_entries_keep_ordering() {
        let mut timeline =
            ConfigTimeline::build(None, &[config_set(100, [1u8; 32], vec![])]);
        timeline.insert_synthetic(TimelineEntry {
            first_seen_block: 130,
            config_digest: [3u8; 32],
            roster: Roster::new(vec![addr(5)]),
            layout: RoundIdLayout::default(),
        });
        let blocks: Vec<u64> = timeline
            .entries()
            .iter()
            .map(|e| e.first_seen_block)
            .collect();
        assert_eq!(blocks, vec![100, 130]);
        assert!(timeline.resolve(135, &[3u8; 32]).is_some());
    }
}
