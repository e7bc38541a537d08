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

use chrono::{DateTime, Utc};
use ethers::types::{Address, I256};
use serde::{Deserialize, Serialize};

/// The marker index used when a transmitter or observer cannot be mapped
/// into the active roster.
pub const UNKNOWN_OBSERVER: u8 = 255;

/// A 32-byte tag naming one on-chain oracle configuration.
pub type ConfigDigest = [u8; 32];

/// An inclusive range of block numbers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct BlockRange {
    /// First block of the range.
    pub start: u64,
    /// Last block of the range, inclusive.
    pub end: u64,
}

impl BlockRange {
    /// Creates a new range; `start` must not exceed `end`.
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Number of blocks covered by the range.
    pub const fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always false: a range covers at least one block.
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Whether `block` falls inside the range.
    pub const fn contains(&self, block: u64) -> bool {
        self.start <= block && block <= self.end
    }
}

impl std::fmt::Display for BlockRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// The ordered transmitter address list associated with one config
/// digest. Position in the roster is the observer/transmitter index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster(Vec<Address>);

impl Roster {
    /// Creates a roster from an ordered address list.
    pub fn new(transmitters: Vec<Address>) -> Self {
        Self(transmitters)
    }

    /// The index of `address` in the roster, if it is a member.
    pub fn position(&self, address: Address) -> Option<u8> {
        self.0.iter().position(|a| *a == address).map(|i| i as u8)
    }

    /// The address at `index`, if the roster is that large.
    pub fn get(&self, index: u8) -> Option<Address> {
        self.0.get(index as usize).copied()
    }

    /// Number of roster members.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the roster has no members.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over `(index, address)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u8, Address)> + '_ {
        self.0.iter().enumerate().map(|(i, a)| (i as u8, *a))
    }
}

impl From<Vec<Address>> for Roster {
    fn from(transmitters: Vec<Address>) -> Self {
        Self::new(transmitters)
    }
}

/// How the logical round id of a transmission was derived.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "kebab-case")]
pub enum RoundIdLayout {
    /// The event carried a native `aggregatorRoundId` field.
    #[default]
    Native,
    /// The round id was synthesized as `(epoch << 8) | subround`.
    EpochAndRound,
}

/// One observer that contributed to a transmission, resolved against the
/// roster active at the transmission's block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserverRecord {
    /// The observer's index in the active roster.
    pub index: u8,
    /// The roster address at that index.
    pub address: Address,
}

/// A fully attributed OCR transmission event.
#[derive(Debug, Clone, Serialize)]
pub struct Transmission {
    /// The aggregator contract that emitted the event.
    pub contract: Address,
    /// Digest of the configuration the report was signed under.
    #[serde(with = "serde_digest")]
    pub config_digest: ConfigDigest,
    /// Logical round id, native or synthesized (see [`RoundIdLayout`]).
    pub round_id: u32,
    /// Epoch part of the packed epoch-and-round value.
    pub epoch: u32,
    /// Subround part of the packed epoch-and-round value.
    pub round: u8,
    /// The aggregated answer carried by the report.
    pub answer: I256,
    /// Address of the node that submitted the report on-chain.
    pub transmitter: Address,
    /// Roster index of the transmitter, or [`UNKNOWN_OBSERVER`].
    pub transmitter_index: u8,
    /// Observers that contributed, resolved to roster addresses.
    pub observers: Vec<ObserverRecord>,
    /// Timestamp the observations were made at, from the report itself.
    pub observations_timestamp: u32,
    /// Block the event landed in.
    pub block_number: u64,
    /// Index of the log within its block.
    pub log_index: u64,
    /// Timestamp of the containing block.
    pub block_timestamp: DateTime<Utc>,
}

impl Transmission {
    /// The `(block, log)` pair results are ordered by.
    pub fn ordering_key(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

/// The outcome of one discovery call: every attributed transmission in
/// the requested span, ordered by `(block_number, log_index)`.
#[derive(Debug, Clone, Serialize)]
pub struct TransmissionResult {
    /// The aggregator contract the harvest ran against.
    pub contract: Address,
    /// First round of the span (or the minimum round found).
    pub start_round: u32,
    /// Last round of the span (or the maximum round found).
    pub end_round: u32,
    /// The attributed transmissions, ordered.
    pub transmissions: Vec<Transmission>,
}

mod serde_digest {
    use super::ConfigDigest;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(
        digest: &ConfigDigest,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!(
            "0x{}",
            ethers::utils::hex::encode(digest)
        ))
    }
}
