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
//! # OCR Checker Types 🕸️
//!
//! Common value and domain types shared between the discovery engine,
//! the monitor, and the checker service.

/// Observer activity statistics.
pub mod activity;
/// RPC URL wrapper type.
pub mod rpc_url;
/// Transmitter status and watch verdicts.
pub mod status;
/// Transmission domain records.
pub mod transmission;

pub use activity::ObserverActivity;
pub use rpc_url::RpcUrl;
pub use status::{JobStatus, TransmitterStatus, WatchReport, WatchSummary};
pub use transmission::{
    BlockRange, ConfigDigest, ObserverRecord, Roster, RoundIdLayout,
    Transmission, TransmissionResult, UNKNOWN_OBSERVER,
};

/// Packs an OCR2 epoch and subround into the synthetic round id space
/// used when the event does not carry a native aggregator round id.
pub const fn packed_round_id(epoch: u32, round: u8) -> u32 {
    (epoch << 8) | round as u32
}
