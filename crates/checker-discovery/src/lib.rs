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
//! # Transmission Discovery Engine 🕸️
//!
//! Turns a logical range on an OCR2 aggregator — a round interval, a
//! block interval, or a wall-clock interval — into a fully enumerated,
//! deduplicated, correctly attributed set of transmission records.
//!
//! The public surface is [`TransmissionFetcher`]; everything else is the
//! machinery behind it: the pluggable [`ChainGateway`], the
//! [`AggregatorReader`] that knows the OCR2 event and view-call schemas,
//! the block/round locators, the range planner and parallel harvester,
//! and the config-timeline attribution pass.

/// OCR2 aggregator event and view-call schemas.
pub mod aggregator;
/// Round→block cache.
pub mod cache;
/// Discovery facade.
pub mod fetcher;
/// Chain RPC gateway abstraction.
pub mod gateway;
/// Chunked parallel log harvesting.
pub(crate) mod harvester;
/// Block and round locators.
pub mod locator;
/// An in-memory deterministic gateway for tests.
pub mod mock;
/// Block range chunking.
pub mod planner;
/// Attribution of raw events against the config timeline.
pub(crate) mod resolver;
/// Config timeline reconstruction.
pub mod timeline;

pub use aggregator::AggregatorReader;
pub use cache::RoundBlockCache;
pub use fetcher::{ChunkEvent, TransmissionFetcher};
pub use gateway::{ChainGateway, EthersGateway};
