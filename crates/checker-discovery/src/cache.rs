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

use std::collections::HashMap;
use std::time::{Duration, Instant};

use ethers::types::Address;
use parking_lot::RwLock;

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    block_number: u64,
    inserted_at: Instant,
}

/// A concurrency-safe TTL cache of round→block mappings, shared by every
/// round locator built on one engine instance.
#[derive(Debug)]
pub struct RoundBlockCache {
    ttl: Duration,
    max_entries: usize,
    entries: RwLock<HashMap<(Address, u32), CacheEntry>>,
}

impl RoundBlockCache {
    /// Creates a cache whose entries live for `ttl` and which sweeps
    /// expired entries once it grows past `max_entries`.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The cached block for `(contract, round)`, unless expired.
    pub fn get(&self, contract: Address, round: u32) -> Option<u64> {
        let entries = self.entries.read();
        let entry = entries.get(&(contract, round))?;
        (entry.inserted_at.elapsed() < self.ttl).then_some(entry.block_number)
    }

    /// Records `(contract, round) → block`, opportunistically sweeping
    /// expired entries when the map has grown past its bound.
    pub fn insert(&self, contract: Address, round: u32, block_number: u64) {
        let mut entries = self.entries.write();
        entries.insert(
            (contract, round),
            CacheEntry {
                block_number,
                inserted_at: Instant::now(),
            },
        );
        if entries.len() > self.max_entries {
            let ttl = self.ttl;
            entries.retain(|_, e| e.inserted_at.elapsed() < ttl);
        }
    }

    /// Number of live and expired entries currently held.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
