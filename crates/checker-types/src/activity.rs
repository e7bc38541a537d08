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

use std::collections::BTreeMap;

use ethers::types::Address;
use serde::Serialize;

/// Participation statistics for one observer index over a harvest.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ObserverActivity {
    /// The roster index of the observer.
    pub observer_index: u8,
    /// The roster address, when the index resolved against a roster.
    pub address: Option<Address>,
    /// Total contributions over the whole harvest.
    pub total: u64,
    /// Contributions per day, keyed `YYYY-MM-DD`.
    pub daily: BTreeMap<String, u64>,
    /// Contributions per month, keyed `YYYY-MM`.
    pub monthly: BTreeMap<String, u64>,
}
