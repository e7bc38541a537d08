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

use ocr_checker_types::{ObserverActivity, Transmission};

/// Histograms observer participation over a harvest: totals plus daily
/// and monthly buckets per observer index, ordered by index.
pub fn observer_activity(
    transmissions: &[Transmission],
) -> Vec<ObserverActivity> {
    let mut by_index: BTreeMap<u8, ObserverActivity> = BTreeMap::new();
    for transmission in transmissions {
        let day = transmission.block_timestamp.format("%Y-%m-%d").to_string();
        let month = transmission.block_timestamp.format("%Y-%m").to_string();
        for observer in &transmission.observers {
            let entry =
                by_index.entry(observer.index).or_insert_with(|| {
                    ObserverActivity {
                        observer_index: observer.index,
                        address: Some(observer.address),
                        ..Default::default()
                    }
                });
            entry.total += 1;
            *entry.daily.entry(day.clone()).or_default() += 1;
            *entry.monthly.entry(month.clone()).or_default() += 1;
        }
    }
    by_index.into_values().collect()
}
