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

use ocr_checker_types::BlockRange;

/// Splits `range` into contiguous, non-overlapping, covering chunks that
/// each fit one log query.
///
/// The preferred chunk size is `max_range` (the node's page cap). When
/// the preferred size would produce more chunks than `max_concurrency`,
/// chunks are widened toward `ceil(total / max_concurrency)` so one
/// dispatch wave covers the window, still capped at `max_range`.
pub fn plan_chunks(
    range: BlockRange,
    max_range: u64,
    max_concurrency: usize,
) -> Vec<BlockRange> {
    let total = range.len();
    let mut size = max_range.max(1);
    let chunk_count = total.div_ceil(size);
    if chunk_count > max_concurrency as u64 {
        size = total
            .div_ceil(max_concurrency as u64)
            .min(max_range.max(1));
    }

    let mut chunks = Vec::with_capacity(total.div_ceil(size) as usize);
    let mut start = range.start;
    while start <= range.end {
        let end = range.end.min(start.saturating_add(size - 1));
        chunks.push(BlockRange::new(start, end));
        if end == u64::MAX {
            break;
        }
        start = end + 1;
    }
    chunks
}
