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

//! Chunked, bounded-concurrency execution of log sweeps.
//!
//! One sweep dispatches every chunk of a plan as its own task. Results
//! land in per-chunk slots and are concatenated in issue order, so
//! completion order never leaks into the output. The first fatal error
//! fires the call token, which tears the sibling chunk tasks down.

use std::future::Future;

use backoff::backoff::Backoff;
use futures::future::BoxFuture;
use tokio::sync::mpsc;

use ocr_checker_config::discovery::DiscoveryConfig;
use ocr_checker_types::BlockRange;
use ocr_checker_utils::retry::ExponentialWithMaxRetryCount;
use ocr_checker_utils::{cancel::CancelToken, probe, Error, Result};

/// Fetches one chunk: transient failures retry on the exponential
/// schedule (honouring any server delay hint), and a node range-cap
/// rejection splits the chunk in half in place, keeping result order.
pub(crate) fn fetch_chunk<T, F, Fut>(
    range: BlockRange,
    cfg: DiscoveryConfig,
    token: CancelToken,
    fetch: F,
) -> BoxFuture<'static, Result<Vec<T>>>
where
    T: Send + 'static,
    F: Fn(BlockRange) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<T>>> + Send + 'static,
{
    Box::pin(async move {
        let mut signal = token.signal();
        let mut policy = ExponentialWithMaxRetryCount::new(
            cfg.base_retry_delay(),
            cfg.max_retries.saturating_sub(1),
        );
        loop {
            if signal.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match signal.guard(fetch(range)).await? {
                Ok(items) => return Ok(items),
                Err(e) if e.is_range_too_large() && range.len() > 1 => {
                    let mid = range.start + range.len() / 2 - 1;
                    tracing::debug!(
                        %range,
                        "node rejected the span, splitting at #{}",
                        mid
                    );
                    let left = fetch_chunk(
                        BlockRange::new(range.start, mid),
                        cfg,
                        token.clone(),
                        fetch.clone(),
                    );
                    let right = fetch_chunk(
                        BlockRange::new(mid + 1, range.end),
                        cfg,
                        token.clone(),
                        fetch.clone(),
                    );
                    let (mut items, rest) = futures::try_join!(left, right)?;
                    items.extend(rest);
                    return Ok(items);
                }
                Err(e) if e.is_range_too_large() => {
                    // a single block still over the cap cannot split
                    return Err(Error::Transport {
                        range,
                        message: e.to_string(),
                    });
                }
                Err(e) if e.is_transient() => match policy.next_backoff() {
                    Some(scheduled) => {
                        let delay = e.retry_after().unwrap_or(scheduled);
                        tracing::event!(
                            target: probe::TARGET,
                            tracing::Level::TRACE,
                            kind = %probe::Kind::Retry,
                            range = %range,
                            delay_ms = %delay.as_millis(),
                        );
                        tracing::warn!(
                            %range,
                            error = %e,
                            "chunk query failed, retrying in {:?}",
                            delay
                        );
                        signal.guard(tokio::time::sleep(delay)).await?;
                    }
                    None => {
                        return Err(Error::Transport {
                            range,
                            message: e.to_string(),
                        })
                    }
                },
                Err(e) => return Err(e),
            }
        }
    })
}

/// Runs one sweep over `chunks`. Returns the concatenation of every
/// chunk's items in issue order, or the first fatal error after firing
/// `token` to stop the sibling tasks.
pub(crate) async fn run_sweep<T, F, Fut>(
    chunks: &[BlockRange],
    cfg: DiscoveryConfig,
    token: &CancelToken,
    fetch: F,
) -> Result<Vec<T>>
where
    T: Send + 'static,
    F: Fn(BlockRange) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<T>>> + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<(usize, Result<Vec<T>>)>();
    for (index, chunk) in chunks.iter().enumerate() {
        let tx = tx.clone();
        let task = fetch_chunk(*chunk, cfg, token.clone(), fetch.clone());
        tokio::spawn(async move {
            let _ = tx.send((index, task.await));
        });
    }
    drop(tx);

    let mut slots: Vec<Option<Vec<T>>> =
        (0..chunks.len()).map(|_| None).collect();
    let mut first_err: Option<Error> = None;
    while let Some((index, result)) = rx.recv().await {
        match result {
            Ok(items) => slots[index] = Some(items),
            Err(Error::Cancelled) => {
                first_err.get_or_insert(Error::Cancelled);
            }
            Err(e) => {
                // fatal: stop the siblings, remember the real cause
                token.cancel();
                match first_err {
                    None | Some(Error::Cancelled) => first_err = Some(e),
                    Some(_) => {}
                }
            }
        }
    }

    if let Some(e) = first_err {
        return Err(e);
    }
    let mut merged = Vec::new();
    for (index, slot) in slots.into_iter().enumerate() {
        match slot {
            Some(items) => merged.extend(items),
            None => {
                return Err(Error::Internal(format!(
                    "chunk {index} task vanished without a result"
                )))
            }
        }
    }
    Ok(merged)
}
