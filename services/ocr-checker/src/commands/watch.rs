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

use ethers::types::Address;

use ocr_checker_context::CheckerContext;
use ocr_checker_utils::cancel::CancelToken;

use crate::service;

/// One-shot watch pass for a transmitter, printed as JSON.
pub async fn run(
    ctx: &CheckerContext,
    chain_id: u32,
    transmitter: Address,
    rounds: Option<u32>,
) -> anyhow::Result<()> {
    let rounds = rounds.unwrap_or(ctx.config.monitor.rounds_to_check);
    let watcher = service::build_watcher(ctx, chain_id, rounds)?;
    let report = watcher.check(transmitter, &CancelToken::new()).await?;
    for status in &report.statuses {
        tracing::info!(
            contract = ?status.contract,
            status = %status.status,
            last_round = ?status.last_round,
            "job checked"
        );
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
