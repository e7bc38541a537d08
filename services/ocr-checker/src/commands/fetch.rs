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
use ocr_checker_monitor::observer_activity;
use ocr_checker_utils::cancel::CancelToken;

use crate::service;

/// One-shot harvest of a round range, printed as JSON.
pub async fn run(
    ctx: &CheckerContext,
    chain_id: u32,
    contract: Address,
    start_round: u32,
    end_round: u32,
    analyze: bool,
) -> anyhow::Result<()> {
    let fetcher = service::build_fetcher(ctx, chain_id)?;
    let cancel = CancelToken::new();
    let result = fetcher
        .fetch_by_rounds(contract, start_round, end_round, &cancel)
        .await?;
    tracing::info!(
        ?contract,
        start_round,
        end_round,
        found = result.transmissions.len(),
        "fetch completed"
    );
    println!("{}", serde_json::to_string_pretty(&result)?);
    if analyze {
        let activities = observer_activity(&result.transmissions);
        println!("{}", serde_json::to_string_pretty(&activities)?);
    }
    Ok(())
}
