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

//! OCR Checker Binary.
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod commands;
mod service;

use ocr_checker_config::cli::{load_config, setup_logger, Command, Opts};
use ocr_checker_context::CheckerContext;

/// The main entry point for the checker.
///
/// # Arguments
///
/// * `args` - The command line arguments.
#[paw::main]
#[tokio::main]
async fn main(args: Opts) -> anyhow::Result<()> {
    setup_logger(args.verbose, "ocr_checker")?;
    match dotenv::dotenv() {
        Ok(_) => {
            tracing::trace!("Loaded .env file");
        }
        Err(e) => {
            tracing::warn!("Failed to load .env file: {}", e);
        }
    }

    // The configuration is validated and configured from the given directory
    let config = load_config(args.config_dir.clone())?;

    // The CheckerContext takes a configuration, and populates objects
    // that are needed throughout the lifetime of the checker: the
    // metrics registry, the shutdown token, and the shared RPC gate.
    let ctx = CheckerContext::new(config)?;

    match args.cmd {
        Command::Fetch {
            chain_id,
            contract,
            start_round,
            end_round,
            analyze,
        } => {
            commands::fetch::run(
                &ctx,
                chain_id,
                contract,
                start_round,
                end_round,
                analyze,
            )
            .await
        }
        Command::Watch {
            chain_id,
            transmitter,
            rounds,
        } => commands::watch::run(&ctx, chain_id, transmitter, rounds).await,
        Command::Monitor => commands::monitor::run(ctx).await,
    }
}
