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

use std::path::{Path, PathBuf};

use anyhow::Context;
use directories_next::ProjectDirs;
use structopt::StructOpt;

use crate::OcrCheckerConfig;

/// Package identifier, where the default configuration is defined.
/// If the user does not start the checker with the `--config-dir`
/// it will default to read from the default location depending on the OS.
pub const PACKAGE_ID: [&str; 3] = ["tools", "webb", "ocr-checker"];

/// The OCR Checker Command-line tool
///
/// Fetch transmissions, watch transmitters, or run the monitor:
///
/// $ ocr-checker -vvv -c <CONFIG_DIR> watch --transmitter <ADDRESS>
#[derive(StructOpt)]
#[structopt(name = "OCR Checker")]
pub struct Opts {
    /// A level of verbosity, and can be used multiple times
    #[structopt(short, long, parse(from_occurrences))]
    pub verbose: i32,
    /// Directory that contains configration files.
    #[structopt(
        short = "c",
        long = "config-dir",
        value_name = "PATH",
        parse(from_os_str)
    )]
    pub config_dir: Option<PathBuf>,
    /// What to do.
    #[structopt(subcommand)]
    pub cmd: Command,
}

/// The checker subcommands.
#[derive(StructOpt)]
pub enum Command {
    /// Fetch every transmission in a round range on one aggregator.
    Fetch {
        /// The chain to query, by chain id.
        #[structopt(long)]
        chain_id: u32,
        /// The aggregator contract address.
        #[structopt(long)]
        contract: ethers::types::Address,
        /// First round of the range, inclusive.
        #[structopt(long)]
        start_round: u32,
        /// Last round of the range, inclusive.
        #[structopt(long)]
        end_round: u32,
        /// Also print per-observer activity histograms.
        #[structopt(long)]
        analyze: bool,
    },
    /// Check a transmitter's recent activity across its contracts.
    Watch {
        /// The chain to query, by chain id.
        #[structopt(long)]
        chain_id: u32,
        /// The transmitter address to check.
        #[structopt(long)]
        transmitter: ethers::types::Address,
        /// Override the configured number of rounds to inspect.
        #[structopt(long)]
        rounds: Option<u32>,
    },
    /// Run scheduled watch passes with metrics and alerting.
    Monitor,
}

/// Loads the configuration from the given directory.
///
/// Returns `Ok(OcrCheckerConfig)` on success, or `Err(anyhow::Error)`
/// on failure.
pub fn load_config<P>(
    config_dir: Option<P>,
) -> Result<OcrCheckerConfig, anyhow::Error>
where
    P: AsRef<Path>,
{
    tracing::debug!("Getting default dirs for the ocr checker");
    let dirs = ProjectDirs::from(PACKAGE_ID[0], PACKAGE_ID[1], PACKAGE_ID[2])
        .context("failed to get config")?;
    let path = match config_dir {
        Some(p) => p.as_ref().to_path_buf(),
        None => dirs.config_dir().to_path_buf(),
    };
    // return an error if the path is not a directory.
    if !path.is_dir() {
        return Err(anyhow::anyhow!("{} is not a directory", path.display()));
    }
    tracing::trace!("Loading Config from {} ..", path.display());
    let config = crate::utils::load(path)?;
    tracing::trace!("Config loaded..");
    Ok(config)
}

/// Sets up the logger for the checker, based on the verbosity level
/// passed in.
pub fn setup_logger(verbosity: i32, filter: &str) -> anyhow::Result<()> {
    use tracing::Level;
    let log_level = match verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let directive = format!("{filter}={log_level}")
        .parse()
        .expect("valid log level");
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(directive);
    let logger = tracing_subscriber::fmt()
        .with_target(true)
        .with_max_level(log_level)
        .with_env_filter(env_filter);
    // if we are not compiling for integration tests, we should use pretty logs
    #[cfg(not(feature = "integration-tests"))]
    let logger = logger.pretty();
    // otherwise, we should use json, which is easy to parse.
    #[cfg(feature = "integration-tests")]
    let logger = logger.json().flatten_event(true).with_current_span(false);

    logger.init();
    Ok(())
}
