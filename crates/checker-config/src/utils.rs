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
use std::path::{Path, PathBuf};

use config::{Config, File};

use crate::OcrCheckerConfig;

/// A helper function that will search for all config files in the given
/// directory and return them as a vec of the paths.
///
/// Supported file extensions are:
/// - `.toml`.
/// - `.json`.
pub fn search_config_files<P: AsRef<Path>>(
    base_dir: P,
) -> ocr_checker_utils::Result<Vec<PathBuf>> {
    // A pattern that covers all toml or json files in the config
    // directory and subdirectories.
    let toml_pattern = format!("{}/**/*.toml", base_dir.as_ref().display());
    let json_pattern = format!("{}/**/*.json", base_dir.as_ref().display());
    tracing::trace!(
        "Loading config files from {} and {}",
        toml_pattern,
        json_pattern
    );
    let toml_files = glob::glob(&toml_pattern)?;
    let json_files = glob::glob(&json_pattern)?;
    toml_files
        .chain(json_files)
        .map(|v| v.map_err(ocr_checker_utils::Error::from))
        .collect()
}

/// Try to parse the [`OcrCheckerConfig`] from the given config file(s).
pub fn parse_from_files(
    files: &[PathBuf],
) -> ocr_checker_utils::Result<OcrCheckerConfig> {
    let mut builder = Config::builder();
    for config_file in files {
        tracing::trace!("Loading config file: {}", config_file.display());
        let ext = config_file
            .extension()
            .map(|e| e.to_str().unwrap_or(""))
            .unwrap_or("");
        let format = match ext {
            "toml" => config::FileFormat::Toml,
            "json" => config::FileFormat::Json,
            _ => {
                tracing::warn!("Unknown file extension: {}", ext);
                continue;
            }
        };
        builder = builder
            .add_source(File::from(config_file.as_path()).format(format));
    }

    // also merge in the environment (with a prefix of OCR_CHECKER).
    let builder = builder.add_source(
        config::Environment::with_prefix("OCR_CHECKER").separator("__"),
    );
    let cfg = builder.build()?;
    // and finally deserialize the config and post-process it
    let config: Result<
        OcrCheckerConfig,
        serde_path_to_error::Error<config::ConfigError>,
    > = serde_path_to_error::deserialize(cfg);
    match config {
        Ok(c) => postloading_process(c),
        Err(e) => {
            tracing::error!("{}", e);
            Err(e.into())
        }
    }
}

/// Load the configuration files.
///
/// It is the same as using the [`search_config_files`] and
/// [`parse_from_files`] functions combined.
pub fn load<P: AsRef<Path>>(
    path: P,
) -> ocr_checker_utils::Result<OcrCheckerConfig> {
    parse_from_files(&search_config_files(path)?)
}

/// The postloading_process exists to validate configuration and
/// standardize the format of the configuration.
pub fn postloading_process(
    mut config: OcrCheckerConfig,
) -> ocr_checker_utils::Result<OcrCheckerConfig> {
    tracing::trace!("Checking configuration sanity ...");

    // 1. drain everything, and take enabled chains.
    let old_evm = config
        .evm
        .drain()
        .filter(|(_, chain)| chain.enabled)
        .collect::<HashMap<_, _>>();
    // 2. insert them again, keyed by chain id.
    for (_, v) in old_evm {
        config.evm.insert(v.chain_id.to_string(), v);
    }

    for (chain_id, chain) in &config.evm {
        if chain.contracts.is_empty() {
            tracing::warn!(
                "!!WARNING!!: chain {} ({}) has no aggregator contracts
                configured; watch passes against it will find nothing.",
                chain.name,
                chain_id,
            );
        }
    }

    if config.discovery.max_concurrency == 0 {
        return Err(ocr_checker_utils::Error::InvalidRange {
            reason: "discovery.max-concurrency must be positive".into(),
        });
    }
    if config.discovery.rpc_max_range == 0 {
        return Err(ocr_checker_utils::Error::InvalidRange {
            reason: "discovery.rpc-max-range must be positive".into(),
        });
    }
    if config.discovery.max_retries == 0 {
        return Err(ocr_checker_utils::Error::InvalidRange {
            reason: "discovery.max-retries must be at least 1".into(),
        });
    }

    tracing::trace!(
        "postloaded config: {}",
        serde_json::to_string_pretty(&config)?
    );

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_a_minimal_toml_config() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("checker.toml");
        std::fs::write(
            &file,
            r#"
            [evm.mumbai]
            name = "mumbai"
            enabled = true
            http-endpoint = "https://rpc.example.com"
            chain-id = 80001
            block-time-seconds = 2

            [[evm.mumbai.contracts]]
            address = "0xa142BB41f409599603D3bB16842D0d274AAeDcf5"

            [discovery]
            max-concurrency = 8
            "#,
        )
        .unwrap();

        let config = load(dir.path()).unwrap();
        // re-keyed by chain id during post-processing
        let chain = config.chain(80001).unwrap();
        assert_eq!(chain.name, "mumbai");
        assert_eq!(chain.contracts.len(), 1);
        assert_eq!(config.discovery.max_concurrency, 8);
        // untouched knobs keep their defaults
        assert_eq!(config.discovery.rpc_max_range, 5_000);
        assert_eq!(config.monitor.rounds_to_check, 10);
    }

    #[test]
    fn disabled_chains_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("checker.toml");
        std::fs::write(
            &file,
            r#"
            [evm.dead]
            name = "dead"
            enabled = false
            http-endpoint = "https://rpc.example.com"
            chain-id = 1
            "#,
        )
        .unwrap();

        let config = load(dir.path()).unwrap();
        assert!(config.evm.is_empty());
    }
}
