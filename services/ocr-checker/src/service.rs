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

//! Wiring: per-chain engines, the metrics endpoint, and the monitor
//! scheduler.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;

use ocr_checker_context::CheckerContext;
use ocr_checker_discovery::{
    ChainGateway, EthersGateway, RoundBlockCache, TransmissionFetcher,
};
use ocr_checker_monitor::{
    notifier, StaticJobRegistry, TransmitterWatcher, WebhookNotifier,
};
use ocr_checker_utils::{probe, Result};

/// Builds the discovery engine for one configured chain.
pub fn build_fetcher(
    ctx: &CheckerContext,
    chain_id: u32,
) -> Result<TransmissionFetcher> {
    let chain = ctx.config.chain(chain_id)?;
    let discovery = ctx.config.discovery;
    let provider = ctx.evm_provider(chain_id)?;
    let gateway: Arc<dyn ChainGateway> = Arc::new(EthersGateway::new(
        provider,
        discovery.rpc_call_timeout(),
    ));
    Ok(TransmissionFetcher::new(
        gateway,
        discovery,
        ctx.rpc_gate(),
        Arc::new(RoundBlockCache::new(
            discovery.round_cache_ttl(),
            discovery.round_cache_max_entries,
        )),
        Some(ctx.metrics.clone()),
        chain.block_time_seconds,
    ))
}

/// Builds the watch decider for one configured chain, backed by the
/// static registry over the chain's configured aggregators.
pub fn build_watcher(
    ctx: &CheckerContext,
    chain_id: u32,
    rounds_to_check: u32,
) -> Result<TransmitterWatcher> {
    let chain = ctx.config.chain(chain_id)?;
    let discovery = ctx.config.discovery;
    let provider = ctx.evm_provider(chain_id)?;
    let gateway: Arc<dyn ChainGateway> = Arc::new(EthersGateway::new(
        provider,
        discovery.rpc_call_timeout(),
    ));
    let fetcher = TransmissionFetcher::new(
        gateway.clone(),
        discovery,
        ctx.rpc_gate(),
        Arc::new(RoundBlockCache::new(
            discovery.round_cache_ttl(),
            discovery.round_cache_max_entries,
        )),
        Some(ctx.metrics.clone()),
        chain.block_time_seconds,
    );
    let contracts = chain.contracts.iter().map(|c| c.address).collect();
    let registry = Arc::new(StaticJobRegistry::new(
        gateway,
        fetcher.clone(),
        contracts,
    ));
    Ok(TransmitterWatcher::new(
        fetcher,
        registry,
        rounds_to_check,
        ctx.config.monitor.stale_after_days,
    ))
}

async fn metrics_handler() -> std::result::Result<String, (StatusCode, String)>
{
    ocr_checker_utils::metric::gather()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// Serves `/metrics` and `/health` until shutdown.
pub async fn serve_web(ctx: CheckerContext) -> Result<()> {
    let router = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(|| async { "OK" }));
    let addr = SocketAddr::from(([0, 0, 0, 0], ctx.config.port));
    tracing::info!("Starting the metrics server on {}", addr);
    let mut shutdown = ctx.shutdown_signal();
    axum::Server::bind(&addr)
        .serve(router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown.recv().await;
        })
        .await
        .map_err(|e| ocr_checker_utils::Error::Internal(e.to_string()))?;
    Ok(())
}

/// The monitor scheduler: every interval, re-check every configured
/// transmitter on every enabled chain, update the gauges, and alert on
/// unhealthy reports.
pub async fn ignite(ctx: &CheckerContext) -> Result<()> {
    let monitor = ctx.config.monitor.clone();
    let notifier = monitor.webhook.as_ref().map(|webhook| {
        WebhookNotifier::builder()
            .url(webhook.url.clone())
            .timeout(webhook.timeout())
            .build()
    });

    let mut watchers: HashMap<u32, TransmitterWatcher> = HashMap::new();
    for chain in ctx.config.evm.values().filter(|c| c.enabled) {
        watchers.insert(
            chain.chain_id,
            build_watcher(ctx, chain.chain_id, monitor.rounds_to_check)?,
        );
    }
    if watchers.is_empty() {
        tracing::warn!("monitor started with no enabled chains");
    }
    if monitor.transmitters.is_empty() {
        tracing::warn!("monitor started with no transmitters to watch");
    }

    let mut interval = tokio::time::interval(monitor.interval());
    let mut shutdown = ctx.shutdown_signal();
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("monitor scheduler stopped");
                return Ok(());
            }
            _ = interval.tick() => {
                run_checks(ctx, &watchers, &monitor.transmitters, notifier.as_ref()).await;
            }
        }
    }
}

async fn run_checks(
    ctx: &CheckerContext,
    watchers: &HashMap<u32, TransmitterWatcher>,
    transmitters: &[ethers::types::Address],
    webhook: Option<&WebhookNotifier>,
) {
    for (chain_id, watcher) in watchers {
        for transmitter in transmitters {
            let started = Instant::now();
            match watcher.check(*transmitter, ctx.shutdown_token()).await {
                Ok(report) => {
                    ctx.metrics.update_from_report(*chain_id, &report);
                    if let Some(webhook) = webhook {
                        if notifier::should_alert(&report) {
                            match webhook.notify(*chain_id, &report).await {
                                Ok(()) => {
                                    ctx.metrics.alerts_sent_total.inc()
                                }
                                Err(e) => {
                                    tracing::error!(
                                        "failed to deliver alert: {}",
                                        e
                                    );
                                    ctx.metrics.alerts_failed_total.inc();
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(
                        ?transmitter,
                        chain_id,
                        "watch pass failed: {}",
                        e
                    );
                    ctx.metrics.check_errors_total.inc();
                }
            }
            ctx.metrics
                .check_duration_seconds
                .observe(started.elapsed().as_secs_f64());
        }
    }
    tracing::event!(
        target: probe::TARGET,
        tracing::Level::TRACE,
        kind = %probe::Kind::MonitorCheck,
        chains = watchers.len(),
        transmitters = transmitters.len(),
    );
}
