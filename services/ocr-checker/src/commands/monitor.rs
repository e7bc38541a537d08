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

use tokio::signal::unix;

use ocr_checker_context::CheckerContext;
use ocr_checker_utils::probe;

use crate::service;

/// The long-running monitor: metrics endpoint + scheduled watch passes,
/// shut down cleanly on the usual signals.
pub async fn run(ctx: CheckerContext) -> anyhow::Result<()> {
    let web_ctx = ctx.clone();
    let web_handle = tokio::spawn(async move {
        if let Err(e) = service::serve_web(web_ctx).await {
            tracing::error!("metrics server failed: {}", e);
        }
    });
    let scheduler_ctx = ctx.clone();
    let scheduler_handle = tokio::spawn(async move {
        if let Err(e) = service::ignite(&scheduler_ctx).await {
            tracing::error!("monitor scheduler failed: {}", e);
        }
    });
    tracing::event!(
        target: probe::TARGET,
        tracing::Level::DEBUG,
        kind = %probe::Kind::Lifecycle,
        started = true,
    );

    let mut ctrlc_signal = unix::signal(unix::SignalKind::interrupt())?;
    let mut termination_signal = unix::signal(unix::SignalKind::terminate())?;
    tokio::select! {
        _ = ctrlc_signal.recv() => {
            tracing::warn!("Interrupted (Ctrl+C) ...");
        },
        _ = termination_signal.recv() => {
            tracing::warn!("Got Terminate signal ...");
        },
    }
    tracing::event!(
        target: probe::TARGET,
        tracing::Level::DEBUG,
        kind = %probe::Kind::Lifecycle,
        shutdown = true,
    );
    tracing::warn!("Shutting down...");
    // the shutdown token also cancels every in-flight harvest
    ctx.shutdown();
    let _ = scheduler_handle.await;
    let _ = web_handle.await;
    tracing::info!("Clean Exit ..");
    Ok(())
}
