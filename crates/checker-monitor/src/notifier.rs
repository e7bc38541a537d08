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

use std::sync::Arc;
use std::time::Duration;

use ocr_checker_types::{JobStatus, WatchReport};
use ocr_checker_utils::{probe, Result};

/// Posts alert payloads to an outbound chat webhook.
#[derive(Clone, Debug, typed_builder::TypedBuilder)]
pub struct WebhookNotifier {
    url: url::Url,
    #[builder(default = Duration::from_secs(10))]
    timeout: Duration,
    #[builder(default = Arc::new(reqwest::Client::new()))]
    client: Arc<reqwest::Client>,
}

/// Whether a completed report warrants an alert at all.
pub fn should_alert(report: &WatchReport) -> bool {
    report.summary.stale + report.summary.missing + report.summary.errored
        > 0
}

impl WebhookNotifier {
    /// Sends one alert for `report`. The caller decides *whether* to
    /// alert (see [`should_alert`]); this only formats and delivers.
    pub async fn notify(
        &self,
        chain_id: u32,
        report: &WatchReport,
    ) -> Result<()> {
        let unhealthy: Vec<_> = report
            .statuses
            .iter()
            .filter(|s| {
                matches!(
                    s.status,
                    JobStatus::Stale | JobStatus::Missing | JobStatus::Error
                )
            })
            .collect();
        let text = format!(
            "ocr-checker: transmitter {:?} on chain {} has {} unhealthy \
             job(s) of {} ({} stale, {} missing, {} errored)",
            report.transmitter,
            chain_id,
            unhealthy.len(),
            report.summary.total,
            report.summary.stale,
            report.summary.missing,
            report.summary.errored,
        );
        let payload = serde_json::json!({
            "text": text,
            "transmitter": report.transmitter,
            "chain_id": chain_id,
            "health_score": report.summary.health_score(),
            "summary": report.summary,
            "jobs": unhealthy,
            "checked_at": report.checked_at,
        });

        self.client
            .post(self.url.clone())
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::TRACE,
            kind = %probe::Kind::Alert,
            transmitter = ?report.transmitter,
            chain_id,
        );
        Ok(())
    }
}
