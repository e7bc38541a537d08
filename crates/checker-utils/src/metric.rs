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

use ocr_checker_types::WatchReport;
use prometheus::{
    register_counter, register_gauge_vec, register_histogram, Counter,
    Encoder, GaugeVec, Histogram, TextEncoder,
};

/// A struct definition for collecting metrics in the checker.
#[derive(Debug, Clone)]
pub struct Metrics {
    /// Total number of OCR jobs seen for a transmitter.
    pub jobs_total: GaugeVec,
    /// Jobs with a fresh transmission.
    pub jobs_healthy: GaugeVec,
    /// Jobs whose last transmission is older than the cutoff.
    pub jobs_stale: GaugeVec,
    /// Jobs with no transmission in the checked span.
    pub jobs_missing: GaugeVec,
    /// Jobs whose check errored.
    pub jobs_error: GaugeVec,
    /// Jobs not active for the transmitter.
    pub jobs_no_active: GaugeVec,
    /// Overall health score (0-1) per transmitter.
    pub health_score: GaugeVec,
    /// Timestamp of the last completed check per transmitter.
    pub last_check_timestamp: GaugeVec,
    /// Last round number per job.
    pub last_round_number: GaugeVec,
    /// Seconds since the last transmission per job.
    pub time_since_last_tx_seconds: GaugeVec,
    /// Duration of monitoring checks.
    pub check_duration_seconds: Histogram,
    /// Total number of check errors.
    pub check_errors_total: Counter,
    /// Total number of alerts sent.
    pub alerts_sent_total: Counter,
    /// Total number of failed alerts.
    pub alerts_failed_total: Counter,
    /// Total outbound RPC calls issued by the discovery engine.
    pub rpc_calls_total: Counter,
}

const JOB_LABELS: &[&str] = &["transmitter", "chain_id"];
const PER_CONTRACT_LABELS: &[&str] = &["transmitter", "chain_id", "contract"];

impl Metrics {
    /// Instantiates the various metrics and their counters, registering
    /// them with the default registry.
    pub fn new() -> crate::Result<Self> {
        Ok(Self {
            jobs_total: register_gauge_vec!(
                "ocr_checker_jobs_total",
                "Total number of OCR jobs",
                JOB_LABELS
            )?,
            jobs_healthy: register_gauge_vec!(
                "ocr_checker_jobs_healthy",
                "Number of healthy OCR jobs",
                JOB_LABELS
            )?,
            jobs_stale: register_gauge_vec!(
                "ocr_checker_jobs_stale",
                "Number of stale OCR jobs",
                JOB_LABELS
            )?,
            jobs_missing: register_gauge_vec!(
                "ocr_checker_jobs_missing",
                "Number of missing OCR jobs",
                JOB_LABELS
            )?,
            jobs_error: register_gauge_vec!(
                "ocr_checker_jobs_error",
                "Number of OCR jobs with errors",
                JOB_LABELS
            )?,
            jobs_no_active: register_gauge_vec!(
                "ocr_checker_jobs_no_active",
                "Number of OCR jobs with no active status",
                JOB_LABELS
            )?,
            health_score: register_gauge_vec!(
                "ocr_checker_health_score",
                "Overall health score (0-1)",
                JOB_LABELS
            )?,
            last_check_timestamp: register_gauge_vec!(
                "ocr_checker_last_check_timestamp",
                "Timestamp of the last check",
                JOB_LABELS
            )?,
            last_round_number: register_gauge_vec!(
                "ocr_checker_last_round_number",
                "Last round number for each job",
                PER_CONTRACT_LABELS
            )?,
            time_since_last_tx_seconds: register_gauge_vec!(
                "ocr_checker_time_since_last_tx_seconds",
                "Time since last transmission in seconds",
                PER_CONTRACT_LABELS
            )?,
            check_duration_seconds: register_histogram!(
                "ocr_checker_check_duration_seconds",
                "Duration of monitoring checks"
            )?,
            check_errors_total: register_counter!(
                "ocr_checker_check_errors_total",
                "Total number of check errors"
            )?,
            alerts_sent_total: register_counter!(
                "ocr_checker_alerts_sent_total",
                "Total number of alerts sent"
            )?,
            alerts_failed_total: register_counter!(
                "ocr_checker_alerts_failed_total",
                "Total number of failed alerts"
            )?,
            rpc_calls_total: register_counter!(
                "ocr_checker_rpc_calls_total",
                "Total outbound RPC calls issued by the discovery engine"
            )?,
        })
    }

    /// Folds a completed watch report into the job gauges.
    pub fn update_from_report(&self, chain_id: u32, report: &WatchReport) {
        let transmitter = format!("{:?}", report.transmitter);
        let chain_id = chain_id.to_string();
        let labels = [transmitter.as_str(), chain_id.as_str()];

        let summary = &report.summary;
        self.jobs_total.with_label_values(&labels).set(summary.total as f64);
        self.jobs_healthy
            .with_label_values(&labels)
            .set(summary.found as f64);
        self.jobs_stale
            .with_label_values(&labels)
            .set(summary.stale as f64);
        self.jobs_missing
            .with_label_values(&labels)
            .set(summary.missing as f64);
        self.jobs_error
            .with_label_values(&labels)
            .set(summary.errored as f64);
        self.jobs_no_active
            .with_label_values(&labels)
            .set(summary.no_active as f64);
        self.health_score
            .with_label_values(&labels)
            .set(summary.health_score());
        self.last_check_timestamp
            .with_label_values(&labels)
            .set(report.checked_at.timestamp() as f64);

        for status in &report.statuses {
            let contract = format!("{:?}", status.contract);
            let labels =
                [transmitter.as_str(), chain_id.as_str(), contract.as_str()];
            if let Some(round) = status.last_round {
                self.last_round_number
                    .with_label_values(&labels)
                    .set(round as f64);
            }
            if let Some(seen) = status.last_seen {
                let since = (report.checked_at - seen).num_seconds();
                self.time_since_last_tx_seconds
                    .with_label_values(&labels)
                    .set(since as f64);
            }
        }
    }
}

/// Encodes everything in the default registry into the Prometheus text
/// exposition format.
pub fn gather() -> crate::Result<String> {
    let encoder = TextEncoder::new();
    let metrics = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metrics, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| crate::Error::Internal(e.to_string()))
}
