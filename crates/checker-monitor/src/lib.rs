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

#![warn(missing_docs)]
//! # OCR Checker Monitor 🕸️
//!
//! Everything that sits on top of the discovery engine: the per-job
//! watch verdicts, the observer activity analytics, the job registry
//! lookup, and webhook alerting.

/// Observer participation histograms.
pub mod analyzer;
/// Outbound webhook alerting.
pub mod notifier;
/// Transmitter → contracts lookup.
pub mod registry;
/// The watch decider.
pub mod watcher;

pub use analyzer::observer_activity;
pub use notifier::WebhookNotifier;
pub use registry::{JobRegistry, StaticJobRegistry};
pub use watcher::TransmitterWatcher;
