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

use derive_more::Display;

/// Target for logger
pub const TARGET: &str = "ocr_probe";

/// The Kind of the Probe.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// When the Lifecycle of the checker changes, like starting or
    /// shutting down.
    #[display(fmt = "lifecycle")]
    Lifecycle,
    /// A harvest call is splitting its window into chunks.
    #[display(fmt = "planning")]
    Planning,
    /// A harvest call is translating round/time endpoints to blocks.
    #[display(fmt = "locating")]
    Locating,
    /// Chunked log queries are in flight.
    #[display(fmt = "harvesting")]
    Harvesting,
    /// Raw events are being attributed against the config timeline.
    #[display(fmt = "resolving")]
    Resolving,
    /// When a chunk task will retry a failed query.
    #[display(fmt = "retry")]
    Retry,
    /// A scheduled monitor check on a transmitter.
    #[display(fmt = "monitor_check")]
    MonitorCheck,
    /// An alert was dispatched to the webhook.
    #[display(fmt = "alert")]
    Alert,
}
