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

//! Retry logic for async calls

use std::time::Duration;

use backoff::backoff::Backoff;

/// A backoff policy that doubles a base delay on every retry, capped at a
/// maximum retry count: attempt `k` sleeps `base * 2^(k - 1)`.
#[derive(Debug)]
pub struct ExponentialWithMaxRetryCount {
    base: Duration,
    max_retry_count: usize,
    count: usize,
}

impl ExponentialWithMaxRetryCount {
    /// Creates a new exponential backoff starting at `base`, giving up
    /// after `max_retry_count` retries.
    pub fn new(base: Duration, max_retry_count: usize) -> Self {
        Self {
            base,
            max_retry_count,
            count: 0,
        }
    }
}

impl Backoff for ExponentialWithMaxRetryCount {
    fn next_backoff(&mut self) -> Option<Duration> {
        (self.count < self.max_retry_count).then(|| {
            let delay = self.base * (1u32 << self.count.min(20));
            self.count += 1;
            delay
        })
    }

    fn reset(&mut self) {
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_each_attempt_and_stops_at_the_cap() {
        let mut policy =
            ExponentialWithMaxRetryCount::new(Duration::from_secs(1), 3);
        assert_eq!(policy.next_backoff(), Some(Duration::from_secs(1)));
        assert_eq!(policy.next_backoff(), Some(Duration::from_secs(2)));
        assert_eq!(policy.next_backoff(), Some(Duration::from_secs(4)));
        assert_eq!(policy.next_backoff(), None);
    }

    #[test]
    fn reset_restarts_the_schedule() {
        let mut policy =
            ExponentialWithMaxRetryCount::new(Duration::from_millis(100), 1);
        assert!(policy.next_backoff().is_some());
        assert_eq!(policy.next_backoff(), None);
        policy.reset();
        assert_eq!(
            policy.next_backoff(),
            Some(Duration::from_millis(100))
        );
    }
}
