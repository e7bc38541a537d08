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

//! Cooperative cancellation for harvest calls.
//!
//! Cancellation is signalled using a `broadcast` channel. Only a single
//! value is ever sent. Every task belonging to a call holds a
//! [`CancelSignal`] subscribed to the call's [`CancelToken`]; when the
//! token fires, each task reaches a safe terminal state and returns
//! [`Error::Cancelled`](crate::Error::Cancelled).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::{Error, Result};

/// The cancelling half: owned by the caller of a public engine
/// operation, cloneable, fires at most once.
#[derive(Debug, Clone)]
pub struct CancelToken {
    notify: broadcast::Sender<()>,
    cancelled: Arc<AtomicBool>,
}

impl Default for CancelToken {
    fn default() -> Self {
        let (notify, _) = broadcast::channel(2);
        Self {
            notify,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl CancelToken {
    /// Creates a token that has not fired.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the token, waking every subscribed [`CancelSignal`].
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let _ = self.notify.send(());
    }

    /// Whether the token has fired.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Subscribes a new signal for a child task.
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            notify: self.notify.subscribe(),
            cancelled: self.cancelled.clone(),
        }
    }

    /// Returns a guard that fires the token when dropped, scoping every
    /// subscribed task to the guard's lifetime.
    pub fn drop_guard(&self) -> DropGuard {
        DropGuard {
            token: self.clone(),
        }
    }
}

/// Fires its token on drop. Holding one inside a call ties the lifetime
/// of the call's spawned tasks to the call future itself: if the future
/// is dropped mid-flight, the tasks are told to stop.
#[derive(Debug)]
pub struct DropGuard {
    token: CancelToken,
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// The listening half held by each task of a call.
#[derive(Debug)]
pub struct CancelSignal {
    notify: broadcast::Receiver<()>,
    cancelled: Arc<AtomicBool>,
}

impl CancelSignal {
    /// Whether the owning token has fired.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Waits until the owning token fires.
    pub async fn recv(&mut self) {
        if self.is_cancelled() {
            return;
        }
        // Cannot receive a "lag error" as only one value is ever sent.
        let _ = self.notify.recv().await;
    }

    /// Drives `fut` to completion unless the token fires first, in which
    /// case the future is dropped and `Cancelled` is returned.
    pub async fn guard<F, T>(&mut self, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = T>,
    {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        tokio::select! {
            _ = self.recv() => Err(Error::Cancelled),
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn guard_returns_cancelled_when_token_fires() {
        let token = CancelToken::new();
        let mut signal = token.signal();
        token.cancel();
        let res = signal
            .guard(tokio::time::sleep(Duration::from_secs(60)))
            .await;
        assert!(matches!(res, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn guard_passes_through_completed_futures() {
        let token = CancelToken::new();
        let mut signal = token.signal();
        let res = signal.guard(async { 7u8 }).await;
        assert_eq!(res.unwrap(), 7);
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn signals_subscribed_after_cancel_still_observe_it() {
        let token = CancelToken::new();
        token.cancel();
        let mut late = token.signal();
        assert!(late.is_cancelled());
        late.recv().await;
    }
}
