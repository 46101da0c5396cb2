// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! In-flight frame accounting for one pipeline instance.
//!
//! The counter is incremented for every frame that enters a channel of the
//! pipeline and decremented once the frame has been fully handled by the
//! stage (or reader) that took it. A stage pushes its outputs before it
//! releases its input, so the counter only reaches zero when nothing the
//! last injected frame caused is still in flight.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub(crate) struct ActivityTracker {
    in_flight: Arc<watch::Sender<usize>>,
}

impl ActivityTracker {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(0usize);
        Self {
            in_flight: Arc::new(tx),
        }
    }

    /// A frame entered the pipeline.
    pub(crate) fn begin(&self) {
        self.in_flight.send_modify(|n| *n += 1);
    }

    /// A frame left the pipeline or was consumed.
    pub(crate) fn finish(&self) {
        self.in_flight.send_modify(|n| *n = n.saturating_sub(1));
    }

    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    /// Resolves once no frame is in flight.
    pub(crate) async fn idle(&self) {
        let mut rx = self.in_flight.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}
