// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Ordered frame channels connecting pipeline stages.
//!
//! A channel is a FIFO queue of [`Frame`]s with an explicit close marker:
//!
//! - **Backpressure**: on a bounded channel [`FrameSender::put`] suspends the
//!   calling task until capacity frees up. Frames are never dropped.
//! - **Close**: [`FrameSender::close`] / [`FrameReceiver::close`] are
//!   idempotent. After close, `put` fails with
//!   [`PipelineError::ChannelClosed`] (including a `put` that was already
//!   suspended on a full channel), while [`FrameReceiver::recv`] keeps
//!   returning buffered frames and then signals end-of-stream with `None`.
//! - **Non-blocking drain**: [`FrameReceiver::try_recv`] and
//!   [`FrameReceiver::drain_ready`] never suspend.

use futures_util::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::frames::Frame;

enum Tx {
    Bounded(mpsc::Sender<Frame>),
    Unbounded(mpsc::UnboundedSender<Frame>),
}

impl Clone for Tx {
    fn clone(&self) -> Self {
        match self {
            Self::Bounded(tx) => Self::Bounded(tx.clone()),
            Self::Unbounded(tx) => Self::Unbounded(tx.clone()),
        }
    }
}

enum Rx {
    Bounded(mpsc::Receiver<Frame>),
    Unbounded(mpsc::UnboundedReceiver<Frame>),
}

impl Rx {
    async fn recv(&mut self) -> Option<Frame> {
        match self {
            Self::Bounded(rx) => rx.recv().await,
            Self::Unbounded(rx) => rx.recv().await,
        }
    }

    fn try_recv(&mut self) -> Option<Frame> {
        match self {
            Self::Bounded(rx) => rx.try_recv().ok(),
            Self::Unbounded(rx) => rx.try_recv().ok(),
        }
    }

    fn close(&mut self) {
        match self {
            Self::Bounded(rx) => rx.close(),
            Self::Unbounded(rx) => rx.close(),
        }
    }
}

/// Create a channel pair. `None` capacity means unbounded.
pub fn frame_channel(capacity: Option<usize>) -> (FrameSender, FrameReceiver) {
    let closed = CancellationToken::new();
    let (tx, rx) = match capacity {
        Some(cap) => {
            let (tx, rx) = mpsc::channel(cap.max(1));
            (Tx::Bounded(tx), Rx::Bounded(rx))
        }
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (Tx::Unbounded(tx), Rx::Unbounded(rx))
        }
    };
    (
        FrameSender {
            tx,
            closed: closed.clone(),
            capacity,
        },
        FrameReceiver { rx, closed },
    )
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Sending half of a frame channel. Cheap to clone.
#[derive(Clone)]
pub struct FrameSender {
    tx: Tx,
    closed: CancellationToken,
    capacity: Option<usize>,
}

impl FrameSender {
    /// Enqueue a frame, suspending while a bounded channel is full.
    pub async fn put(&self, frame: Frame) -> Result<(), PipelineError> {
        if self.closed.is_cancelled() {
            return Err(PipelineError::ChannelClosed);
        }
        match &self.tx {
            Tx::Unbounded(tx) => tx.send(frame).map_err(|_| PipelineError::ChannelClosed),
            Tx::Bounded(tx) => {
                tokio::select! {
                    biased;
                    _ = self.closed.cancelled() => Err(PipelineError::ChannelClosed),
                    res = tx.send(frame) => res.map_err(|_| PipelineError::ChannelClosed),
                }
            }
        }
    }

    /// Mark the channel closed. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Returns `true` once either half closed the channel or the receiver
    /// was dropped.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
            || match &self.tx {
                Tx::Bounded(tx) => tx.is_closed(),
                Tx::Unbounded(tx) => tx.is_closed(),
            }
    }

    /// Configured capacity, `None` for unbounded channels.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

impl std::fmt::Debug for FrameSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSender")
            .field("capacity", &self.capacity)
            .field("closed", &self.closed.is_cancelled())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

/// Receiving half of a frame channel.
pub struct FrameReceiver {
    rx: Rx,
    closed: CancellationToken,
}

impl FrameReceiver {
    /// Receive the next frame in FIFO order.
    ///
    /// Suspends while the channel is empty and open. Returns `None` once the
    /// channel is closed (or every sender is gone) and the buffer is empty.
    pub async fn recv(&mut self) -> Option<Frame> {
        tokio::select! {
            biased;
            frame = self.rx.recv() => frame,
            _ = self.closed.cancelled() => self.rx.try_recv(),
        }
    }

    /// Take one buffered frame without suspending.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.rx.try_recv()
    }

    /// Take every currently buffered frame without suspending.
    pub fn drain_ready(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = self.rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// Close the channel from the receiving side. Buffered frames remain
    /// readable.
    pub fn close(&mut self) {
        self.closed.cancel();
        self.rx.close();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Turn the receiver into a stream that ends at end-of-stream.
    pub fn into_stream(self) -> impl Stream<Item = Frame> + Send + 'static {
        futures_util::stream::unfold(self, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        })
    }
}

impl std::fmt::Debug for FrameReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameReceiver")
            .field("closed", &self.closed.is_cancelled())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// FrameChannel
// ---------------------------------------------------------------------------

/// Both halves of a frame channel, for callers that hand a caller-owned
/// source to a pipeline.
#[derive(Debug)]
pub struct FrameChannel {
    sender: FrameSender,
    receiver: FrameReceiver,
}

impl FrameChannel {
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity))
    }

    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    pub fn with_capacity(capacity: Option<usize>) -> Self {
        let (sender, receiver) = frame_channel(capacity);
        Self { sender, receiver }
    }

    /// A new handle to the sending half.
    pub fn sender(&self) -> FrameSender {
        self.sender.clone()
    }

    pub fn split(self) -> (FrameSender, FrameReceiver) {
        (self.sender, self.receiver)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
