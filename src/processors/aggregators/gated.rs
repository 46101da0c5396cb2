// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Gate that holds frames until an opening frame arrives.
//!
//! ```text
//! closed: Image  Text("a")           -> (held)
//! closed: LLMResponseStart           -> LLMResponseStart  Image  Text("a")   (opens)
//! open:   Text("b")                  -> Text("b")
//! open:   LLMResponseEnd             -> (held, closes)
//! ```

use std::collections::VecDeque;
use std::fmt;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::frames::Frame;
use crate::impl_base_display;
use crate::pipeline::params::EndOfBranchPolicy;
use crate::processors::processor::{Processor, ProcessorContext};
use crate::processors::ProcessorBase;

type GatePredicate = Box<dyn Fn(&Frame) -> bool + Send + Sync>;

/// Accumulates frames while closed and releases them in arrival order once
/// the gate opens.
///
/// A frame matching the open predicate is pushed first, followed by every
/// held frame. While open, a frame matching the close predicate closes the
/// gate and is itself held. Terminators always release the held frames
/// (`EndOfBranch` under [`EndOfBranchPolicy::Discard`] drops them instead)
/// and are then forwarded.
pub struct GatedAggregator {
    base: ProcessorBase,
    open_fn: GatePredicate,
    close_fn: GatePredicate,
    open: bool,
    held: VecDeque<Frame>,
}

impl GatedAggregator {
    pub fn new(
        open_fn: impl Fn(&Frame) -> bool + Send + Sync + 'static,
        close_fn: impl Fn(&Frame) -> bool + Send + Sync + 'static,
        start_open: bool,
    ) -> Self {
        Self {
            base: ProcessorBase::new("GatedAggregator", None),
            open_fn: Box::new(open_fn),
            close_fn: Box::new(close_fn),
            open: start_open,
            held: VecDeque::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn held_len(&self) -> usize {
        self.held.len()
    }

    async fn release(&mut self, ctx: &ProcessorContext) -> Result<(), PipelineError> {
        while let Some(frame) = self.held.pop_front() {
            ctx.push(frame).await?;
        }
        Ok(())
    }
}

impl fmt::Debug for GatedAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatedAggregator")
            .field("name", &self.base.name())
            .field("open", &self.open)
            .field("held", &self.held.len())
            .finish()
    }
}

impl_base_display!(GatedAggregator);

#[async_trait]
impl Processor for GatedAggregator {
    fn name(&self) -> &str {
        self.base.name()
    }
    fn id(&self) -> u64 {
        self.base.id()
    }

    async fn process(&mut self, frame: Frame, ctx: &ProcessorContext) -> Result<(), PipelineError> {
        if frame.is_terminator() {
            let discard = matches!(frame, Frame::EndOfBranch(_))
                && ctx.end_of_branch_policy() == EndOfBranchPolicy::Discard;
            if discard {
                self.held.clear();
            } else {
                self.release(ctx).await?;
            }
            return ctx.push(frame).await;
        }

        if self.open {
            if (self.close_fn)(&frame) {
                tracing::trace!(processor = %self.base.name(), frame = %frame, "GatedAggregator: closed");
                self.open = false;
                self.held.push_back(frame);
                return Ok(());
            }
            return ctx.push(frame).await;
        }

        if (self.open_fn)(&frame) {
            tracing::trace!(
                processor = %self.base.name(),
                held = self.held.len(),
                "GatedAggregator: opened"
            );
            self.open = true;
            ctx.push(frame).await?;
            return self.release(ctx).await;
        }

        self.held.push_back(frame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::{ImageFrame, LLMResponseEndFrame, LLMResponseStartFrame};
    use crate::pipeline::channel::frame_channel;

    fn response_gate() -> GatedAggregator {
        GatedAggregator::new(
            |f| matches!(f, Frame::LLMResponseStart(_)),
            |f| matches!(f, Frame::LLMResponseEnd(_)),
            false,
        )
    }

    #[tokio::test]
    async fn test_opening_frame_precedes_held_frames() {
        let (tx, mut rx) = frame_channel(None);
        let ctx = ProcessorContext::new(tx);
        let mut gate = response_gate();
        let image = Frame::from(ImageFrame::new(vec![0u8; 4]));

        gate.process(image.clone(), &ctx).await.unwrap();
        gate.process(Frame::text("a"), &ctx).await.unwrap();
        assert!(rx.drain_ready().is_empty());
        assert_eq!(gate.held_len(), 2);

        gate.process(LLMResponseStartFrame::new().into(), &ctx)
            .await
            .unwrap();
        assert_eq!(
            rx.drain_ready(),
            vec![
                Frame::from(LLMResponseStartFrame::new()),
                image,
                Frame::text("a"),
            ]
        );
        assert!(gate.is_open());
    }

    #[tokio::test]
    async fn test_closing_frame_is_held() {
        let (tx, mut rx) = frame_channel(None);
        let ctx = ProcessorContext::new(tx);
        let mut gate = GatedAggregator::new(
            |f| matches!(f, Frame::LLMResponseStart(_)),
            |f| matches!(f, Frame::LLMResponseEnd(_)),
            true,
        );

        gate.process(Frame::text("b"), &ctx).await.unwrap();
        gate.process(LLMResponseEndFrame::new().into(), &ctx)
            .await
            .unwrap();
        gate.process(Frame::text("c"), &ctx).await.unwrap();
        assert_eq!(rx.drain_ready(), vec![Frame::text("b")]);
        assert!(!gate.is_open());
        assert_eq!(gate.held_len(), 2);
    }

    #[tokio::test]
    async fn test_end_releases_held_frames() {
        let (tx, mut rx) = frame_channel(None);
        let ctx = ProcessorContext::new(tx);
        let mut gate = response_gate();
        gate.process(Frame::text("held"), &ctx).await.unwrap();
        gate.process(Frame::end(), &ctx).await.unwrap();
        assert_eq!(rx.drain_ready(), vec![Frame::text("held"), Frame::end()]);
    }

    #[tokio::test]
    async fn test_end_of_branch_discard() {
        let (tx, mut rx) = frame_channel(None);
        let ctx = ProcessorContext::new(tx).with_end_of_branch(EndOfBranchPolicy::Discard);
        let mut gate = response_gate();
        gate.process(Frame::text("held"), &ctx).await.unwrap();
        gate.process(Frame::end_of_branch(), &ctx).await.unwrap();
        assert_eq!(rx.drain_ready(), vec![Frame::end_of_branch()]);
        assert_eq!(gate.held_len(), 0);
    }
}
