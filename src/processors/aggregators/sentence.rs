// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Text sentence aggregation processor.
//!
//! This module provides [`SentenceAggregator`], a processor that accumulates
//! [`Frame::Text`] content into complete sentences. It only pushes output
//! when sentence-ending punctuation (`.`, `!`, `?`) is present in the
//! buffer, so downstream processors (TTS) receive whole sentences rather than
//! LLM tokens.
//!
//! # Example flow
//!
//! ```text
//! Text("Hello")              -> (buffered)
//! Text(" world. How")        -> Text("Hello world.")     buffer: " How"
//! Text(" are you?")          -> Text(" How are you?")
//! Text("Bye")  End           -> Text("Bye")  End
//! ```

use std::fmt;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::frames::Frame;
use crate::impl_base_display;
use crate::pipeline::params::EndOfBranchPolicy;
use crate::processors::processor::{Processor, ProcessorContext};
use crate::processors::ProcessorBase;

/// Characters that mark the end of a sentence.
const SENTENCE_ENDINGS: &[char] = &['.', '!', '?'];

/// Byte offset just past the last sentence terminator in `text`.
fn sentence_boundary(text: &str) -> Option<usize> {
    text.rfind(SENTENCE_ENDINGS).map(|idx| idx + 1)
}

/// Aggregates text frames into complete sentences.
///
/// Boundaries are decided only by scanning the cumulative buffer for
/// terminal punctuation; when a fragment completes several sentences they
/// are emitted together as one frame, up to the last terminator.
///
/// Special frame handling:
/// - `End`: flushes any buffered text, then forwards the frame.
/// - `EndOfBranch`: flushes or discards buffered text depending on the
///   run's [`EndOfBranchPolicy`], then forwards the frame.
/// - All other frames: passed through unchanged.
pub struct SentenceAggregator {
    base: ProcessorBase,
    /// Accumulated text waiting for a sentence boundary.
    aggregation: String,
}

impl SentenceAggregator {
    /// Create a new sentence aggregator.
    pub fn new() -> Self {
        Self {
            base: ProcessorBase::new("SentenceAggregator", None),
            aggregation: String::with_capacity(256),
        }
    }

    /// Get the current buffered text.
    pub fn aggregation(&self) -> &str {
        &self.aggregation
    }

    async fn flush(&mut self, ctx: &ProcessorContext) -> Result<(), PipelineError> {
        if self.aggregation.is_empty() {
            return Ok(());
        }
        let remaining = std::mem::take(&mut self.aggregation);
        ctx.push(Frame::text(remaining)).await
    }
}

impl Default for SentenceAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SentenceAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SentenceAggregator")
            .field("name", &self.base.name())
            .field("aggregation_len", &self.aggregation.len())
            .finish()
    }
}

impl_base_display!(SentenceAggregator);

#[async_trait]
impl Processor for SentenceAggregator {
    fn name(&self) -> &str {
        self.base.name()
    }
    fn id(&self) -> u64 {
        self.base.id()
    }

    async fn process(&mut self, frame: Frame, ctx: &ProcessorContext) -> Result<(), PipelineError> {
        match frame {
            Frame::Text(text) => {
                self.aggregation.push_str(&text.content);
                if let Some(end) = sentence_boundary(&self.aggregation) {
                    let remainder = self.aggregation.split_off(end);
                    let sentence = std::mem::replace(&mut self.aggregation, remainder);
                    ctx.push(Frame::text(sentence)).await?;
                }
                Ok(())
            }
            Frame::End(end) => {
                self.flush(ctx).await?;
                ctx.push(end).await
            }
            Frame::EndOfBranch(end) => {
                match ctx.end_of_branch_policy() {
                    EndOfBranchPolicy::Flush => self.flush(ctx).await?,
                    EndOfBranchPolicy::Discard => self.aggregation.clear(),
                }
                ctx.push(end).await
            }
            frame @ (Frame::Start(_)
            | Frame::LLMResponseStart(_)
            | Frame::LLMFunctionStart(_)
            | Frame::LLMResponseEnd(_)
            | Frame::Audio(_)
            | Frame::Image(_)
            | Frame::Sprite(_)
            | Frame::LLMMessages(_)
            | Frame::LLMFunctionCall(_)
            | Frame::Transcription(_)
            | Frame::UserStartedSpeaking(_)
            | Frame::UserStoppedSpeaking(_)
            | Frame::ParticipantJoined(_)) => ctx.push(frame).await,
        }
    }
}
