// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! External AI service collaborators.
//!
//! The traits here are the only surface the frame engine needs from a chat
//! completion, speech synthesis or image generation backend. Concrete HTTP
//! or SDK adapters implement them outside the core; the processors in
//! [`processors`] drive them from inside a pipeline.

pub mod polling;
pub mod processors;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::PipelineError;
use crate::frames::{Frame, ImageFrame, LLMMessage};

pub use polling::{poll_until, PollPolicy, PollStatus};
pub use processors::{ImageGenFailurePolicy, ImageGenProcessor, LLMProcessor, TTSProcessor};

/// Stream of frames produced by a chat completion.
pub type LLMFrameStream = BoxStream<'static, Result<Frame, PipelineError>>;

/// Chat completion backend.
#[async_trait]
pub trait LLMService: Send + Sync {
    /// Short service name used in logs and errors.
    fn name(&self) -> &str;

    /// Start a completion over `messages`.
    ///
    /// The stream yields `Text` fragments and, for tool calls,
    /// `LLMFunctionStart`/`LLMFunctionCall` frames, in generation order.
    async fn run_llm(&self, messages: &[LLMMessage]) -> Result<LLMFrameStream, PipelineError>;
}

/// Speech synthesis backend.
#[async_trait]
pub trait TTSService: Send + Sync {
    fn name(&self) -> &str;

    /// Synthesize `text` into raw audio.
    async fn run_tts(&self, text: &str) -> Result<Vec<u8>, PipelineError>;
}

/// Image generation backend.
///
/// Backends that submit a job and poll for its result should use
/// [`poll_until`] so a stuck job fails with
/// [`PipelineError::ExternalTimeout`] instead of hanging.
#[async_trait]
pub trait ImageGenService: Send + Sync {
    fn name(&self) -> &str;

    async fn run_image_gen(&self, prompt: &str) -> Result<ImageFrame, PipelineError>;
}
