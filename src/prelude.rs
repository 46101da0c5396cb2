// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Common re-exports for convenient use of the dailyai framework.
//!
//! ```
//! use dailyai::prelude::*;
//! ```

pub use std::sync::Arc;

pub use crate::error::PipelineError;
pub use crate::frames::{
    AudioFrame, EndFrame, EndOfBranchFrame, Frame, FrameKind, ImageFrame, ImageMetadata,
    LLMMessage, LLMMessagesFrame, LLMResponseEndFrame, LLMResponseStartFrame, Role, StartFrame,
    TextFrame, TranscriptionFrame, UserStartedSpeakingFrame, UserStoppedSpeakingFrame,
};
pub use crate::observers::{FrameProcessed, Observer};
pub use crate::pipeline::{
    BranchFailurePolicy, EndOfBranchPolicy, FrameChannel, FrameReceiver, FrameSender,
    ParallelPipeline, ParallelPipelineParams, Pipeline, PipelineParams, PipelineState,
};
pub use crate::processors::aggregators::{
    GatedAggregator, LLMAssistantContextAggregator, LLMContextAggregatorPair,
    LLMResponseAggregator, LLMUserContextAggregator, MessageHistory, SentenceAggregator,
    UserResponseAggregator,
};
pub use crate::processors::processor::{Processor, ProcessorContext, ProcessorWeight};
pub use crate::processors::{FrameFilter, FrameLogger, PassthroughProcessor, TextTransformer};
pub use crate::services::{
    poll_until, ImageGenProcessor, ImageGenService, LLMProcessor, LLMService, PollPolicy,
    PollStatus, TTSProcessor, TTSService,
};
