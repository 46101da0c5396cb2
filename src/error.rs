// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Error types shared by channels, processors and pipelines.

use crate::pipeline::PipelineState;

/// Errors surfaced by the frame engine.
///
/// Channel-level errors are reported to the immediate caller. Errors returned
/// from [`Processor::process`](crate::processors::processor::Processor::process)
/// abort the owning pipeline run and reach the caller of `run_pipeline`
/// wrapped in [`PipelineError::PipelineAborted`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A frame was put onto a channel after it was closed.
    #[error("channel closed")]
    ChannelClosed,

    /// A polled external operation did not reach a terminal status in time.
    #[error("{operation} timed out after {attempts} attempts")]
    ExternalTimeout { operation: String, attempts: u32 },

    /// An external service reported a terminal failure.
    #[error("{service} failed: {message}")]
    ExternalServiceError { service: String, message: String },

    /// A stage raised a propagated failure mid-run.
    #[error("pipeline aborted in {processor} while processing {frame}: {source}")]
    PipelineAborted {
        processor: String,
        frame: &'static str,
        #[source]
        source: Box<PipelineError>,
    },

    /// A processor panicked while handling a frame.
    #[error("processor {processor} panicked: {message}")]
    ProcessorPanicked { processor: String, message: String },

    /// The pipeline was cancelled before a terminator reached its sink.
    #[error("pipeline cancelled")]
    Cancelled,

    /// The operation is not valid in the pipeline's current state.
    #[error("invalid pipeline state: {state}")]
    InvalidState { state: PipelineState },

    /// The message history is being written by another running pipeline.
    #[error("message history is in use by another pipeline run")]
    HistoryInUse,
}

impl PipelineError {
    /// Shorthand for an [`ExternalServiceError`](Self::ExternalServiceError).
    pub fn service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalServiceError {
            service: service.into(),
            message: message.into(),
        }
    }

    /// The innermost error, looking through [`PipelineAborted`](Self::PipelineAborted)
    /// wrappers added by nested pipelines.
    pub fn root_cause(&self) -> &PipelineError {
        match self {
            Self::PipelineAborted { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
