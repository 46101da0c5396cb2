// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Processor trait with explicit context passing.
//!
//! This module defines the [`Processor`] trait alongside [`ProcessorContext`]
//! and [`ProcessorWeight`].
//!
//! - **Explicit context**: `ProcessorContext` carries the stage's output
//!   channel. Every [`ProcessorContext::push`] delivers one frame downstream
//!   immediately, so the frames a processor produces for one input form a
//!   lazy, ordered sequence that the next stage starts consuming before
//!   `process` returns.
//! - **Typed failures**: `process` returns `Result`; an `Err` aborts the
//!   enclosing pipeline run. Processors that want best-effort behavior log
//!   and swallow the error themselves.
//! - **ProcessorWeight**: sizes the channel feeding the processor.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::frames::Frame;
use crate::pipeline::activity::ActivityTracker;
use crate::pipeline::channel::FrameSender;
use crate::pipeline::params::EndOfBranchPolicy;

// ---------------------------------------------------------------------------
// ProcessorWeight
// ---------------------------------------------------------------------------

/// Categorizes the computational cost of a processor.
///
/// The pipeline sizes the bounded channel feeding each processor from its
/// weight, giving slow stages more room to absorb bursts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProcessorWeight {
    /// Lightweight: pass-through, filters, simple transforms.
    Light,
    /// Standard: aggregators, state machines, moderate computation.
    #[default]
    Standard,
    /// Heavy: LLM inference, TTS synthesis, image generation.
    Heavy,
}

impl fmt::Display for ProcessorWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Light => write!(f, "Light"),
            Self::Standard => write!(f, "Standard"),
            Self::Heavy => write!(f, "Heavy"),
        }
    }
}

// ---------------------------------------------------------------------------
// ProcessorContext
// ---------------------------------------------------------------------------

/// Context provided to processors during frame processing.
///
/// Carries the output channel, a cancellation token for cooperative
/// shutdown, the generation ID of the pipeline run, and the run's
/// `EndOfBranch` policy.
pub struct ProcessorContext {
    output: FrameSender,
    cancel_token: CancellationToken,
    generation_id: u64,
    end_of_branch: EndOfBranchPolicy,
    activity: Option<ActivityTracker>,
    external_sink: bool,
    terminator_pushed: AtomicBool,
}

impl ProcessorContext {
    /// Create a context that pushes into `output`.
    pub fn new(output: FrameSender) -> Self {
        Self {
            output,
            cancel_token: CancellationToken::new(),
            generation_id: 0,
            end_of_branch: EndOfBranchPolicy::default(),
            activity: None,
            external_sink: false,
            terminator_pushed: AtomicBool::new(false),
        }
    }

    pub fn with_cancel_token(mut self, cancel_token: CancellationToken) -> Self {
        self.cancel_token = cancel_token;
        self
    }

    pub fn with_generation_id(mut self, generation_id: u64) -> Self {
        self.generation_id = generation_id;
        self
    }

    pub fn with_end_of_branch(mut self, policy: EndOfBranchPolicy) -> Self {
        self.end_of_branch = policy;
        self
    }

    pub(crate) fn with_activity(mut self, activity: Option<ActivityTracker>) -> Self {
        self.activity = activity;
        self
    }

    /// Mark the output as a sink owned by someone else (another pipeline's
    /// input). `EndOfBranch` ends the run without being delivered there.
    pub(crate) fn with_external_sink(mut self, external_sink: bool) -> Self {
        self.external_sink = external_sink;
        self
    }

    /// Deliver a frame to the next stage.
    ///
    /// Suspends while the downstream channel is full. Fails with
    /// [`PipelineError::Cancelled`] if the run is cancelled while waiting and
    /// with [`PipelineError::ChannelClosed`] if downstream is gone.
    pub async fn push(&self, frame: impl Into<Frame> + Send) -> Result<(), PipelineError> {
        let frame = frame.into();
        if frame.is_terminator() {
            self.terminator_pushed.store(true, Ordering::Release);
            if self.external_sink && matches!(frame, Frame::EndOfBranch(_)) {
                tracing::debug!(
                    generation = self.generation_id,
                    "ProcessorContext: EndOfBranch kept out of external sink"
                );
                return Ok(());
            }
        }
        if let Some(activity) = &self.activity {
            activity.begin();
        }
        let result = tokio::select! {
            biased;
            _ = self.cancel_token.cancelled() => Err(PipelineError::Cancelled),
            res = self.output.put(frame) => res,
        };
        if result.is_err() {
            if let Some(activity) = &self.activity {
                activity.finish();
            }
        }
        result
    }

    /// Push every frame in order, stopping at the first failure.
    pub async fn push_all<I>(&self, frames: I) -> Result<(), PipelineError>
    where
        I: IntoIterator<Item = Frame> + Send,
        I::IntoIter: Send,
    {
        for frame in frames {
            self.push(frame).await?;
        }
        Ok(())
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Get the cancellation token for cooperative shutdown.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// Identifier of the pipeline run this context belongs to.
    pub fn generation_id(&self) -> u64 {
        self.generation_id
    }

    /// How buffered output is treated on `EndOfBranch`.
    pub fn end_of_branch_policy(&self) -> EndOfBranchPolicy {
        self.end_of_branch
    }

    /// Returns `true` once the stage's downstream channel is closed.
    pub(crate) fn output_closed(&self) -> bool {
        self.output.is_closed()
    }

    /// Returns and clears the "terminator pushed" flag.
    pub(crate) fn take_terminator_pushed(&self) -> bool {
        self.terminator_pushed.swap(false, Ordering::AcqRel)
    }
}

impl fmt::Debug for ProcessorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorContext")
            .field("generation_id", &self.generation_id)
            .field("end_of_branch", &self.end_of_branch)
            .field("external_sink", &self.external_sink)
            .field("cancelled", &self.cancel_token.is_cancelled())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Processor trait
// ---------------------------------------------------------------------------

/// A pipeline stage.
///
/// - Accepts [`Frame`] (pattern-matchable, owned: the input is never shared
///   with another stage, so it cannot be mutated behind anyone's back)
/// - Uses [`ProcessorContext`] to deliver output frames in order
/// - Returns `Err` to abort the enclosing run
///
/// A processor that does not forward a terminator (`End`/`EndOfBranch`) it
/// received gets it forwarded by the pipeline after `process` returns.
///
/// # Example
///
/// ```ignore
/// struct UpperCaseProcessor;
///
/// #[async_trait]
/// impl Processor for UpperCaseProcessor {
///     fn name(&self) -> &str { "UpperCase" }
///     fn id(&self) -> u64 { 0 }
///
///     async fn process(&mut self, frame: Frame, ctx: &ProcessorContext) -> Result<(), PipelineError> {
///         match frame {
///             Frame::Text(text) => ctx.push(Frame::text(text.content.to_uppercase())).await,
///             other => ctx.push(other).await,
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Processor: Send + Sync + fmt::Debug + fmt::Display {
    /// Human-readable name for logging and debugging.
    fn name(&self) -> &str;

    /// Unique identifier for this processor instance.
    fn id(&self) -> u64;

    /// Computational weight, used to size the channel feeding this processor.
    fn weight(&self) -> ProcessorWeight {
        ProcessorWeight::Standard
    }

    /// Process a single frame, pushing zero or more output frames through `ctx`.
    async fn process(&mut self, frame: Frame, ctx: &ProcessorContext) -> Result<(), PipelineError>;

    /// Lifecycle: called once when the pipeline starts, for every stage in
    /// order, before the first frame is dispatched. An `Err` aborts the run.
    async fn setup(&mut self, _ctx: &ProcessorContext) -> Result<(), PipelineError> {
        Ok(())
    }

    /// Lifecycle: called once when the stage stops, whether the run ended
    /// normally or was aborted.
    async fn cleanup(&mut self) {}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
