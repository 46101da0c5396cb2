// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Linear pipeline where each processor runs on its own tokio task.
//!
//! # Architecture
//!
//! ```text
//! [source] --> [Proc1 task] --(bounded)--> [Proc2 task] --> ... --> [sink]
//! ```
//!
//! - **Task isolation**: each stage drains its input channel on its own task
//!   and pushes outputs into the next stage's channel, so a slow stage only
//!   suspends its upstream neighbor (backpressure) and never reorders frames.
//! - **Bounded stage channels**: sized by the receiving processor's weight
//!   (Light=32, Standard=64, Heavy=128) unless overridden.
//! - **JoinSet lifecycle**: all stage tasks are tracked via
//!   `tokio::task::JoinSet`; `run_pipeline` returns after every task exits.
//! - **CancellationToken**: cooperative shutdown after termination or abort.
//!
//! Termination: a terminator (`End` / `EndOfBranch`) is forwarded by every
//! stage and ends that stage's loop. Once the last stage has delivered it to
//! the sink, the run is complete.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::frames::Frame;
use crate::observers::{FrameProcessed, Observer};
use crate::pipeline::activity::ActivityTracker;
use crate::pipeline::channel::{frame_channel, FrameChannel, FrameReceiver, FrameSender};
use crate::pipeline::params::PipelineParams;
use crate::processors::processor::{Processor, ProcessorContext};
use crate::processors::PassthroughProcessor;
use crate::utils::instance_name;

/// Generation counter: every pipeline instance gets its own run id.
static GENERATION: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_generation() -> u64 {
    GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// Lifecycle of a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineState {
    Idle,
    Running,
    Draining,
    Terminated,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Running => write!(f, "Running"),
            Self::Draining => write!(f, "Draining"),
            Self::Terminated => write!(f, "Terminated"),
        }
    }
}

/// An ordered chain of processors with a source and a sink.
///
/// A pipeline runs once: after `run_pipeline` returns the state is
/// [`PipelineState::Terminated`] and a second run fails with
/// [`PipelineError::InvalidState`].
///
/// ```ignore
/// let mut pipeline = Pipeline::new(vec![Box::new(SentenceAggregator::new())]);
/// let mut output = pipeline.take_output().unwrap();
/// pipeline.queue_frames(vec![Frame::text("Hello"), Frame::text(" world."), Frame::end()]).await?;
/// pipeline.run_pipeline().await?;
/// ```
pub struct Pipeline {
    name: String,
    processors: Mutex<Vec<Box<dyn Processor>>>,
    params: PipelineParams,
    source_tx: FrameSender,
    source_rx: Mutex<Option<FrameReceiver>>,
    sink_tx: FrameSender,
    sink_rx: Option<FrameReceiver>,
    owns_sink: bool,
    state: Arc<watch::Sender<PipelineState>>,
    cancel_token: CancellationToken,
    generation_id: u64,
    observers: Vec<Arc<dyn Observer>>,
    activity: Option<ActivityTracker>,
}

impl Pipeline {
    /// Build a pipeline with default parameters and internal channels.
    pub fn new(processors: Vec<Box<dyn Processor>>) -> Self {
        Self::with_params(processors, PipelineParams::default())
    }

    /// Build a pipeline with internal source and sink channels.
    pub fn with_params(processors: Vec<Box<dyn Processor>>, params: PipelineParams) -> Self {
        let source = FrameChannel::with_capacity(params.source_capacity);
        let (sink_tx, sink_rx) = frame_channel(params.sink_capacity);
        Self::build(processors, params, source, sink_tx, Some(sink_rx))
    }

    /// Build a pipeline reading from a caller-supplied source and writing to a
    /// caller-supplied sink (another pipeline's input, a transport, ...).
    ///
    /// An external sink is never closed by the pipeline.
    pub fn with_channels(
        processors: Vec<Box<dyn Processor>>,
        source: FrameChannel,
        sink: FrameSender,
        params: PipelineParams,
    ) -> Self {
        Self::build(processors, params, source, sink, None)
    }

    fn build(
        processors: Vec<Box<dyn Processor>>,
        params: PipelineParams,
        source: FrameChannel,
        sink_tx: FrameSender,
        sink_rx: Option<FrameReceiver>,
    ) -> Self {
        let (source_tx, source_rx) = source.split();
        let (state, _) = watch::channel(PipelineState::Idle);
        Self {
            name: instance_name("Pipeline"),
            processors: Mutex::new(processors),
            params,
            source_tx,
            source_rx: Mutex::new(Some(source_rx)),
            owns_sink: sink_rx.is_some(),
            sink_tx,
            sink_rx,
            state: Arc::new(state),
            cancel_token: CancellationToken::new(),
            generation_id: next_generation(),
            observers: Vec::new(),
            activity: None,
        }
    }

    /// Attach an observer notified before every stage processes a frame.
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observers.push(observer);
        self
    }

    pub(crate) fn with_activity(mut self, activity: ActivityTracker) -> Self {
        self.activity = Some(activity);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the generation ID of this pipeline's run.
    pub fn generation_id(&self) -> u64 {
        self.generation_id
    }

    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    /// Subscribe to state transitions.
    pub fn state_watcher(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// A sender feeding the head of the pipeline. Frames put here are
    /// processed in order with frames queued through [`queue_frames`](Self::queue_frames).
    pub fn input(&self) -> FrameSender {
        self.source_tx.clone()
    }

    /// Take the sink receiver. Returns `None` if it was already taken or the
    /// pipeline writes to an external sink.
    pub fn take_output(&mut self) -> Option<FrameReceiver> {
        self.sink_rx.take()
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Enqueue frames onto the source, in order, without starting the run.
    ///
    /// Valid while `Idle` or `Running`.
    pub async fn queue_frames<I>(&self, frames: I) -> Result<(), PipelineError>
    where
        I: IntoIterator<Item = Frame>,
    {
        for frame in frames {
            let state = self.state();
            if !matches!(state, PipelineState::Idle | PipelineState::Running) {
                return Err(PipelineError::InvalidState { state });
            }
            self.source_tx.put(frame).await?;
        }
        Ok(())
    }

    /// Run until a terminator reaches the sink or a stage fails.
    pub async fn run_pipeline(&self) -> Result<(), PipelineError> {
        let started = self.state.send_if_modified(|state| {
            if *state == PipelineState::Idle {
                *state = PipelineState::Running;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(PipelineError::InvalidState {
                state: self.state(),
            });
        }

        let source_rx = self
            .source_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let mut processors = std::mem::take(
            &mut *self
                .processors
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let Some(source_rx) = source_rx else {
            self.state.send_replace(PipelineState::Terminated);
            return Err(PipelineError::InvalidState {
                state: PipelineState::Terminated,
            });
        };
        if processors.is_empty() {
            processors.push(Box::new(PassthroughProcessor::new()));
        }

        tracing::debug!(
            pipeline = %self.name,
            generation = self.generation_id,
            stages = processors.len(),
            "Pipeline: run started"
        );

        let delivered = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let observers: Arc<[Arc<dyn Observer>]> = self.observers.clone().into();
        let started_at = Instant::now();

        // Channel i feeds stage i; the last stage writes to the sink.
        let n = processors.len();
        let weights: Vec<_> = processors.iter().map(|p| p.weight()).collect();
        let mut stages = Vec::with_capacity(n);
        let mut input = source_rx;
        for (index, processor) in processors.into_iter().enumerate() {
            let is_last = index + 1 == n;
            let (output, next_input) = if is_last {
                (self.sink_tx.clone(), None)
            } else {
                let cap = self.params.stage_capacity_for(weights[index + 1]);
                let (tx, rx) = frame_channel(Some(cap));
                (tx, Some(rx))
            };
            let ctx = ProcessorContext::new(output)
                .with_cancel_token(self.cancel_token.clone())
                .with_generation_id(self.generation_id)
                .with_end_of_branch(self.params.end_of_branch)
                .with_activity(self.activity.clone())
                .with_external_sink(is_last && !self.owns_sink);
            stages.push(Stage {
                index,
                is_last,
                processor,
                input,
                ctx,
                state: self.state.clone(),
                activity: self.activity.clone(),
                delivered: delivered.clone(),
                observers: observers.clone(),
                started_at,
            });
            match next_input {
                Some(rx) => input = rx,
                None => break,
            }
        }

        // Every stage is set up before any frame is dispatched.
        let mut failure: Option<PipelineError> = None;
        for stage in stages.iter_mut() {
            if let Err(err) = stage.setup().await {
                failure = Some(err);
                break;
            }
        }

        if failure.is_some() {
            for stage in stages.iter_mut() {
                stage.processor.cleanup().await;
            }
        } else {
            let mut join_set = JoinSet::new();
            for stage in stages {
                join_set.spawn(stage.run());
            }
            while let Some(joined) = join_set.join_next().await {
                let result = joined.unwrap_or_else(|join_err| {
                    Err(PipelineError::ProcessorPanicked {
                        processor: self.name.clone(),
                        message: join_err.to_string(),
                    })
                });
                if let Err(err) = result {
                    if failure.is_none() && !delivered.load(Ordering::Acquire) {
                        self.cancel_token.cancel();
                        failure = Some(err);
                    }
                }
            }
        }

        match self.finish(failure, &delivered) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Close the pipeline's channels and settle the run's outcome.
    fn finish(
        &self,
        failure: Option<PipelineError>,
        delivered: &std::sync::atomic::AtomicBool,
    ) -> Option<PipelineError> {
        self.source_tx.close();
        if self.owns_sink {
            self.sink_tx.close();
        }
        self.cancel_token.cancel();
        self.state.send_replace(PipelineState::Terminated);

        match failure {
            Some(err) => {
                tracing::error!(
                    pipeline = %self.name,
                    generation = self.generation_id,
                    error = %err,
                    "Pipeline: run aborted"
                );
                Some(err)
            }
            None if delivered.load(Ordering::Acquire) => {
                tracing::debug!(pipeline = %self.name, "Pipeline: run finished");
                None
            }
            None => {
                tracing::debug!(pipeline = %self.name, "Pipeline: run cancelled");
                Some(PipelineError::Cancelled)
            }
        }
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("generation_id", &self.generation_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

// ---------------------------------------------------------------------------
// Stage task
// ---------------------------------------------------------------------------

/// Why a stage loop ended.
enum StageExit {
    /// A terminator was forwarded downstream.
    Terminated,
    /// The input channel reached end-of-stream without a terminator.
    InputClosed,
    /// The run was cancelled or downstream went away.
    Stopped,
}

struct Stage {
    index: usize,
    is_last: bool,
    processor: Box<dyn Processor>,
    input: FrameReceiver,
    ctx: ProcessorContext,
    state: Arc<watch::Sender<PipelineState>>,
    activity: Option<ActivityTracker>,
    delivered: Arc<std::sync::atomic::AtomicBool>,
    observers: Arc<[Arc<dyn Observer>]>,
    started_at: Instant,
}

impl Stage {
    async fn setup(&mut self) -> Result<(), PipelineError> {
        if let Err(err) = self.processor.setup(&self.ctx).await {
            return Err(self.abort("setup", err));
        }
        tracing::debug!(
            processor = %self.processor.name(),
            stage = self.index,
            weight = %self.processor.weight(),
            "Pipeline: processor started"
        );
        Ok(())
    }

    async fn run(mut self) -> Result<(), PipelineError> {
        let result = self.process_loop().await;

        self.input.close();
        self.processor.cleanup().await;
        tracing::debug!(processor = %self.processor.name(), "Pipeline: processor stopped");

        match result {
            Ok(exit) => {
                if self.is_last {
                    if matches!(exit, StageExit::Terminated) {
                        self.delivered.store(true, Ordering::Release);
                    }
                    // Nothing upstream can reach the sink any more.
                    self.ctx.cancel_token().cancel();
                }
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn process_loop(&mut self) -> Result<StageExit, PipelineError> {
        let cancel = self.ctx.cancel_token().clone();
        loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(StageExit::Stopped),
                frame = self.input.recv() => match frame {
                    Some(frame) => frame,
                    None => return Ok(StageExit::InputClosed),
                },
            };

            let exit = self.dispatch(frame).await;
            // The input frame stays in flight until all of its outputs,
            // including a forwarded terminator, have been pushed.
            if let Some(activity) = &self.activity {
                activity.finish();
            }
            if let Some(exit) = exit? {
                return Ok(exit);
            }
        }
    }

    /// Process one frame. Returns `Some` when the stage must stop.
    async fn dispatch(&mut self, frame: Frame) -> Result<Option<StageExit>, PipelineError> {
        let frame_name = frame.name();
        let terminator = frame.is_terminator().then(|| frame.clone());
        if terminator.is_some() {
            self.mark_draining();
        }

        tracing::trace!(
            processor = %self.processor.name(),
            frame = %frame,
            "Pipeline: dispatching"
        );
        self.notify_observers(&frame).await;

        let outcome = AssertUnwindSafe(self.processor.process(frame, &self.ctx))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                if self.is_quiet_failure(&err) {
                    return Ok(Some(StageExit::Stopped));
                }
                return Err(self.abort(frame_name, err));
            }
            Err(panic_info) => {
                let message = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };
                tracing::error!(
                    processor = %self.processor.name(),
                    "Processor panicked: {message}"
                );
                let err = PipelineError::ProcessorPanicked {
                    processor: self.processor.name().to_string(),
                    message,
                };
                return Err(self.abort(frame_name, err));
            }
        }

        let pushed_terminator = self.ctx.take_terminator_pushed();
        if let Some(terminator) = terminator {
            if !pushed_terminator {
                if let Err(err) = self.ctx.push(terminator).await {
                    if self.is_quiet_failure(&err) {
                        return Ok(Some(StageExit::Stopped));
                    }
                    return Err(self.abort(frame_name, err));
                }
            }
            tracing::debug!(
                processor = %self.processor.name(),
                frame = frame_name,
                "Pipeline: terminator forwarded"
            );
            return Ok(Some(StageExit::Terminated));
        }
        if pushed_terminator {
            // The processor ended the pipeline on its own.
            self.mark_draining();
            return Ok(Some(StageExit::Terminated));
        }
        Ok(None)
    }

    /// Errors caused by the run already shutting down rather than by the
    /// processor itself.
    fn is_quiet_failure(&self, err: &PipelineError) -> bool {
        self.ctx.is_cancelled()
            || matches!(err, PipelineError::ChannelClosed) && self.ctx.output_closed()
    }

    fn abort(&self, frame: &'static str, err: PipelineError) -> PipelineError {
        tracing::error!(
            processor = %self.processor.name(),
            frame = frame,
            error = %err,
            "Pipeline: stage failed, aborting run"
        );
        self.ctx.cancel_token().cancel();
        PipelineError::PipelineAborted {
            processor: self.processor.name().to_string(),
            frame,
            source: Box::new(err),
        }
    }

    fn mark_draining(&self) {
        self.state.send_if_modified(|state| {
            if *state == PipelineState::Running {
                *state = PipelineState::Draining;
                true
            } else {
                false
            }
        });
    }

    async fn notify_observers(&self, frame: &Frame) {
        if self.observers.is_empty() {
            return;
        }
        let data = FrameProcessed {
            processor_id: self.processor.id(),
            processor_name: self.processor.name().to_string(),
            stage_index: self.index,
            frame_name: frame.name(),
            frame_kind: frame.kind(),
            generation_id: self.ctx.generation_id(),
            elapsed: self.started_at.elapsed(),
        };
        for observer in self.observers.iter() {
            observer.on_process_frame(&data).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
