// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Concurrent branches sharing one input tap.
//!
//! Every frame that reaches a [`ParallelPipeline`] is broadcast to all live
//! branches. The parallel pipeline then waits for each branch to finish the
//! work that frame caused (a *step*) and appends the branch's output for the
//! step to its own output as one contiguous group. Groups are appended in the
//! order branches complete, so a fast branch is never held back by a slow
//! one, while each branch's internal order is preserved.
//!
//! ```text
//!              +--> [branch 0: Pipeline] --+
//! [tap] -------+                           +--> (completion order) --> [sink]
//!              +--> [branch 1: Pipeline] --+
//! ```
//!
//! A frame that several branches pass through unchanged is emitted once,
//! in the group of the first branch to complete; frames the branches
//! produce themselves are never merged.
//!
//! Branch terminators are not forwarded. When a terminator arrives on the
//! tap it is broadcast, every branch is awaited to `Terminated`, and a single
//! copy of the terminator is emitted last.
//!
//! A `ParallelPipeline` is a [`Processor`], so it can be a stage of a linear
//! [`Pipeline`], or it can be driven directly with
//! [`run_pipeline`](ParallelPipeline::run_pipeline).

use std::fmt;

use async_trait::async_trait;
use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::frames::Frame;
use crate::pipeline::activity::ActivityTracker;
use crate::pipeline::channel::{frame_channel, FrameReceiver, FrameSender};
use crate::pipeline::params::{BranchFailurePolicy, ParallelPipelineParams};
use crate::pipeline::task::{next_generation, Pipeline, PipelineState};
use crate::processors::processor::{Processor, ProcessorContext, ProcessorWeight};
use crate::utils::{instance_name, obj_id};

/// One running branch.
struct Branch {
    index: usize,
    input: FrameSender,
    output: FrameReceiver,
    activity: ActivityTracker,
    cancel: CancellationToken,
    handle: Option<JoinHandle<Result<(), PipelineError>>>,
    live: bool,
}

/// What one branch produced for one step.
struct StepOutput {
    index: usize,
    frames: Vec<Frame>,
    /// `Some` once the branch has finished running.
    finished: Option<Result<(), PipelineError>>,
}

impl Branch {
    /// Read the branch's output until the current step is done.
    async fn collect_step(&mut self) -> StepOutput {
        let mut frames = Vec::new();
        let mut saw_terminator = false;
        let mut ended = false;
        loop {
            tokio::select! {
                biased;
                frame = self.output.recv() => match frame {
                    Some(frame) => {
                        self.activity.finish();
                        if frame.is_terminator() {
                            saw_terminator = true;
                        } else {
                            frames.push(frame);
                        }
                    }
                    None => {
                        ended = true;
                        break;
                    }
                },
                _ = self.activity.idle() => break,
            }
        }
        let finished = if saw_terminator || ended {
            Some(self.join().await)
        } else {
            None
        };
        StepOutput {
            index: self.index,
            frames,
            finished,
        }
    }

    async fn join(&mut self) -> Result<(), PipelineError> {
        self.live = false;
        match self.handle.take() {
            Some(handle) => handle.await.unwrap_or_else(|join_err| {
                Err(PipelineError::ProcessorPanicked {
                    processor: format!("branch {}", self.index),
                    message: join_err.to_string(),
                })
            }),
            None => Ok(()),
        }
    }
}

/// Concurrent composition of linear pipelines.
pub struct ParallelPipeline {
    id: u64,
    name: String,
    params: ParallelPipelineParams,
    pending: Vec<Vec<Box<dyn Processor>>>,
    branches: Vec<Branch>,
    tap_tx: FrameSender,
    tap_rx: Option<FrameReceiver>,
    sink_tx: FrameSender,
    sink_rx: Option<FrameReceiver>,
    state: PipelineState,
    generation_id: u64,
}

impl ParallelPipeline {
    /// Build from one processor list per branch.
    pub fn new(branches: Vec<Vec<Box<dyn Processor>>>) -> Self {
        Self::with_params(branches, ParallelPipelineParams::default())
    }

    pub fn with_params(
        branches: Vec<Vec<Box<dyn Processor>>>,
        params: ParallelPipelineParams,
    ) -> Self {
        let (tap_tx, tap_rx) = frame_channel(params.tap_capacity);
        let (sink_tx, sink_rx) = frame_channel(params.sink_capacity);
        Self {
            id: obj_id(),
            name: instance_name("ParallelPipeline"),
            params,
            pending: branches,
            branches: Vec::new(),
            tap_tx,
            tap_rx: Some(tap_rx),
            sink_tx,
            sink_rx: Some(sink_rx),
            state: PipelineState::Idle,
            generation_id: next_generation(),
        }
    }

    /// Sender feeding the shared tap when run standalone.
    pub fn input(&self) -> FrameSender {
        self.tap_tx.clone()
    }

    /// Take the merged output receiver when run standalone.
    pub fn take_output(&mut self) -> Option<FrameReceiver> {
        self.sink_rx.take()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Enqueue frames onto the shared tap without starting the run.
    pub async fn queue_frames<I>(&self, frames: I) -> Result<(), PipelineError>
    where
        I: IntoIterator<Item = Frame>,
    {
        if !matches!(self.state, PipelineState::Idle | PipelineState::Running) {
            return Err(PipelineError::InvalidState { state: self.state });
        }
        for frame in frames {
            self.tap_tx.put(frame).await?;
        }
        Ok(())
    }

    /// Drive the parallel pipeline from its own tap into its own sink until a
    /// terminator has passed through every branch.
    pub async fn run_pipeline(&mut self) -> Result<(), PipelineError> {
        if self.state != PipelineState::Idle {
            return Err(PipelineError::InvalidState { state: self.state });
        }
        let Some(mut tap) = self.tap_rx.take() else {
            return Err(PipelineError::InvalidState { state: self.state });
        };
        self.state = PipelineState::Running;
        tracing::debug!(
            pipeline = %self.name,
            branches = self.pending.len(),
            "ParallelPipeline: run started"
        );

        let ctx = ProcessorContext::new(self.sink_tx.clone())
            .with_generation_id(self.generation_id)
            .with_end_of_branch(self.params.branch.end_of_branch);
        let result = loop {
            let Some(frame) = tap.recv().await else {
                break Err(PipelineError::Cancelled);
            };
            let terminator = frame.is_terminator();
            if terminator {
                self.state = PipelineState::Draining;
            }
            if let Err(err) = self.process(frame, &ctx).await {
                break Err(err);
            }
            if terminator {
                break Ok(());
            }
        };

        self.cleanup().await;
        tap.close();
        self.sink_tx.close();
        self.state = PipelineState::Terminated;
        if let Err(err) = &result {
            tracing::error!(pipeline = %self.name, error = %err, "ParallelPipeline: run aborted");
        }
        result
    }

    fn ensure_started(&mut self) -> Result<(), PipelineError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        for (index, processors) in std::mem::take(&mut self.pending).into_iter().enumerate() {
            let activity = ActivityTracker::new();
            let mut pipeline = Pipeline::with_params(processors, self.params.branch.clone())
                .with_activity(activity.clone());
            let output = pipeline.take_output().ok_or(PipelineError::InvalidState {
                state: pipeline.state(),
            })?;
            let input = pipeline.input();
            let cancel = pipeline.cancel_token();
            let handle = tokio::spawn(async move { pipeline.run_pipeline().await });
            self.branches.push(Branch {
                index,
                input,
                output,
                activity,
                cancel,
                handle: Some(handle),
                live: true,
            });
        }
        tracing::debug!(
            pipeline = %self.name,
            branches = self.branches.len(),
            "ParallelPipeline: branches started"
        );
        Ok(())
    }

    async fn broadcast(&mut self, frame: &Frame) {
        for branch in self.branches.iter_mut().filter(|b| b.live) {
            branch.activity.begin();
            if branch.input.put(frame.clone()).await.is_err() {
                // The branch already stopped; collect_step will observe it.
                branch.activity.finish();
            }
        }
    }

    async fn stop_all(&mut self) {
        for branch in &self.branches {
            branch.cancel.cancel();
        }
        for branch in self.branches.iter_mut() {
            let _ = branch.join().await;
        }
    }
}

impl fmt::Debug for ParallelPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelPipeline")
            .field("name", &self.name)
            .field("branches", &(self.pending.len() + self.branches.len()))
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ParallelPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[async_trait]
impl Processor for ParallelPipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn weight(&self) -> ProcessorWeight {
        ProcessorWeight::Heavy
    }

    async fn process(&mut self, frame: Frame, ctx: &ProcessorContext) -> Result<(), PipelineError> {
        self.ensure_started()?;
        let terminator = frame.is_terminator().then(|| frame.clone());
        if terminator.is_none() && !self.branches.iter().any(|b| b.live) {
            tracing::warn!(
                pipeline = %self.name,
                frame = %frame,
                "ParallelPipeline: no live branch, dropping frame"
            );
            return Ok(());
        }
        self.broadcast(&frame).await;

        let policy = self.params.branch_failure;
        let mut failure = None;
        {
            let mut steps: FuturesUnordered<_> = self
                .branches
                .iter_mut()
                .filter(|b| b.live)
                .map(|b| b.collect_step())
                .collect();
            // A frame that branches forwarded untouched is emitted once.
            let mut input_forwarded = false;
            while let Some(step) = steps.next().await {
                for output in step.frames {
                    if output == frame {
                        if input_forwarded {
                            continue;
                        }
                        input_forwarded = true;
                    }
                    ctx.push(output).await?;
                }
                match step.finished {
                    Some(Ok(())) | Some(Err(PipelineError::Cancelled)) | None => {}
                    Some(Err(err)) => match policy {
                        BranchFailurePolicy::FailFast => {
                            failure = Some(err);
                            break;
                        }
                        BranchFailurePolicy::Isolated => {
                            tracing::warn!(
                                pipeline = %self.name,
                                branch = step.index,
                                error = %err,
                                "ParallelPipeline: branch failed, siblings keep running"
                            );
                        }
                    },
                }
            }
        }

        if let Some(err) = failure {
            tracing::error!(
                pipeline = %self.name,
                error = %err,
                "ParallelPipeline: branch failed, cancelling siblings"
            );
            self.stop_all().await;
            return Err(err);
        }

        if let Some(terminator) = terminator {
            // Branches that missed the terminator (already retired) are done.
            self.stop_all().await;
            ctx.push(terminator).await?;
        }
        Ok(())
    }

    async fn cleanup(&mut self) {
        if self.branches.iter().any(|b| b.live) {
            self.stop_all().await;
        }
    }
}
