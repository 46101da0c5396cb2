// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Pipeline orchestration for connecting and managing processors.
//!
//! [`Pipeline`] runs each processor on its own tokio task, connected by
//! [`FrameChannel`]s, from a source channel to a sink channel.
//! [`ParallelPipeline`] fans each frame out to several branch pipelines and
//! merges their output in completion order.

pub(crate) mod activity;
pub mod channel;
pub mod parallel;
pub mod params;
pub mod task;

pub use channel::{frame_channel, FrameChannel, FrameReceiver, FrameSender};
pub use parallel::ParallelPipeline;
pub use params::{BranchFailurePolicy, EndOfBranchPolicy, ParallelPipelineParams, PipelineParams};
pub use task::{Pipeline, PipelineState};
