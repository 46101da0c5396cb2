// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration for pipelines and parallel pipelines.
//!
//! All structs deserialize from partial JSON: missing fields take their
//! `Default` value.

use serde::{Deserialize, Serialize};

use crate::processors::processor::ProcessorWeight;

/// What a stateful processor does with buffered partial output when an
/// `EndOfBranch` frame arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndOfBranchPolicy {
    /// Emit buffered output before forwarding the terminator.
    #[default]
    Flush,
    /// Drop buffered output.
    Discard,
}

/// What a parallel pipeline does when one branch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchFailurePolicy {
    /// Cancel every sibling and surface the failure.
    #[default]
    FailFast,
    /// Log the failure, retire the branch, keep the siblings running.
    Isolated,
}

/// Parameters for a linear [`Pipeline`](super::Pipeline).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParams {
    /// Capacity of the internally created source channel (`None` = unbounded).
    pub source_capacity: Option<usize>,
    /// Capacity of the internally created sink channel (`None` = unbounded).
    pub sink_capacity: Option<usize>,
    /// Fixed capacity for every inter-stage channel. When unset each channel
    /// is sized by the weight of the processor reading from it.
    pub stage_capacity: Option<usize>,
    /// Flush or discard buffered output on `EndOfBranch`.
    pub end_of_branch: EndOfBranchPolicy,
}

impl PipelineParams {
    /// Capacity of the channel feeding a processor of the given weight.
    pub fn stage_capacity_for(&self, weight: ProcessorWeight) -> usize {
        self.stage_capacity
            .unwrap_or_else(|| data_channel_capacity(weight))
    }
}

/// Capacity for inter-stage channels based on processor weight.
pub fn data_channel_capacity(weight: ProcessorWeight) -> usize {
    match weight {
        ProcessorWeight::Light => 32,
        ProcessorWeight::Standard => 64,
        ProcessorWeight::Heavy => 128,
    }
}

/// Parameters for a [`ParallelPipeline`](super::ParallelPipeline).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelPipelineParams {
    /// Fail-fast or fail-isolated handling of branch failures.
    pub branch_failure: BranchFailurePolicy,
    /// Capacity of the shared input tap when run standalone.
    pub tap_capacity: Option<usize>,
    /// Capacity of the merged output channel when run standalone.
    pub sink_capacity: Option<usize>,
    /// Parameters applied to every branch.
    pub branch: PipelineParams,
}
