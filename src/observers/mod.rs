// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Observers for monitoring frame flow without modifying the pipeline.
//!
//! An observer attached to a [`Pipeline`](crate::pipeline::Pipeline) is
//! called before every stage processes a frame. Observers see frames by
//! name and kind only; they cannot alter or hold on to them.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use dailyai::observers::{FrameProcessed, Observer};
//!
//! struct DebugObserver;
//!
//! #[async_trait]
//! impl Observer for DebugObserver {
//!     async fn on_process_frame(&self, data: &FrameProcessed) {
//!         println!("{} <- {}", data.processor_name, data.frame_name);
//!     }
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;

use crate::frames::FrameKind;

/// Event data for a frame about to be processed by a stage.
#[derive(Debug, Clone)]
pub struct FrameProcessed {
    /// Unique identifier of the processor.
    pub processor_id: u64,
    /// Human-readable name of the processor.
    pub processor_name: String,
    /// Position of the processor in its pipeline.
    pub stage_index: usize,
    /// Variant name of the frame.
    pub frame_name: &'static str,
    /// The kind (category) of the frame.
    pub frame_kind: FrameKind,
    /// Generation ID of the pipeline run.
    pub generation_id: u64,
    /// Time since the run started.
    pub elapsed: Duration,
}

/// Base trait for pipeline observers.
///
/// The callback has a default no-op implementation.
#[async_trait]
pub trait Observer: Send + Sync {
    /// Called before a processor handles a frame.
    async fn on_process_frame(&self, _data: &FrameProcessed) {}
}
