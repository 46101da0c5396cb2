// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! DailyAI - real-time multimodal orchestration pipelines.
//!
//! A pipeline is a chain of concurrent processors connected by frame
//! channels. Frames carry text fragments, audio and image buffers,
//! transcription events and control signals between speech, LLM and image
//! services and a live transport. This crate is the frame engine: the
//! [`Frame`](frames::Frame) type, the [`Processor`](processors::processor::Processor)
//! abstraction, sequential and parallel pipelines, and the aggregators that
//! fold streaming fragments into sentences and conversational turns.
//!
//! ```no_run
//! use dailyai::prelude::*;
//!
//! # async fn demo() -> Result<(), PipelineError> {
//! let mut pipeline = Pipeline::new(vec![
//!     Box::new(SentenceAggregator::new()),
//!     Box::new(FrameLogger::new("out")),
//! ]);
//! let mut output = pipeline.take_output().expect("output is available once");
//! pipeline
//!     .queue_frames(vec![Frame::text("Hello"), Frame::text(" world."), Frame::end()])
//!     .await?;
//! pipeline.run_pipeline().await?;
//! while let Some(frame) = output.recv().await {
//!     println!("{frame}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod frames;
pub mod observers;
pub mod pipeline;
pub mod prelude;
pub mod processors;
pub mod services;
pub mod utils;
