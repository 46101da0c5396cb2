// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Frame processors.
//!
//! Every pipeline stage implements [`Processor`](processor::Processor). This
//! module holds the small general-purpose processors (passthrough, logging,
//! filtering, text mapping); the stateful aggregators live in
//! [`aggregators`].

pub mod aggregators;
pub mod processor;

/// Implement `Debug` and `Display` for a type that contains a `base: ProcessorBase` field.
///
/// The `Debug` impl prints `TypeName(name)` and the `Display` impl prints just the
/// processor name obtained from `self.base.name()`.
///
/// # Examples
///
/// ```ignore
/// impl_base_debug_display!(MyProcessor);
/// ```
#[macro_export]
macro_rules! impl_base_debug_display {
    ($struct_name:ident) => {
        impl std::fmt::Debug for $struct_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($struct_name), self.base.name())
            }
        }

        impl std::fmt::Display for $struct_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.base.name())
            }
        }
    };
}

/// Implement only `Display` for a type that contains a `base: ProcessorBase` field.
///
/// Use this when the type needs a custom `Debug` implementation (e.g. to show
/// extra fields) but the standard `Display` that prints `self.base.name()`.
#[macro_export]
macro_rules! impl_base_display {
    ($struct_name:ident) => {
        impl std::fmt::Display for $struct_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.base.name())
            }
        }
    };
}

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::frames::Frame;
use crate::utils::{instance_name, obj_id};

use self::processor::{Processor, ProcessorContext, ProcessorWeight};

/// Identity shared by every processor: a unique id and a display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorBase {
    id: u64,
    name: String,
}

impl ProcessorBase {
    /// Create a base with an explicit name, or `TypeName#n` when `None`.
    pub fn new(type_name: &str, name: Option<String>) -> Self {
        Self {
            id: obj_id(),
            name: name.unwrap_or_else(|| instance_name(type_name)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// PassthroughProcessor
// ---------------------------------------------------------------------------

/// Forwards every frame unchanged.
///
/// A pipeline built with no processors runs a single passthrough stage.
pub struct PassthroughProcessor {
    base: ProcessorBase,
}

impl PassthroughProcessor {
    pub fn new() -> Self {
        Self {
            base: ProcessorBase::new("PassthroughProcessor", None),
        }
    }
}

impl Default for PassthroughProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl_base_debug_display!(PassthroughProcessor);

#[async_trait]
impl Processor for PassthroughProcessor {
    fn name(&self) -> &str {
        self.base.name()
    }
    fn id(&self) -> u64 {
        self.base.id()
    }
    fn weight(&self) -> ProcessorWeight {
        ProcessorWeight::Light
    }

    async fn process(&mut self, frame: Frame, ctx: &ProcessorContext) -> Result<(), PipelineError> {
        ctx.push(frame).await
    }
}

// ---------------------------------------------------------------------------
// FrameLogger
// ---------------------------------------------------------------------------

/// Logs every frame at `info` level and forwards it unchanged.
pub struct FrameLogger {
    base: ProcessorBase,
    prefix: String,
}

impl FrameLogger {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            base: ProcessorBase::new("FrameLogger", None),
            prefix: prefix.into(),
        }
    }
}

impl_base_debug_display!(FrameLogger);

#[async_trait]
impl Processor for FrameLogger {
    fn name(&self) -> &str {
        self.base.name()
    }
    fn id(&self) -> u64 {
        self.base.id()
    }
    fn weight(&self) -> ProcessorWeight {
        ProcessorWeight::Light
    }

    async fn process(&mut self, frame: Frame, ctx: &ProcessorContext) -> Result<(), PipelineError> {
        tracing::info!(processor = %self.base.name(), "{}: {}", self.prefix, frame);
        ctx.push(frame).await
    }
}

// ---------------------------------------------------------------------------
// FrameFilter
// ---------------------------------------------------------------------------

/// Frame filter that only passes frames accepted by a predicate.
///
/// System frames and terminators always pass through.
pub struct FrameFilter {
    base: ProcessorBase,
    predicate: Box<dyn Fn(&Frame) -> bool + Send + Sync>,
}

impl FrameFilter {
    pub fn new(predicate: impl Fn(&Frame) -> bool + Send + Sync + 'static) -> Self {
        Self {
            base: ProcessorBase::new("FrameFilter", None),
            predicate: Box::new(predicate),
        }
    }

    fn passes(&self, frame: &Frame) -> bool {
        frame.is_terminator() || frame.is_system_frame() || (self.predicate)(frame)
    }
}

impl_base_debug_display!(FrameFilter);

#[async_trait]
impl Processor for FrameFilter {
    fn name(&self) -> &str {
        self.base.name()
    }
    fn id(&self) -> u64 {
        self.base.id()
    }
    fn weight(&self) -> ProcessorWeight {
        ProcessorWeight::Light
    }

    async fn process(&mut self, frame: Frame, ctx: &ProcessorContext) -> Result<(), PipelineError> {
        if self.passes(&frame) {
            ctx.push(frame).await
        } else {
            tracing::trace!(processor = %self.base.name(), frame = %frame, "FrameFilter: dropped");
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// TextTransformer
// ---------------------------------------------------------------------------

/// Stateless map over the content of `Text` frames.
pub struct TextTransformer {
    base: ProcessorBase,
    transform: Box<dyn Fn(&str) -> String + Send + Sync>,
}

impl TextTransformer {
    pub fn new(transform: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self {
            base: ProcessorBase::new("TextTransformer", None),
            transform: Box::new(transform),
        }
    }
}

impl_base_debug_display!(TextTransformer);

#[async_trait]
impl Processor for TextTransformer {
    fn name(&self) -> &str {
        self.base.name()
    }
    fn id(&self) -> u64 {
        self.base.id()
    }
    fn weight(&self) -> ProcessorWeight {
        ProcessorWeight::Light
    }

    async fn process(&mut self, frame: Frame, ctx: &ProcessorContext) -> Result<(), PipelineError> {
        match frame {
            Frame::Text(text) => ctx.push(Frame::text((self.transform)(&text.content))).await,
            other => ctx.push(other).await,
        }
    }
}
