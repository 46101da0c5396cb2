// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Processors that drive external services from inside a pipeline.
//!
//! | Processor | Trigger | Output | On failure |
//! |---|---|---|---|
//! | [`LLMProcessor`] | `LLMMessages` | `LLMResponseStart`, fragments, `LLMResponseEnd` | abort the run |
//! | [`TTSProcessor`] | `Text` | `Audio`, then the `Text` | log and drop the audio |
//! | [`ImageGenProcessor`] | `Text` | `Image` | per [`ImageGenFailurePolicy`] |
//!
//! Every other frame is forwarded unchanged.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use super::{ImageGenService, LLMService, TTSService};
use crate::error::PipelineError;
use crate::frames::{AudioFrame, Frame, LLMResponseEndFrame, LLMResponseStartFrame};
use crate::impl_base_display;
use crate::processors::processor::{Processor, ProcessorContext, ProcessorWeight};
use crate::processors::ProcessorBase;

// ---------------------------------------------------------------------------
// LLMProcessor
// ---------------------------------------------------------------------------

/// Runs a chat completion for every `LLMMessages` frame.
pub struct LLMProcessor {
    base: ProcessorBase,
    service: Arc<dyn LLMService>,
}

impl LLMProcessor {
    pub fn new(service: Arc<dyn LLMService>) -> Self {
        Self {
            base: ProcessorBase::new("LLMProcessor", None),
            service,
        }
    }
}

impl fmt::Debug for LLMProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LLMProcessor")
            .field("name", &self.base.name())
            .field("service", &self.service.name())
            .finish()
    }
}

impl_base_display!(LLMProcessor);

#[async_trait]
impl Processor for LLMProcessor {
    fn name(&self) -> &str {
        self.base.name()
    }
    fn id(&self) -> u64 {
        self.base.id()
    }
    fn weight(&self) -> ProcessorWeight {
        ProcessorWeight::Heavy
    }

    async fn process(&mut self, frame: Frame, ctx: &ProcessorContext) -> Result<(), PipelineError> {
        let messages = match frame {
            Frame::LLMMessages(messages) => messages,
            other => return ctx.push(other).await,
        };

        tracing::debug!(
            processor = %self.base.name(),
            service = %self.service.name(),
            messages = messages.history.len(),
            "LLMProcessor: running completion"
        );
        ctx.push(LLMResponseStartFrame::new()).await?;
        let mut stream = self.service.run_llm(&messages.history).await?;
        while let Some(fragment) = stream.next().await {
            ctx.push(fragment?).await?;
        }
        ctx.push(LLMResponseEndFrame::new()).await
    }
}

// ---------------------------------------------------------------------------
// TTSProcessor
// ---------------------------------------------------------------------------

/// Synthesizes speech for every `Text` frame on a best-effort basis.
pub struct TTSProcessor {
    base: ProcessorBase,
    service: Arc<dyn TTSService>,
}

impl TTSProcessor {
    pub fn new(service: Arc<dyn TTSService>) -> Self {
        Self {
            base: ProcessorBase::new("TTSProcessor", None),
            service,
        }
    }
}

impl fmt::Debug for TTSProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TTSProcessor")
            .field("name", &self.base.name())
            .field("service", &self.service.name())
            .finish()
    }
}

impl_base_display!(TTSProcessor);

#[async_trait]
impl Processor for TTSProcessor {
    fn name(&self) -> &str {
        self.base.name()
    }
    fn id(&self) -> u64 {
        self.base.id()
    }
    fn weight(&self) -> ProcessorWeight {
        ProcessorWeight::Heavy
    }

    async fn process(&mut self, frame: Frame, ctx: &ProcessorContext) -> Result<(), PipelineError> {
        let text = match &frame {
            Frame::Text(text) if !text.content.trim().is_empty() => text.content.clone(),
            _ => return ctx.push(frame).await,
        };

        match self.service.run_tts(&text).await {
            Ok(samples) => ctx.push(AudioFrame::new(samples)).await?,
            Err(e) => {
                tracing::warn!(
                    service = %self.service.name(),
                    processor = %self.base.name(),
                    frame = frame.name(),
                    error = %e,
                    "TTSProcessor: synthesis failed, dropping audio"
                );
            }
        }
        ctx.push(frame).await
    }
}

// ---------------------------------------------------------------------------
// ImageGenProcessor
// ---------------------------------------------------------------------------

/// What [`ImageGenProcessor`] does when generation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageGenFailurePolicy {
    /// Return the error, aborting the pipeline run.
    #[default]
    Propagate,
    /// Log the error and emit nothing for the prompt.
    Absorb,
}

/// Generates one image for every `Text` frame, using the text as prompt.
pub struct ImageGenProcessor {
    base: ProcessorBase,
    service: Arc<dyn ImageGenService>,
    failure_policy: ImageGenFailurePolicy,
}

impl ImageGenProcessor {
    pub fn new(service: Arc<dyn ImageGenService>) -> Self {
        Self {
            base: ProcessorBase::new("ImageGenProcessor", None),
            service,
            failure_policy: ImageGenFailurePolicy::default(),
        }
    }

    pub fn with_failure_policy(mut self, policy: ImageGenFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}

impl fmt::Debug for ImageGenProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageGenProcessor")
            .field("name", &self.base.name())
            .field("service", &self.service.name())
            .field("failure_policy", &self.failure_policy)
            .finish()
    }
}

impl_base_display!(ImageGenProcessor);

#[async_trait]
impl Processor for ImageGenProcessor {
    fn name(&self) -> &str {
        self.base.name()
    }
    fn id(&self) -> u64 {
        self.base.id()
    }
    fn weight(&self) -> ProcessorWeight {
        ProcessorWeight::Heavy
    }

    async fn process(&mut self, frame: Frame, ctx: &ProcessorContext) -> Result<(), PipelineError> {
        let prompt = match frame {
            Frame::Text(prompt) => prompt,
            other => return ctx.push(other).await,
        };

        match self.service.run_image_gen(&prompt.content).await {
            Ok(image) => ctx.push(image).await,
            Err(e) => match self.failure_policy {
                ImageGenFailurePolicy::Propagate => Err(e),
                ImageGenFailurePolicy::Absorb => {
                    tracing::warn!(
                        service = %self.service.name(),
                        processor = %self.base.name(),
                        frame = "Text",
                        error = %e,
                        "ImageGenProcessor: generation failed, dropping prompt"
                    );
                    Ok(())
                }
            },
        }
    }
}
