// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Service-driving processors inside pipelines, with in-memory services.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, StreamExt};

use dailyai::error::PipelineError;
use dailyai::frames::{
    AudioFrame, Frame, ImageFrame, ImageMetadata, LLMMessage, LLMMessagesFrame,
    LLMResponseEndFrame, LLMResponseStartFrame,
};
use dailyai::pipeline::{FrameReceiver, ParallelPipeline, Pipeline};
use dailyai::processors::aggregators::{LLMResponseAggregator, MessageHistory, SentenceAggregator};
use dailyai::services::{
    poll_until, ImageGenFailurePolicy, ImageGenProcessor, ImageGenService, LLMFrameStream,
    LLMProcessor, LLMService, PollPolicy, PollStatus, TTSProcessor, TTSService,
};

async fn collect(rx: &mut FrameReceiver) -> Vec<Frame> {
    let mut frames = Vec::new();
    while let Some(frame) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("pipeline output stalled")
    {
        frames.push(frame);
    }
    frames
}

/// Streams a fixed script, optionally failing after it.
struct ScriptedLLM {
    fragments: Vec<&'static str>,
    fail_after: bool,
}

#[async_trait]
impl LLMService for ScriptedLLM {
    fn name(&self) -> &str {
        "scripted-llm"
    }

    async fn run_llm(&self, _messages: &[LLMMessage]) -> Result<LLMFrameStream, PipelineError> {
        let mut items: Vec<Result<Frame, PipelineError>> =
            self.fragments.iter().map(|f| Ok(Frame::text(*f))).collect();
        if self.fail_after {
            items.push(Err(PipelineError::service("scripted-llm", "stream reset")));
        }
        Ok(stream::iter(items).boxed())
    }
}

/// Returns the UTF-8 bytes of the text as "audio"; refuses `"mute."`.
struct BytesTTS;

#[async_trait]
impl TTSService for BytesTTS {
    fn name(&self) -> &str {
        "bytes-tts"
    }

    async fn run_tts(&self, text: &str) -> Result<Vec<u8>, PipelineError> {
        if text == "mute." {
            return Err(PipelineError::service("bytes-tts", "voice unavailable"));
        }
        Ok(text.as_bytes().to_vec())
    }
}

/// Submit-then-poll image generator that succeeds after `ready_after` polls.
struct PollingImageGen {
    policy: PollPolicy,
    ready_after: Option<u32>,
    polls: AtomicU32,
}

#[async_trait]
impl ImageGenService for PollingImageGen {
    fn name(&self) -> &str {
        "polling-image-gen"
    }

    async fn run_image_gen(&self, prompt: &str) -> Result<ImageFrame, PipelineError> {
        let url = poll_until(&self.policy, "polling-image-gen", || {
            let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            let ready = self.ready_after.is_some_and(|r| n >= r);
            let url = format!("https://images.invalid/{}", prompt.len());
            async move {
                Ok(if ready {
                    PollStatus::Succeeded(url)
                } else {
                    PollStatus::Pending
                })
            }
        })
        .await?;
        Ok(ImageFrame::new(vec![0u8; 16]).with_metadata(ImageMetadata {
            url: Some(url),
            size: (2, 2),
        }))
    }
}

#[tokio::test]
async fn test_llm_to_tts_pipeline() {
    let history = MessageHistory::new();
    let llm = Arc::new(ScriptedLLM {
        fragments: vec!["Hi", " there.", " Bye", "."],
        fail_after: false,
    });
    let mut pipeline = Pipeline::new(vec![
        Box::new(LLMProcessor::new(llm)),
        Box::new(SentenceAggregator::new()),
        Box::new(TTSProcessor::new(Arc::new(BytesTTS))),
        Box::new(LLMResponseAggregator::new(&history)),
    ]);
    let mut output = pipeline.take_output().unwrap();

    pipeline
        .queue_frames(vec![
            LLMMessagesFrame::new(vec![LLMMessage::user("greet me")]).into(),
            Frame::end(),
        ])
        .await
        .unwrap();
    pipeline.run_pipeline().await.unwrap();

    let frames = collect(&mut output).await;
    let expected_history = vec![LLMMessage::assistant("Hi there. Bye.")];
    assert_eq!(
        frames,
        vec![
            LLMResponseStartFrame::new().into(),
            AudioFrame::new(b"Hi there.".to_vec()).into(),
            Frame::text("Hi there."),
            AudioFrame::new(b" Bye.".to_vec()).into(),
            Frame::text(" Bye."),
            LLMResponseEndFrame::new().into(),
            LLMMessagesFrame::new(expected_history.clone()).into(),
            Frame::end(),
        ]
    );
    assert_eq!(history.snapshot().await, expected_history);
}

#[tokio::test]
async fn test_tts_failure_is_logged_and_dropped() {
    let mut pipeline = Pipeline::new(vec![Box::new(TTSProcessor::new(Arc::new(BytesTTS)))]);
    let mut output = pipeline.take_output().unwrap();
    pipeline
        .queue_frames(vec![Frame::text("mute."), Frame::text("loud."), Frame::end()])
        .await
        .unwrap();
    pipeline.run_pipeline().await.unwrap();

    assert_eq!(
        collect(&mut output).await,
        vec![
            Frame::text("mute."),
            AudioFrame::new(b"loud.".to_vec()).into(),
            Frame::text("loud."),
            Frame::end(),
        ]
    );
}

#[tokio::test]
async fn test_llm_stream_failure_aborts() {
    let llm = Arc::new(ScriptedLLM {
        fragments: vec!["partial"],
        fail_after: true,
    });
    let pipeline = Pipeline::new(vec![Box::new(LLMProcessor::new(llm))]);
    pipeline
        .queue_frames(vec![
            LLMMessagesFrame::new(vec![LLMMessage::user("?")]).into(),
            Frame::end(),
        ])
        .await
        .unwrap();
    let err = pipeline.run_pipeline().await.unwrap_err();
    match err {
        PipelineError::PipelineAborted { frame, source, .. } => {
            assert_eq!(frame, "LLMMessagesFrame");
            assert!(matches!(*source, PipelineError::ExternalServiceError { .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_image_gen_timeout_propagates() {
    let service = Arc::new(PollingImageGen {
        policy: PollPolicy {
            interval_ms: 1000,
            max_attempts: 3,
        },
        ready_after: None,
        polls: AtomicU32::new(0),
    });
    let pipeline = Pipeline::new(vec![Box::new(ImageGenProcessor::new(service.clone()))]);
    pipeline
        .queue_frames(vec![Frame::text("a lighthouse"), Frame::end()])
        .await
        .unwrap();
    let err = pipeline.run_pipeline().await.unwrap_err();
    assert!(matches!(
        err.root_cause(),
        PipelineError::ExternalTimeout { attempts: 3, .. }
    ));
    assert_eq!(service.polls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_image_gen_timeout_absorbed() {
    let service = Arc::new(PollingImageGen {
        policy: PollPolicy {
            interval_ms: 1000,
            max_attempts: 2,
        },
        ready_after: None,
        polls: AtomicU32::new(0),
    });
    let mut pipeline = Pipeline::new(vec![Box::new(
        ImageGenProcessor::new(service).with_failure_policy(ImageGenFailurePolicy::Absorb),
    )]);
    let mut output = pipeline.take_output().unwrap();
    pipeline
        .queue_frames(vec![Frame::text("a lighthouse"), Frame::end()])
        .await
        .unwrap();
    pipeline.run_pipeline().await.unwrap();
    assert_eq!(collect(&mut output).await, vec![Frame::end()]);
}

#[tokio::test(start_paused = true)]
async fn test_image_and_speech_in_parallel() {
    let image_gen = Arc::new(PollingImageGen {
        policy: PollPolicy {
            interval_ms: 500,
            max_attempts: 10,
        },
        ready_after: Some(2),
        polls: AtomicU32::new(0),
    });
    let mut parallel = ParallelPipeline::new(vec![
        vec![Box::new(ImageGenProcessor::new(image_gen))],
        vec![Box::new(TTSProcessor::new(Arc::new(BytesTTS)))],
    ]);
    let mut output = parallel.take_output().unwrap();
    parallel
        .queue_frames(vec![Frame::text("Once upon a time."), Frame::end()])
        .await
        .unwrap();
    parallel.run_pipeline().await.unwrap();

    let frames = collect(&mut output).await;
    // speech finishes first; the image arrives after two polls
    assert_eq!(frames.len(), 4);
    assert!(matches!(frames[0], Frame::Audio(_)));
    assert_eq!(frames[1], Frame::text("Once upon a time."));
    match &frames[2] {
        Frame::Image(image) => {
            let url = image.metadata.as_ref().and_then(|m| m.url.as_deref());
            assert_eq!(url, Some("https://images.invalid/17"));
        }
        other => panic!("expected an image, got {other}"),
    }
    assert_eq!(frames[3], Frame::end());
}
