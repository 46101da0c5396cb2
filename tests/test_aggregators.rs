// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Aggregators running inside pipelines: conversational turns, the shared
//! message history and the gated aggregator.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use dailyai::error::PipelineError;
use dailyai::frames::{
    Frame, LLMMessage, LLMMessagesFrame, LLMResponseEndFrame, LLMResponseStartFrame,
    TranscriptionFrame, UserStartedSpeakingFrame, UserStoppedSpeakingFrame,
};
use dailyai::impl_base_debug_display;
use dailyai::pipeline::{FrameReceiver, Pipeline, PipelineState};
use dailyai::processors::aggregators::{
    GatedAggregator, LLMAssistantContextAggregator, LLMContextAggregatorPair,
    LLMResponseAggregator, LLMUserContextAggregator, MessageHistory, SentenceAggregator,
    UserResponseAggregator,
};
use dailyai::processors::processor::{Processor, ProcessorContext};
use dailyai::processors::ProcessorBase;

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

fn user_says(text: &str) -> Vec<Frame> {
    vec![
        UserStartedSpeakingFrame::new().into(),
        TranscriptionFrame::interim("…").into(),
        TranscriptionFrame::new(text).into(),
        UserStoppedSpeakingFrame::new().into(),
    ]
}

fn assistant_says(fragments: &[&str]) -> Vec<Frame> {
    let mut frames = vec![Frame::from(LLMResponseStartFrame::new())];
    frames.extend(fragments.iter().map(|f| Frame::text(*f)));
    frames.push(LLMResponseEndFrame::new().into());
    frames
}

/// Forwards every frame after a fixed delay.
struct Slow {
    base: ProcessorBase,
    delay: Duration,
}

impl Slow {
    fn new(delay_ms: u64) -> Self {
        Self {
            base: ProcessorBase::new("Slow", None),
            delay: Duration::from_millis(delay_ms),
        }
    }
}

impl_base_debug_display!(Slow);

#[async_trait]
impl Processor for Slow {
    fn name(&self) -> &str {
        self.base.name()
    }
    fn id(&self) -> u64 {
        self.base.id()
    }

    async fn process(&mut self, frame: Frame, ctx: &ProcessorContext) -> Result<(), PipelineError> {
        tokio::time::sleep(self.delay).await;
        ctx.push(frame).await
    }
}

#[tokio::test]
async fn test_user_turn_triggers_llm_messages() {
    let history = MessageHistory::with_messages(vec![LLMMessage::system("Be brief.")]);
    let mut pipeline = Pipeline::new(vec![Box::new(UserResponseAggregator::new(&history))]);
    let mut output = pipeline.take_output().unwrap();

    let mut frames = user_says("What is Rust?");
    frames.push(Frame::end());
    pipeline.queue_frames(frames).await.unwrap();
    pipeline.run_pipeline().await.unwrap();

    let expected = vec![
        LLMMessage::system("Be brief."),
        LLMMessage::user("What is Rust?"),
    ];
    assert_eq!(history.snapshot().await, expected);
    assert_eq!(
        collect(&mut output).await,
        vec![
            Frame::from(UserStartedSpeakingFrame::new()),
            Frame::from(TranscriptionFrame::interim("…")),
            Frame::from(UserStoppedSpeakingFrame::new()),
            Frame::from(LLMMessagesFrame::new(expected)),
            Frame::end(),
        ]
    );
    assert!(!history.is_claimed());
}

#[tokio::test]
async fn test_assistant_turn_is_spoken_and_recorded() {
    let history = MessageHistory::new();
    let mut pipeline = Pipeline::new(vec![
        Box::new(LLMResponseAggregator::new(&history)),
        Box::new(SentenceAggregator::new()),
    ]);
    let mut output = pipeline.take_output().unwrap();

    let mut frames = assistant_says(&["Rust is", " a language", ". It is fast."]);
    frames.push(Frame::end());
    pipeline.queue_frames(frames).await.unwrap();
    pipeline.run_pipeline().await.unwrap();

    assert_eq!(
        history.snapshot().await,
        vec![LLMMessage::assistant("Rust is a language. It is fast.")]
    );
    let texts: Vec<Frame> = collect(&mut output)
        .await
        .into_iter()
        .filter(|f| matches!(f, Frame::Text(_)))
        .collect();
    assert_eq!(texts, vec![Frame::text("Rust is a language. It is fast.")]);
}

#[tokio::test]
async fn test_context_pair_records_conversation() {
    let history = MessageHistory::new();
    let pair = LLMContextAggregatorPair::new(&history);
    let mut pipeline = Pipeline::new(vec![
        Box::new(pair.user_aggregator),
        Box::new(pair.assistant_aggregator),
    ]);
    let mut output = pipeline.take_output().unwrap();

    let mut frames = user_says("Hi");
    frames.extend(assistant_says(&["Hello", "!"]));
    frames.extend(user_says("Bye"));
    frames.push(Frame::end());
    pipeline.queue_frames(frames.clone()).await.unwrap();
    pipeline.run_pipeline().await.unwrap();

    assert_eq!(
        history.snapshot().await,
        vec![
            LLMMessage::user("Hi"),
            LLMMessage::assistant("Hello!"),
            LLMMessage::user("Bye"),
        ]
    );
    assert_eq!(collect(&mut output).await, frames);
}

#[tokio::test]
async fn test_concurrent_runs_cannot_share_history() {
    let history = MessageHistory::new();

    let mut first = Pipeline::new(vec![Box::new(LLMUserContextAggregator::new(&history))]);
    let mut first_output = first.take_output().unwrap();
    let first_input = first.input();
    let first = Arc::new(first);
    let first_run = tokio::spawn({
        let first = first.clone();
        async move { first.run_pipeline().await }
    });

    for frame in user_says("first") {
        first_input.put(frame).await.unwrap();
    }
    // The turn is recorded before its end delimiter is forwarded.
    loop {
        let frame = first_output.recv().await.unwrap();
        if matches!(frame, Frame::UserStoppedSpeaking(_)) {
            break;
        }
    }
    assert!(history.is_claimed());

    let second = Pipeline::new(vec![Box::new(LLMUserContextAggregator::new(&history))]);
    let mut frames = user_says("second");
    frames.push(Frame::end());
    second.queue_frames(frames).await.unwrap();
    let err = second.run_pipeline().await.unwrap_err();
    assert!(matches!(err.root_cause(), PipelineError::HistoryInUse));

    first_input.put(Frame::end()).await.unwrap();
    first_run.await.unwrap().unwrap();
    assert_eq!(first.state(), PipelineState::Terminated);
    assert!(!history.is_claimed());

    // Sequential reuse is allowed once the first run released the history.
    let third = Pipeline::new(vec![Box::new(LLMUserContextAggregator::new(&history))]);
    let mut frames = user_says("third");
    frames.push(Frame::end());
    third.queue_frames(frames).await.unwrap();
    third.run_pipeline().await.unwrap();
    assert_eq!(
        history.snapshot().await,
        vec![LLMMessage::user("first"), LLMMessage::user("third")]
    );
}

#[tokio::test(start_paused = true)]
async fn test_history_stays_with_run_until_last_writer_stops() {
    let history = MessageHistory::new();
    let mut first = Pipeline::new(vec![
        Box::new(UserResponseAggregator::new(&history)),
        Box::new(Slow::new(40)),
        Box::new(LLMAssistantContextAggregator::new(&history)),
    ]);
    let mut first_output = first.take_output().unwrap();
    let mut frames = user_says("u1");
    frames.extend(assistant_says(&["a1"]));
    frames.push(Frame::end());
    first.queue_frames(frames).await.unwrap();
    let first_run = tokio::spawn(async move { first.run_pipeline().await });

    // The user aggregator has passed the terminator and stopped by now;
    // the assistant aggregator is still waiting behind the slow stage.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(history.is_claimed());

    let second = Pipeline::new(vec![Box::new(LLMUserContextAggregator::new(&history))]);
    let mut frames = user_says("intruder");
    frames.push(Frame::end());
    second.queue_frames(frames).await.unwrap();
    let err = second.run_pipeline().await.unwrap_err();
    assert!(matches!(err.root_cause(), PipelineError::HistoryInUse));

    first_run.await.unwrap().unwrap();
    assert!(collect(&mut first_output).await.contains(&Frame::end()));
    assert_eq!(
        history.snapshot().await,
        vec![LLMMessage::user("u1"), LLMMessage::assistant("a1")]
    );
    assert!(!history.is_claimed());
}

#[tokio::test]
async fn test_gated_aggregator_in_pipeline() {
    let gate = GatedAggregator::new(
        |f| matches!(f, Frame::LLMResponseStart(_)),
        |f| matches!(f, Frame::LLMResponseEnd(_)),
        false,
    );
    let mut pipeline = Pipeline::new(vec![Box::new(gate)]);
    let mut output = pipeline.take_output().unwrap();
    pipeline
        .queue_frames(vec![
            Frame::text("early"),
            LLMResponseStartFrame::new().into(),
            Frame::text("during"),
            LLMResponseEndFrame::new().into(),
            Frame::text("late"),
            Frame::end(),
        ])
        .await
        .unwrap();
    pipeline.run_pipeline().await.unwrap();

    assert_eq!(
        collect(&mut output).await,
        vec![
            LLMResponseStartFrame::new().into(),
            Frame::text("early"),
            Frame::text("during"),
            LLMResponseEndFrame::new().into(),
            Frame::text("late"),
            Frame::end(),
        ]
    );
}
