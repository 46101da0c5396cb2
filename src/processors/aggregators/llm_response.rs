// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Conversational turn aggregators.
//!
//! A *turn* is the sequence of fragments between a start-of-turn and an
//! end-of-turn delimiter:
//!
//! | Source | Start | Fragment | End |
//! |---|---|---|---|
//! | [`UserTurn`] | `UserStartedSpeaking` | final `Transcription` | `UserStoppedSpeaking` |
//! | [`AssistantTurn`] | `LLMResponseStart` | `Text` | `LLMResponseEnd` |
//!
//! When a turn ends, the concatenated fragments are appended to a shared
//! [`MessageHistory`] with the source's role.
//!
//! - [`ResponseAggregator`] (`UserResponseAggregator`,
//!   `LLMResponseAggregator`) then emits one `LLMMessages` frame with the
//!   updated history, ready to trigger the LLM stage.
//! - [`ContextAggregator`] (`LLMUserContextAggregator`,
//!   `LLMAssistantContextAggregator`) only records the turn and forwards
//!   every frame unchanged.

use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;

use async_trait::async_trait;

use super::history::{HistoryWriter, MessageHistory};
use crate::error::PipelineError;
use crate::frames::{Frame, LLMMessage, LLMMessagesFrame, Role};
use crate::processors::processor::{Processor, ProcessorContext};
use crate::processors::ProcessorBase;

// ---------------------------------------------------------------------------
// Turn sources
// ---------------------------------------------------------------------------

/// How a frame participates in a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    Start,
    End,
    Fragment(String),
    Other,
}

/// Which frames delimit and make up a turn, and who is speaking.
pub trait TurnSource: Send + Sync + 'static {
    /// Role recorded in the history.
    const ROLE: Role;
    /// Whether a response aggregator forwards the fragments it accumulates.
    const FORWARD_FRAGMENTS: bool;
    const RESPONSE_AGGREGATOR: &'static str;
    const CONTEXT_AGGREGATOR: &'static str;

    fn classify(frame: &Frame) -> TurnEvent;
}

/// Turns spoken by the user, delimited by VAD events.
#[derive(Debug)]
pub struct UserTurn;

impl TurnSource for UserTurn {
    const ROLE: Role = Role::User;
    const FORWARD_FRAGMENTS: bool = false;
    const RESPONSE_AGGREGATOR: &'static str = "UserResponseAggregator";
    const CONTEXT_AGGREGATOR: &'static str = "LLMUserContextAggregator";

    fn classify(frame: &Frame) -> TurnEvent {
        match frame {
            Frame::UserStartedSpeaking(_) => TurnEvent::Start,
            Frame::UserStoppedSpeaking(_) => TurnEvent::End,
            Frame::Transcription(t) if t.is_final => TurnEvent::Fragment(t.text.clone()),
            Frame::Transcription(_)
            | Frame::Start(_)
            | Frame::End(_)
            | Frame::EndOfBranch(_)
            | Frame::LLMResponseStart(_)
            | Frame::LLMFunctionStart(_)
            | Frame::LLMResponseEnd(_)
            | Frame::Text(_)
            | Frame::Audio(_)
            | Frame::Image(_)
            | Frame::Sprite(_)
            | Frame::LLMMessages(_)
            | Frame::LLMFunctionCall(_)
            | Frame::ParticipantJoined(_) => TurnEvent::Other,
        }
    }
}

/// Turns produced by the LLM, delimited by response markers.
#[derive(Debug)]
pub struct AssistantTurn;

impl TurnSource for AssistantTurn {
    const ROLE: Role = Role::Assistant;
    const FORWARD_FRAGMENTS: bool = true;
    const RESPONSE_AGGREGATOR: &'static str = "LLMResponseAggregator";
    const CONTEXT_AGGREGATOR: &'static str = "LLMAssistantContextAggregator";

    fn classify(frame: &Frame) -> TurnEvent {
        match frame {
            Frame::LLMResponseStart(_) => TurnEvent::Start,
            Frame::LLMResponseEnd(_) => TurnEvent::End,
            Frame::Text(t) => TurnEvent::Fragment(t.content.clone()),
            Frame::Start(_)
            | Frame::End(_)
            | Frame::EndOfBranch(_)
            | Frame::LLMFunctionStart(_)
            | Frame::Audio(_)
            | Frame::Image(_)
            | Frame::Sprite(_)
            | Frame::LLMMessages(_)
            | Frame::LLMFunctionCall(_)
            | Frame::Transcription(_)
            | Frame::UserStartedSpeaking(_)
            | Frame::UserStoppedSpeaking(_)
            | Frame::ParticipantJoined(_) => TurnEvent::Other,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared turn state
// ---------------------------------------------------------------------------

/// Accumulation state shared by both aggregator flavors.
struct Turn<T: TurnSource> {
    writer: HistoryWriter,
    aggregating: bool,
    aggregation: String,
    ignored_participants: HashSet<String>,
    joined: Option<u64>,
    _source: PhantomData<T>,
}

impl<T: TurnSource> Turn<T> {
    fn new(history: &MessageHistory) -> Self {
        Self {
            writer: history.writer(),
            aggregating: false,
            aggregation: String::new(),
            ignored_participants: HashSet::new(),
            joined: None,
            _source: PhantomData,
        }
    }

    fn classify(&self, frame: &Frame) -> TurnEvent {
        if let Frame::Transcription(t) = frame {
            if let Some(participant) = &t.participant_id {
                if self.ignored_participants.contains(participant) {
                    return TurnEvent::Other;
                }
            }
        }
        T::classify(frame)
    }

    /// Record a fragment. Returns `false` if no turn is open.
    fn accumulate(&mut self, fragment: &str) -> bool {
        if self.aggregating {
            self.aggregation.push_str(fragment);
        }
        self.aggregating
    }

    /// Hold the history's write claim for the run `generation`.
    fn join(&mut self, generation: u64) -> Result<(), PipelineError> {
        if self.joined == Some(generation) {
            return Ok(());
        }
        self.leave();
        self.writer.join(generation)?;
        self.joined = Some(generation);
        Ok(())
    }

    fn leave(&mut self) {
        if let Some(generation) = self.joined.take() {
            self.writer.leave(generation);
        }
    }

    /// Close the turn, appending it to the history if it has content.
    async fn finish(&mut self, ctx: &ProcessorContext) -> Result<Option<Vec<LLMMessage>>, PipelineError> {
        self.aggregating = false;
        if self.aggregation.is_empty() {
            return Ok(None);
        }
        let content = std::mem::take(&mut self.aggregation);
        let generation = ctx.generation_id();
        self.join(generation)?;
        let history = self
            .writer
            .append(generation, LLMMessage::new(T::ROLE, content))
            .await?;
        Ok(Some(history))
    }
}

// ---------------------------------------------------------------------------
// ResponseAggregator
// ---------------------------------------------------------------------------

/// Folds a turn into the history and emits the updated history as an
/// `LLMMessages` frame after the end-of-turn delimiter.
pub struct ResponseAggregator<T: TurnSource> {
    base: ProcessorBase,
    turn: Turn<T>,
}

/// Aggregates user transcriptions into `user` messages.
pub type UserResponseAggregator = ResponseAggregator<UserTurn>;
/// Aggregates LLM text into `assistant` messages.
pub type LLMResponseAggregator = ResponseAggregator<AssistantTurn>;

impl<T: TurnSource> ResponseAggregator<T> {
    pub fn new(history: &MessageHistory) -> Self {
        Self {
            base: ProcessorBase::new(T::RESPONSE_AGGREGATOR, None),
            turn: Turn::new(history),
        }
    }

    /// Ignore transcriptions attributed to `participant_id` (e.g. the bot).
    pub fn ignoring_participant(mut self, participant_id: impl Into<String>) -> Self {
        self.turn.ignored_participants.insert(participant_id.into());
        self
    }

    /// Text accumulated for the open turn.
    pub fn aggregation(&self) -> &str {
        &self.turn.aggregation
    }
}

impl<T: TurnSource> fmt::Debug for ResponseAggregator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(T::RESPONSE_AGGREGATOR)
            .field("name", &self.base.name())
            .field("aggregating", &self.turn.aggregating)
            .field("aggregation_len", &self.turn.aggregation.len())
            .finish()
    }
}

impl<T: TurnSource> fmt::Display for ResponseAggregator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base.name())
    }
}

#[async_trait]
impl<T: TurnSource> Processor for ResponseAggregator<T> {
    fn name(&self) -> &str {
        self.base.name()
    }
    fn id(&self) -> u64 {
        self.base.id()
    }

    async fn process(&mut self, frame: Frame, ctx: &ProcessorContext) -> Result<(), PipelineError> {
        match self.turn.classify(&frame) {
            TurnEvent::Start => {
                self.turn.aggregating = true;
                ctx.push(frame).await
            }
            TurnEvent::End => {
                ctx.push(frame).await?;
                if let Some(history) = self.turn.finish(ctx).await? {
                    ctx.push(LLMMessagesFrame::new(history)).await?;
                }
                Ok(())
            }
            TurnEvent::Fragment(text) => {
                if !self.turn.accumulate(&text) || T::FORWARD_FRAGMENTS {
                    ctx.push(frame).await?;
                }
                Ok(())
            }
            TurnEvent::Other => ctx.push(frame).await,
        }
    }

    async fn setup(&mut self, ctx: &ProcessorContext) -> Result<(), PipelineError> {
        self.turn.join(ctx.generation_id())
    }

    async fn cleanup(&mut self) {
        self.turn.leave();
    }
}

// ---------------------------------------------------------------------------
// ContextAggregator
// ---------------------------------------------------------------------------

/// Records completed turns in the history without emitting anything; every
/// frame is forwarded unchanged.
pub struct ContextAggregator<T: TurnSource> {
    base: ProcessorBase,
    turn: Turn<T>,
}

/// Records user turns without retriggering the LLM.
pub type LLMUserContextAggregator = ContextAggregator<UserTurn>;
/// Records assistant turns without retriggering the LLM.
pub type LLMAssistantContextAggregator = ContextAggregator<AssistantTurn>;

impl<T: TurnSource> ContextAggregator<T> {
    pub fn new(history: &MessageHistory) -> Self {
        Self {
            base: ProcessorBase::new(T::CONTEXT_AGGREGATOR, None),
            turn: Turn::new(history),
        }
    }

    /// Ignore transcriptions attributed to `participant_id` (e.g. the bot).
    pub fn ignoring_participant(mut self, participant_id: impl Into<String>) -> Self {
        self.turn.ignored_participants.insert(participant_id.into());
        self
    }

    pub fn aggregation(&self) -> &str {
        &self.turn.aggregation
    }
}

impl<T: TurnSource> fmt::Debug for ContextAggregator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(T::CONTEXT_AGGREGATOR)
            .field("name", &self.base.name())
            .field("aggregating", &self.turn.aggregating)
            .finish()
    }
}

impl<T: TurnSource> fmt::Display for ContextAggregator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base.name())
    }
}

#[async_trait]
impl<T: TurnSource> Processor for ContextAggregator<T> {
    fn name(&self) -> &str {
        self.base.name()
    }
    fn id(&self) -> u64 {
        self.base.id()
    }

    async fn process(&mut self, frame: Frame, ctx: &ProcessorContext) -> Result<(), PipelineError> {
        match self.turn.classify(&frame) {
            TurnEvent::Start => self.turn.aggregating = true,
            TurnEvent::End => {
                if let Some(history) = self.turn.finish(ctx).await? {
                    tracing::trace!(
                        processor = %self.base.name(),
                        messages = history.len(),
                        "ContextAggregator: turn recorded"
                    );
                }
            }
            TurnEvent::Fragment(text) => {
                self.turn.accumulate(&text);
            }
            TurnEvent::Other => {}
        }
        ctx.push(frame).await
    }

    async fn setup(&mut self, ctx: &ProcessorContext) -> Result<(), PipelineError> {
        self.turn.join(ctx.generation_id())
    }

    async fn cleanup(&mut self) {
        self.turn.leave();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::{
        LLMResponseEndFrame, LLMResponseStartFrame, TranscriptionFrame, UserStartedSpeakingFrame,
        UserStoppedSpeakingFrame,
    };
    use crate::pipeline::channel::frame_channel;

    fn user_turn(fragments: &[&str]) -> Vec<Frame> {
        let mut frames = vec![Frame::from(UserStartedSpeakingFrame::new())];
        frames.extend(
            fragments
                .iter()
                .map(|f| Frame::from(TranscriptionFrame::new(*f))),
        );
        frames.push(UserStoppedSpeakingFrame::new().into());
        frames
    }

    #[tokio::test]
    async fn test_user_response_aggregator_appends_and_emits() {
        let history = MessageHistory::new();
        let (tx, mut rx) = frame_channel(None);
        let ctx = ProcessorContext::new(tx).with_generation_id(3);
        let mut agg = UserResponseAggregator::new(&history);

        for frame in user_turn(&["A", "B", "C"]) {
            agg.process(frame, &ctx).await.unwrap();
        }

        let expected_history = vec![LLMMessage::user("ABC")];
        assert_eq!(history.snapshot().await, expected_history);
        assert_eq!(
            rx.drain_ready(),
            vec![
                Frame::from(UserStartedSpeakingFrame::new()),
                Frame::from(UserStoppedSpeakingFrame::new()),
                Frame::from(LLMMessagesFrame::new(expected_history)),
            ]
        );
    }

    #[tokio::test]
    async fn test_llm_response_aggregator_forwards_text() {
        let history = MessageHistory::with_messages(vec![LLMMessage::user("hi")]);
        let (tx, mut rx) = frame_channel(None);
        let ctx = ProcessorContext::new(tx).with_generation_id(4);
        let mut agg = LLMResponseAggregator::new(&history);

        agg.process(LLMResponseStartFrame::new().into(), &ctx).await.unwrap();
        agg.process(Frame::text("Hel"), &ctx).await.unwrap();
        agg.process(Frame::text("lo."), &ctx).await.unwrap();
        agg.process(LLMResponseEndFrame::new().into(), &ctx).await.unwrap();

        let frames = rx.drain_ready();
        assert_eq!(frames.len(), 5);
        assert_eq!(frames[1], Frame::text("Hel"));
        assert_eq!(frames[2], Frame::text("lo."));
        assert_eq!(
            frames[4],
            Frame::from(LLMMessagesFrame::new(vec![
                LLMMessage::user("hi"),
                LLMMessage::assistant("Hello."),
            ]))
        );
    }

    #[tokio::test]
    async fn test_fragments_outside_turn_pass_through() {
        let history = MessageHistory::new();
        let (tx, mut rx) = frame_channel(None);
        let ctx = ProcessorContext::new(tx);
        let mut agg = UserResponseAggregator::new(&history);

        agg.process(TranscriptionFrame::new("stray").into(), &ctx)
            .await
            .unwrap();
        agg.process(UserStoppedSpeakingFrame::new().into(), &ctx)
            .await
            .unwrap();
        assert!(history.is_empty().await);
        assert_eq!(
            rx.drain_ready(),
            vec![
                Frame::from(TranscriptionFrame::new("stray")),
                Frame::from(UserStoppedSpeakingFrame::new()),
            ]
        );
    }

    #[tokio::test]
    async fn test_interim_and_ignored_transcriptions() {
        let history = MessageHistory::new();
        let (tx, _rx) = frame_channel(None);
        let ctx = ProcessorContext::new(tx);
        let mut agg = UserResponseAggregator::new(&history).ignoring_participant("bot");

        agg.process(UserStartedSpeakingFrame::new().into(), &ctx).await.unwrap();
        agg.process(TranscriptionFrame::interim("he").into(), &ctx).await.unwrap();
        agg.process(
            TranscriptionFrame::new("I am the bot").from_participant("bot").into(),
            &ctx,
        )
        .await
        .unwrap();
        agg.process(
            TranscriptionFrame::new("hello").from_participant("alice").into(),
            &ctx,
        )
        .await
        .unwrap();
        assert_eq!(agg.aggregation(), "hello");
    }

    #[tokio::test]
    async fn test_context_aggregator_records_without_emitting() {
        let history = MessageHistory::new();
        let (tx, mut rx) = frame_channel(None);
        let ctx = ProcessorContext::new(tx).with_generation_id(9);
        let mut agg = LLMUserContextAggregator::new(&history);

        let turn = user_turn(&["x", "y"]);
        for frame in turn.clone() {
            agg.process(frame, &ctx).await.unwrap();
        }
        assert_eq!(history.snapshot().await, vec![LLMMessage::user("xy")]);
        assert_eq!(rx.drain_ready(), turn);
    }

    #[tokio::test]
    async fn test_setup_joins_and_cleanup_leaves() {
        let history = MessageHistory::new();
        let (tx, _rx) = frame_channel(None);
        let ours = ProcessorContext::new(tx.clone()).with_generation_id(30);
        let theirs = ProcessorContext::new(tx).with_generation_id(31);
        let mut user = UserResponseAggregator::new(&history);
        let mut assistant = LLMAssistantContextAggregator::new(&history);
        let mut other_run = LLMUserContextAggregator::new(&history);

        user.setup(&ours).await.unwrap();
        assistant.setup(&ours).await.unwrap();
        assert!(matches!(
            other_run.setup(&theirs).await,
            Err(PipelineError::HistoryInUse)
        ));

        user.cleanup().await;
        assert!(history.is_claimed());
        other_run.cleanup().await;
        assert!(history.is_claimed());
        assistant.cleanup().await;
        assert!(!history.is_claimed());
    }

    #[tokio::test]
    async fn test_cleanup_releases_history() {
        let history = MessageHistory::new();
        let (tx, _rx) = frame_channel(None);
        let ctx = ProcessorContext::new(tx).with_generation_id(21);
        let mut agg = LLMAssistantContextAggregator::new(&history);

        agg.process(LLMResponseStartFrame::new().into(), &ctx).await.unwrap();
        agg.process(Frame::text("ok"), &ctx).await.unwrap();
        agg.process(LLMResponseEndFrame::new().into(), &ctx).await.unwrap();
        assert!(history.is_claimed());
        agg.cleanup().await;
        assert!(!history.is_claimed());
    }
}
