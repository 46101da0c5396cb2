// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! The closed set of frame variants.
//!
//! Processors dispatch on [`Frame`] with exhaustive `match` expressions, so
//! adding a variant is a compile error everywhere a processor has not decided
//! what to do with it.

use std::fmt;

use super::*;

/// Every message that flows through a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    // ===================== CONTROL FRAMES =====================
    /// Initial frame of a run.
    Start(StartFrame),
    /// Ends a top-level pipeline run.
    End(EndFrame),
    /// Ends only the pipeline instance it was injected into.
    EndOfBranch(EndOfBranchFrame),
    /// Start-of-response delimiter emitted by the LLM stage.
    LLMResponseStart(LLMResponseStartFrame),
    /// A tool call started streaming.
    LLMFunctionStart(LLMFunctionStartFrame),
    /// End-of-response delimiter emitted by the LLM stage.
    LLMResponseEnd(LLMResponseEndFrame),

    // ===================== DATA FRAMES =====================
    Text(TextFrame),
    Audio(AudioFrame),
    Image(ImageFrame),
    Sprite(SpriteFrame),
    LLMMessages(LLMMessagesFrame),
    LLMFunctionCall(LLMFunctionCallFrame),
    Transcription(TranscriptionFrame),

    // ===================== SYSTEM FRAMES =====================
    UserStartedSpeaking(UserStartedSpeakingFrame),
    UserStoppedSpeaking(UserStoppedSpeakingFrame),
    ParticipantJoined(ParticipantJoinedFrame),
}

impl Frame {
    /// Convenience constructor for a [`TextFrame`].
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(TextFrame::new(content))
    }

    /// Convenience constructor for an [`EndFrame`].
    pub fn end() -> Self {
        Self::End(EndFrame::new())
    }

    /// Convenience constructor for an [`EndOfBranchFrame`].
    pub fn end_of_branch() -> Self {
        Self::EndOfBranch(EndOfBranchFrame::new())
    }

    /// Human-readable name derived from the enum variant.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start(_) => "StartFrame",
            Self::End(_) => "EndFrame",
            Self::EndOfBranch(_) => "EndOfBranchFrame",
            Self::LLMResponseStart(_) => "LLMResponseStartFrame",
            Self::LLMFunctionStart(_) => "LLMFunctionStartFrame",
            Self::LLMResponseEnd(_) => "LLMResponseEndFrame",
            Self::Text(_) => "TextFrame",
            Self::Audio(_) => "AudioFrame",
            Self::Image(_) => "ImageFrame",
            Self::Sprite(_) => "SpriteFrame",
            Self::LLMMessages(_) => "LLMMessagesFrame",
            Self::LLMFunctionCall(_) => "LLMFunctionCallFrame",
            Self::Transcription(_) => "TranscriptionFrame",
            Self::UserStartedSpeaking(_) => "UserStartedSpeakingFrame",
            Self::UserStoppedSpeaking(_) => "UserStoppedSpeakingFrame",
            Self::ParticipantJoined(_) => "ParticipantJoinedFrame",
        }
    }

    /// Returns the frame kind (System, Data, or Control).
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::Start(_)
            | Self::End(_)
            | Self::EndOfBranch(_)
            | Self::LLMResponseStart(_)
            | Self::LLMFunctionStart(_)
            | Self::LLMResponseEnd(_) => FrameKind::Control,

            Self::Text(_)
            | Self::Audio(_)
            | Self::Image(_)
            | Self::Sprite(_)
            | Self::LLMMessages(_)
            | Self::LLMFunctionCall(_)
            | Self::Transcription(_) => FrameKind::Data,

            Self::UserStartedSpeaking(_)
            | Self::UserStoppedSpeaking(_)
            | Self::ParticipantJoined(_) => FrameKind::System,
        }
    }

    /// Returns true for frames that end the pipeline they flow through.
    pub fn is_terminator(&self) -> bool {
        matches!(self, Self::End(_) | Self::EndOfBranch(_))
    }

    /// Returns true if this is a system frame.
    pub fn is_system_frame(&self) -> bool {
        self.kind() == FrameKind::System
    }

    /// Returns true if this is a data frame.
    pub fn is_data_frame(&self) -> bool {
        self.kind() == FrameKind::Data
    }

    /// Returns true if this is a control frame.
    pub fn is_control_frame(&self) -> bool {
        self.kind() == FrameKind::Control
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start(inner) => fmt::Display::fmt(inner, f),
            Self::End(inner) => fmt::Display::fmt(inner, f),
            Self::EndOfBranch(inner) => fmt::Display::fmt(inner, f),
            Self::LLMResponseStart(inner) => fmt::Display::fmt(inner, f),
            Self::LLMFunctionStart(inner) => fmt::Display::fmt(inner, f),
            Self::LLMResponseEnd(inner) => fmt::Display::fmt(inner, f),
            Self::Text(inner) => fmt::Display::fmt(inner, f),
            Self::Audio(inner) => fmt::Display::fmt(inner, f),
            Self::Image(inner) => fmt::Display::fmt(inner, f),
            Self::Sprite(inner) => fmt::Display::fmt(inner, f),
            Self::LLMMessages(inner) => fmt::Display::fmt(inner, f),
            Self::LLMFunctionCall(inner) => fmt::Display::fmt(inner, f),
            Self::Transcription(inner) => fmt::Display::fmt(inner, f),
            Self::UserStartedSpeaking(inner) => fmt::Display::fmt(inner, f),
            Self::UserStoppedSpeaking(inner) => fmt::Display::fmt(inner, f),
            Self::ParticipantJoined(inner) => fmt::Display::fmt(inner, f),
        }
    }
}

// ---------------------------------------------------------------------------
// From<T> implementations for ergonomic construction
// ---------------------------------------------------------------------------

macro_rules! impl_from_frame {
    ($variant:ident, $frame_type:ident) => {
        impl From<$frame_type> for Frame {
            fn from(f: $frame_type) -> Self {
                Self::$variant(f)
            }
        }
    };
}

impl_from_frame!(Start, StartFrame);
impl_from_frame!(End, EndFrame);
impl_from_frame!(EndOfBranch, EndOfBranchFrame);
impl_from_frame!(LLMResponseStart, LLMResponseStartFrame);
impl_from_frame!(LLMFunctionStart, LLMFunctionStartFrame);
impl_from_frame!(LLMResponseEnd, LLMResponseEndFrame);
impl_from_frame!(Text, TextFrame);
impl_from_frame!(Audio, AudioFrame);
impl_from_frame!(Image, ImageFrame);
impl_from_frame!(Sprite, SpriteFrame);
impl_from_frame!(LLMMessages, LLMMessagesFrame);
impl_from_frame!(LLMFunctionCall, LLMFunctionCallFrame);
impl_from_frame!(Transcription, TranscriptionFrame);
impl_from_frame!(UserStartedSpeaking, UserStartedSpeakingFrame);
impl_from_frame!(UserStoppedSpeaking, UserStoppedSpeakingFrame);
impl_from_frame!(ParticipantJoined, ParticipantJoinedFrame);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_is_structural() {
        assert_eq!(Frame::text("hello"), Frame::text("hello"));
        assert_ne!(Frame::text("hello"), Frame::text("world"));
        assert_eq!(Frame::end(), Frame::from(EndFrame::new()));
    }

    #[test]
    fn test_terminators() {
        assert!(Frame::end().is_terminator());
        assert!(Frame::end_of_branch().is_terminator());
        assert!(!Frame::from(StartFrame::new()).is_terminator());
        assert!(!Frame::from(LLMResponseEndFrame::new()).is_terminator());
    }

    #[test]
    fn test_kinds() {
        assert!(Frame::end().is_control_frame());
        assert!(Frame::text("x").is_data_frame());
        assert!(Frame::from(UserStoppedSpeakingFrame::new()).is_system_frame());
        assert_eq!(
            Frame::from(LLMFunctionCallFrame::new("f", "{}")).kind(),
            FrameKind::Data
        );
    }

    #[test]
    fn test_name_and_display() {
        let frame = Frame::from(TranscriptionFrame::new("hi"));
        assert_eq!(frame.name(), "TranscriptionFrame");
        assert_eq!(
            frame.to_string(),
            "TranscriptionFrame(text: \"hi\", final: true, participant: -)"
        );
        assert_eq!(Frame::end_of_branch().to_string(), "EndOfBranchFrame");
    }
}
