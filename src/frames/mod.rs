// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Frame payload types.
//!
//! Every value that flows through a pipeline is a [`Frame`]. The payload
//! structs here are plain immutable values: they derive `PartialEq` so that
//! equality is structural, and they carry no identity.

pub mod frame_enum;

pub use frame_enum::Frame;

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Frame category enum
// ---------------------------------------------------------------------------

/// Categorizes a frame into one of the primary processing categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameKind {
    /// System frame: events raised by the transport or the user.
    System,
    /// Data frame: content produced and consumed by stages.
    Data,
    /// Control frame: lifecycle signals and response delimiters.
    Control,
}

// ---------------------------------------------------------------------------
// Embedded data structs (not frames themselves)
// ---------------------------------------------------------------------------

/// Speaker role of an [`LLMMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// One entry of a conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LLMMessage {
    pub role: Role,
    pub content: String,
}

impl LLMMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Descriptive metadata attached to a generated image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Where the image was fetched from, if it came from a remote service.
    pub url: Option<String>,
    /// Width and height in pixels.
    pub size: (u32, u32),
}

// ---------------------------------------------------------------------------
// Control frames
// ---------------------------------------------------------------------------

/// Initial frame of a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartFrame;

impl StartFrame {
    pub fn new() -> Self {
        Self
    }
}

/// Terminates a top-level pipeline run once it has reached the sink.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndFrame;

impl EndFrame {
    pub fn new() -> Self {
        Self
    }
}

/// Terminates only the pipeline instance it was injected into.
///
/// Used to close a branch of a parallel pipeline or a nested sub-pipeline
/// without ending the enclosing run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndOfBranchFrame;

impl EndOfBranchFrame {
    pub fn new() -> Self {
        Self
    }
}

// ---------------------------------------------------------------------------
// Content frames
// ---------------------------------------------------------------------------

/// A chunk of text: an LLM token, a sentence, or a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFrame {
    /// The text content.
    pub content: String,
}

impl TextFrame {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

impl From<&str> for TextFrame {
    fn from(content: &str) -> Self {
        TextFrame::new(content)
    }
}

impl From<String> for TextFrame {
    fn from(content: String) -> Self {
        TextFrame::new(content)
    }
}

/// Raw audio samples. The engine never inspects the encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub samples: Vec<u8>,
}

impl AudioFrame {
    pub fn new(samples: impl Into<Vec<u8>>) -> Self {
        Self {
            samples: samples.into(),
        }
    }
}

/// Raw image pixels with optional metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFrame {
    pub metadata: Option<ImageMetadata>,
    pub pixels: Vec<u8>,
}

impl ImageFrame {
    pub fn new(pixels: impl Into<Vec<u8>>) -> Self {
        Self {
            metadata: None,
            pixels: pixels.into(),
        }
    }

    pub fn with_metadata(mut self, metadata: ImageMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// An ordered sequence of images rendered as an animation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpriteFrame {
    pub frames: Vec<ImageFrame>,
}

impl SpriteFrame {
    pub fn new(frames: Vec<ImageFrame>) -> Self {
        Self { frames }
    }
}

// ---------------------------------------------------------------------------
// Conversational frames
// ---------------------------------------------------------------------------

/// A request to the LLM stage carrying the full conversation so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LLMMessagesFrame {
    pub history: Vec<LLMMessage>,
}

impl LLMMessagesFrame {
    pub fn new(history: Vec<LLMMessage>) -> Self {
        Self { history }
    }
}

/// Marks the start of a streamed LLM response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LLMResponseStartFrame;

impl LLMResponseStartFrame {
    pub fn new() -> Self {
        Self
    }
}

/// Marks the end of a streamed LLM response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LLMResponseEndFrame;

impl LLMResponseEndFrame {
    pub fn new() -> Self {
        Self
    }
}

/// The LLM started streaming a tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LLMFunctionStartFrame {
    pub function_name: String,
}

impl LLMFunctionStartFrame {
    pub fn new(function_name: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
        }
    }
}

/// A complete tool call. `arguments` is the raw JSON text from the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LLMFunctionCallFrame {
    pub function_name: String,
    pub arguments: String,
}

impl LLMFunctionCallFrame {
    pub fn new(function_name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            arguments: arguments.into(),
        }
    }

    /// Parse the arguments as JSON.
    pub fn parsed_arguments(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.arguments)
    }
}

/// Speech-to-text output for one participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptionFrame {
    pub text: String,
    /// Interim results have `is_final == false` and may still change.
    pub is_final: bool,
    /// Which participant spoke, when the transport knows it.
    pub participant_id: Option<String>,
}

impl TranscriptionFrame {
    /// A final transcription with no participant attribution.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
            participant_id: None,
        }
    }

    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            is_final: false,
            ..Self::new(text)
        }
    }

    pub fn from_participant(mut self, participant_id: impl Into<String>) -> Self {
        self.participant_id = Some(participant_id.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Transport events
// ---------------------------------------------------------------------------

/// The user started speaking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserStartedSpeakingFrame;

impl UserStartedSpeakingFrame {
    pub fn new() -> Self {
        Self
    }
}

/// The user stopped speaking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserStoppedSpeakingFrame;

impl UserStoppedSpeakingFrame {
    pub fn new() -> Self {
        Self
    }
}

/// A participant joined the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantJoinedFrame {
    pub participant_id: String,
}

impl ParticipantJoinedFrame {
    pub fn new(participant_id: impl Into<String>) -> Self {
        Self {
            participant_id: participant_id.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

macro_rules! impl_unit_display {
    ($($ty:ident => $name:literal),* $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, $name)
                }
            }
        )*
    };
}

impl_unit_display!(
    StartFrame => "StartFrame",
    EndFrame => "EndFrame",
    EndOfBranchFrame => "EndOfBranchFrame",
    LLMResponseStartFrame => "LLMResponseStartFrame",
    LLMResponseEndFrame => "LLMResponseEndFrame",
    UserStartedSpeakingFrame => "UserStartedSpeakingFrame",
    UserStoppedSpeakingFrame => "UserStoppedSpeakingFrame",
);

impl fmt::Display for TextFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextFrame(text: {:?})", self.content)
    }
}

impl fmt::Display for AudioFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AudioFrame(size: {})", self.samples.len())
    }
}

impl fmt::Display for ImageFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.metadata {
            Some(meta) => write!(
                f,
                "ImageFrame(size: {}x{}, bytes: {})",
                meta.size.0,
                meta.size.1,
                self.pixels.len()
            ),
            None => write!(f, "ImageFrame(bytes: {})", self.pixels.len()),
        }
    }
}

impl fmt::Display for SpriteFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpriteFrame(frames: {})", self.frames.len())
    }
}

impl fmt::Display for LLMMessagesFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LLMMessagesFrame(messages: {})", self.history.len())
    }
}

impl fmt::Display for LLMFunctionStartFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LLMFunctionStartFrame(function: {})", self.function_name)
    }
}

impl fmt::Display for LLMFunctionCallFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LLMFunctionCallFrame(function: {}, arguments: {})",
            self.function_name, self.arguments
        )
    }
}

impl fmt::Display for TranscriptionFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TranscriptionFrame(text: {:?}, final: {}, participant: {})",
            self.text,
            self.is_final,
            self.participant_id.as_deref().unwrap_or("-")
        )
    }
}

impl fmt::Display for ParticipantJoinedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParticipantJoinedFrame(participant: {})", self.participant_id)
    }
}
