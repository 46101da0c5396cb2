// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Stateful processors that buffer frames across calls.
//!
//! - [`SentenceAggregator`]: LLM tokens into whole sentences.
//! - [`ResponseAggregator`] / [`ContextAggregator`]: conversational turns
//!   into a shared [`MessageHistory`].
//! - [`GatedAggregator`]: holds frames until an opening frame arrives.

#![deny(clippy::wildcard_enum_match_arm)]

pub mod context_aggregator_pair;
pub mod gated;
pub mod history;
pub mod llm_response;
pub mod sentence;

pub use context_aggregator_pair::LLMContextAggregatorPair;
pub use gated::GatedAggregator;
pub use history::MessageHistory;
pub use llm_response::{
    AssistantTurn, ContextAggregator, LLMAssistantContextAggregator, LLMResponseAggregator,
    LLMUserContextAggregator, ResponseAggregator, TurnEvent, TurnSource, UserResponseAggregator,
    UserTurn,
};
pub use sentence::SentenceAggregator;
