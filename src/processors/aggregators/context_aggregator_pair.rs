// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Factory for creating paired user/assistant context aggregators.
//!
//! # Usage
//!
//! ```
//! use dailyai::frames::LLMMessage;
//! use dailyai::processors::aggregators::{LLMContextAggregatorPair, MessageHistory};
//!
//! let history = MessageHistory::with_messages(vec![LLMMessage::system("You are terse.")]);
//! let pair = LLMContextAggregatorPair::new(&history);
//! let (user, assistant) = pair.into_parts();
//! // `user` goes after transcription, `assistant` after the LLM.
//! # drop((user, assistant));
//! ```

use super::history::MessageHistory;
use super::llm_response::{LLMAssistantContextAggregator, LLMUserContextAggregator};

/// A user and an assistant context aggregator writing to the same
/// [`MessageHistory`].
#[derive(Debug)]
pub struct LLMContextAggregatorPair {
    /// Records user turns.
    pub user_aggregator: LLMUserContextAggregator,
    /// Records assistant turns.
    pub assistant_aggregator: LLMAssistantContextAggregator,
}

impl LLMContextAggregatorPair {
    pub fn new(history: &MessageHistory) -> Self {
        Self {
            user_aggregator: LLMUserContextAggregator::new(history),
            assistant_aggregator: LLMAssistantContextAggregator::new(history),
        }
    }

    /// Split into `(user, assistant)` for placement in a pipeline.
    pub fn into_parts(self) -> (LLMUserContextAggregator, LLMAssistantContextAggregator) {
        (self.user_aggregator, self.assistant_aggregator)
    }
}
