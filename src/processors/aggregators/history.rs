// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Shared conversation history for context aggregators.
//!
//! [`MessageHistory`] is the single owner of a conversation's messages. It is
//! deliberately not `Clone`: aggregators receive a crate-private writer
//! handle through their constructors, and callers only get read access.
//!
//! Writes are append-only and guarded by a write claim keyed by the
//! pipeline run's generation id. Every aggregator of a run joins the claim
//! during stage setup, before any frame flows, and leaves it in cleanup. The
//! claim is freed only when its last holder leaves, so a run keeps the
//! history until all of its writers have stopped. Joining or writing from a
//! different run while the claim is held fails with
//! [`PipelineError::HistoryInUse`]; pipelines that run one after another can
//! share a history.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::Mutex;

use crate::error::PipelineError;
use crate::frames::LLMMessage;

/// The run currently allowed to write, and how many of its writers are live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Claim {
    generation: u64,
    holders: usize,
}

#[derive(Debug)]
struct SharedHistory {
    messages: Mutex<Vec<LLMMessage>>,
    claim: StdMutex<Option<Claim>>,
}

impl SharedHistory {
    fn claim(&self) -> std::sync::MutexGuard<'_, Option<Claim>> {
        self.claim.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Append-only conversation history shared by context aggregators.
///
/// ```
/// use dailyai::frames::LLMMessage;
/// use dailyai::processors::aggregators::MessageHistory;
///
/// let history = MessageHistory::with_messages(vec![LLMMessage::system("Be brief.")]);
/// ```
#[derive(Debug)]
pub struct MessageHistory {
    shared: Arc<SharedHistory>,
}

impl MessageHistory {
    pub fn new() -> Self {
        Self::with_messages(Vec::new())
    }

    /// Seed the history, typically with a system prompt.
    pub fn with_messages(messages: Vec<LLMMessage>) -> Self {
        Self {
            shared: Arc::new(SharedHistory {
                messages: Mutex::new(messages),
                claim: StdMutex::new(None),
            }),
        }
    }

    /// A copy of the current messages.
    pub async fn snapshot(&self) -> Vec<LLMMessage> {
        self.shared.messages.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.shared.messages.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.shared.messages.lock().await.is_empty()
    }

    /// The messages as a JSON array of `{role, content}` objects.
    pub async fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        let messages = self.shared.messages.lock().await;
        serde_json::to_value(&*messages)
    }

    /// Returns `true` while a pipeline run holds the write claim.
    pub fn is_claimed(&self) -> bool {
        self.shared.claim().is_some()
    }

    pub(crate) fn writer(&self) -> HistoryWriter {
        HistoryWriter {
            shared: self.shared.clone(),
        }
    }
}

impl Default for MessageHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// Write access to a [`MessageHistory`], held by aggregators.
#[derive(Debug)]
pub(crate) struct HistoryWriter {
    shared: Arc<SharedHistory>,
}

impl HistoryWriter {
    /// Register one writer of the run `generation_id`.
    ///
    /// Fails with [`PipelineError::HistoryInUse`] while another run holds
    /// the claim.
    pub(crate) fn join(&self, generation_id: u64) -> Result<(), PipelineError> {
        let mut claim = self.shared.claim();
        match claim.as_mut() {
            None => {
                *claim = Some(Claim {
                    generation: generation_id,
                    holders: 1,
                });
                Ok(())
            }
            Some(held) if held.generation == generation_id => {
                held.holders += 1;
                Ok(())
            }
            Some(_) => Err(PipelineError::HistoryInUse),
        }
    }

    /// Unregister one writer of `generation_id`; the last one frees the claim.
    pub(crate) fn leave(&self, generation_id: u64) {
        let mut claim = self.shared.claim();
        if let Some(held) = claim.as_mut() {
            if held.generation == generation_id {
                held.holders = held.holders.saturating_sub(1);
                if held.holders == 0 {
                    *claim = None;
                }
            }
        }
    }

    /// Append one message on behalf of the run `generation_id` and return the
    /// updated history. The run must hold the claim.
    pub(crate) async fn append(
        &self,
        generation_id: u64,
        message: LLMMessage,
    ) -> Result<Vec<LLMMessage>, PipelineError> {
        let holds_claim = matches!(
            *self.shared.claim(),
            Some(Claim { generation, .. }) if generation == generation_id
        );
        if !holds_claim {
            return Err(PipelineError::HistoryInUse);
        }
        let mut messages = self.shared.messages.lock().await;
        messages.push(message);
        Ok(messages.clone())
    }
}
