// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Bounded polling for slow external jobs.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Interval and attempt bound for [`poll_until`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicy {
    /// Delay before each poll, in milliseconds.
    pub interval_ms: u64,
    /// Maximum number of polls before giving up.
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            max_attempts: 120,
        }
    }
}

impl PollPolicy {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Status reported by one poll of an external job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus<T> {
    Pending,
    Succeeded(T),
    /// Terminal failure with the service's reason.
    Failed(String),
}

/// Poll an external job until it reaches a terminal status.
///
/// Waits one interval before each poll. Fails with
/// [`PipelineError::ExternalTimeout`] after `max_attempts` pending polls and
/// with [`PipelineError::ExternalServiceError`] on a terminal failure.
/// Errors returned by `poll` itself are propagated unchanged.
pub async fn poll_until<T, F, Fut>(
    policy: &PollPolicy,
    operation: &str,
    mut poll: F,
) -> Result<T, PipelineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollStatus<T>, PipelineError>>,
{
    let interval = policy.interval();
    for attempt in 1..=policy.max_attempts {
        tokio::time::sleep(interval).await;
        match poll().await? {
            PollStatus::Pending => {
                tracing::trace!(operation, attempt, "poll_until: pending");
            }
            PollStatus::Succeeded(value) => {
                tracing::debug!(operation, attempt, "poll_until: succeeded");
                return Ok(value);
            }
            PollStatus::Failed(message) => {
                return Err(PipelineError::service(operation, message));
            }
        }
    }
    Err(PipelineError::ExternalTimeout {
        operation: operation.to_string(),
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_policy_defaults_and_partial_json() {
        assert_eq!(
            PollPolicy::default(),
            PollPolicy {
                interval_ms: 1000,
                max_attempts: 120
            }
        );
        let policy: PollPolicy = serde_json::from_str(r#"{"max_attempts": 3}"#).unwrap();
        assert_eq!(policy.interval_ms, 1000);
        assert_eq!(policy.max_attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_pending() {
        let polls = AtomicU32::new(0);
        let policy = PollPolicy {
            interval_ms: 10,
            max_attempts: 5,
        };
        let result = poll_until(&policy, "job", || {
            let n = polls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                Ok(if n < 3 {
                    PollStatus::Pending
                } else {
                    PollStatus::Succeeded(n)
                })
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_at_bound() {
        let polls = AtomicU32::new(0);
        let policy = PollPolicy {
            interval_ms: 1000,
            max_attempts: 4,
        };
        let start = tokio::time::Instant::now();
        let result: Result<(), _> = poll_until(&policy, "image-gen", || {
            polls.fetch_add(1, Ordering::SeqCst);
            async { Ok(PollStatus::Pending) }
        })
        .await;
        assert!(matches!(
            result,
            Err(PipelineError::ExternalTimeout { attempts: 4, .. })
        ));
        assert_eq!(polls.load(Ordering::SeqCst), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_failure_is_not_timeout() {
        let policy = PollPolicy::default();
        let result: Result<(), _> =
            poll_until(&policy, "image-gen", || async { Ok(PollStatus::Failed("bad prompt".into())) })
                .await;
        match result {
            Err(PipelineError::ExternalServiceError { service, message }) => {
                assert_eq!(service, "image-gen");
                assert_eq!(message, "bad prompt");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
