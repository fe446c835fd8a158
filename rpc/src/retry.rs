//! Bounded retry of transient store failures.
//!
//! Engine calls are synchronous, so each attempt runs on the blocking pool.
//! Only [`StakingError::TransientStoreFailure`] is retried; every other
//! outcome is returned as is.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use can_staking::StakingError;

use crate::RpcError;

/// Exponential backoff settings (`[retry]` in the node config).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    50
}

fn default_max_backoff_ms() -> u64 {
    1_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Delay before retry number `retry` (1-based): the initial backoff,
    /// doubled each time, capped at the maximum.
    pub fn backoff(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(32);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }

    /// Run `op` on the blocking pool, retrying transient store failures.
    pub async fn run<T, F>(&self, op: F) -> Result<T, RpcError>
    where
        T: Send + 'static,
        F: Fn() -> Result<T, StakingError> + Send + Sync + 'static,
    {
        let op = Arc::new(op);
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let call = Arc::clone(&op);
            let outcome = tokio::task::spawn_blocking(move || call())
                .await
                .map_err(|e| RpcError::Server(format!("blocking task failed: {e}")))?;
            match outcome {
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = self.backoff(attempt);
                    tracing::debug!(attempt, ?delay, error = %e, "retrying transient failure");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other.map_err(RpcError::from),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        }
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff_ms: 100,
            max_backoff_ms: 500,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(4), Duration::from_millis(500));
        assert_eq!(policy.backoff(60), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&calls);
        let result = fast(3)
            .run(move || {
                if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(StakingError::TransientStoreFailure("busy".into()))
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&calls);
        let result: Result<(), _> = fast(3)
            .run(move || {
                seen.fetch_add(1, Ordering::SeqCst);
                Err(StakingError::TransientStoreFailure("busy".into()))
            })
            .await;
        assert!(matches!(
            result,
            Err(RpcError::Staking(StakingError::TransientStoreFailure(_)))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&calls);
        let result: Result<(), _> = fast(5)
            .run(move || {
                seen.fetch_add(1, Ordering::SeqCst);
                Err(StakingError::NotFound("stake 9".into()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
