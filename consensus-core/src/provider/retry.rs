//! Retry policy (§4.3): exponential backoff with jitter, honoring
//! provider-supplied retry hints.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::ConsensusError;

/// Parameters for the retry wrapper.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_secs: f64,
    pub max_delay_secs: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_secs: 1.0,
            max_delay_secs: 60.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `n` (0-indexed), before any provider-hint override.
    ///
    /// `min(base * 2^n, max) * U(0.5, 1.5)` when jitter is enabled, else `1.0`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let raw = (self.base_delay_secs * 2f64.powi(attempt as i32)).min(self.max_delay_secs);
        let factor = if self.jitter {
            rand::thread_rng().gen_range(0.5..1.5)
        } else {
            1.0
        };
        Duration::from_secs_f64((raw * factor).max(0.0))
    }

    /// Run `op` under this retry policy. `op` is re-invoked via the closure
    /// factory on every attempt since the underlying future is not `Clone`.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, ConsensusError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ConsensusError>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let mut delay = self.delay_for_attempt(attempt);
                    if let Some(hint_secs) = err.retry_hint_secs() {
                        let hint = Duration::from_secs_f64(hint_secs.max(0.0));
                        if hint > delay {
                            delay = hint;
                        }
                    }
                    warn!(attempt, ?delay, error = %err, "retrying after provider failure");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_grows_and_is_capped() {
        let policy = RetryPolicy {
            jitter: false,
            ..Default::default()
        };
        assert_eq!(policy.delay_for_attempt(0).as_secs_f64(), 1.0);
        assert_eq!(policy.delay_for_attempt(1).as_secs_f64(), 2.0);
        assert_eq!(policy.delay_for_attempt(2).as_secs_f64(), 4.0);
        assert_eq!(policy.delay_for_attempt(10).as_secs_f64(), 60.0);
    }

    #[tokio::test]
    async fn retries_retryable_errors_until_success() {
        let policy = RetryPolicy {
            base_delay_secs: 0.001,
            max_delay_secs: 0.002,
            ..Default::default()
        };
        let calls = AtomicU32::new(0);
        let result = policy
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ConsensusError::ProviderTimeout {
                            provider: "p".into(),
                            elapsed_secs: 1.0,
                        })
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let result: Result<(), ConsensusError> = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(ConsensusError::ModelNotFound("x:y".into()))
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_retries_then_surfaces_error() {
        let policy = RetryPolicy {
            max_retries: 2,
            base_delay_secs: 0.001,
            max_delay_secs: 0.001,
            jitter: false,
        };
        let calls = AtomicU32::new(0);
        let result: Result<(), ConsensusError> = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(ConsensusError::ProviderOverloaded {
                        provider: "p".into(),
                        message: "down".into(),
                    })
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3); // initial + 2 retries
    }
}
