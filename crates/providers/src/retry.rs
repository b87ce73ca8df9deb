//! Capped exponential backoff for transient transport failures.

use crate::traits::ProviderError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Transport resiliency settings, fixed for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "millis")]
    pub base_delay: Duration,
    #[serde(with = "millis")]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based): `min(max, base * 2^(attempt-1))`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 2_u32.saturating_pow(exponent);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// One recorded attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub error: Option<String>,
    /// Backoff slept after this attempt, if it was retried.
    pub delay: Option<Duration>,
}

pub struct RetryOutcome<T> {
    pub result: Result<T, ProviderError>,
    pub attempts: Vec<AttemptRecord>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TransportRetrier {
    policy: RetryPolicy,
}

impl TransportRetrier {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or attempts run out.
    ///
    /// Cancellation is observed before each attempt and during backoff.
    pub async fn run<T, F, Fut>(&self, cancel: &CancellationToken, mut op: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempts = Vec::new();
        let mut attempt = 0;

        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return RetryOutcome {
                    result: Err(ProviderError::Cancelled),
                    attempts,
                };
            }

            debug!("Transport attempt {}/{}", attempt, max_attempts);
            let err = match op(attempt).await {
                Ok(value) => {
                    attempts.push(AttemptRecord {
                        attempt,
                        error: None,
                        delay: None,
                    });
                    return RetryOutcome {
                        result: Ok(value),
                        attempts,
                    };
                }
                Err(err) => err,
            };

            if !err.is_retryable() || attempt >= max_attempts {
                attempts.push(AttemptRecord {
                    attempt,
                    error: Some(err.to_string()),
                    delay: None,
                });
                return RetryOutcome {
                    result: Err(err),
                    attempts,
                };
            }

            let delay = self.policy.delay_for(attempt);
            warn!(
                "Transport attempt {} failed, retrying in {:?}: {}",
                attempt, delay, err
            );
            attempts.push(AttemptRecord {
                attempt,
                error: Some(err.to_string()),
                delay: Some(delay),
            });

            tokio::select! {
                _ = cancel.cancelled() => {
                    return RetryOutcome {
                        result: Err(ProviderError::Cancelled),
                        attempts,
                    };
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::traits::TransportFailureKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[test]
    fn test_delay_is_capped_exponential() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(800));
        assert_eq!(policy.delay_for(5), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(40), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_two_tls_failures_then_success() {
        let retrier = TransportRetrier::new(fast_policy(3));
        let calls = AtomicU32::new(0);
        let outcome = retrier
            .run(&CancellationToken::new(), |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ProviderError::transport(
                            TransportFailureKind::SecureConnectionFailed,
                            "handshake failed",
                        ))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(outcome.result.unwrap(), "done");
        assert_eq!(outcome.attempts.len(), 3);
        assert!(outcome.attempts[2].error.is_none());
        assert_eq!(outcome.attempts[0].delay, Some(Duration::from_millis(1)));
        assert_eq!(outcome.attempts[1].delay, Some(Duration::from_millis(2)));
    }

    #[tokio::test]
    async fn test_http_error_not_retried() {
        let retrier = TransportRetrier::new(fast_policy(5));
        let outcome: RetryOutcome<()> = retrier
            .run(&CancellationToken::new(), |_| async {
                Err(ProviderError::Http {
                    status: 500,
                    message: "boom".to_string(),
                })
            })
            .await;

        assert!(matches!(outcome.result, Err(ProviderError::Http { status: 500, .. })));
        assert_eq!(outcome.attempts.len(), 1);
    }

    #[tokio::test]
    async fn test_non_matching_transport_error_not_retried() {
        let retrier = TransportRetrier::new(fast_policy(5));
        let outcome: RetryOutcome<()> = retrier
            .run(&CancellationToken::new(), |_| async {
                Err(ProviderError::transport(
                    TransportFailureKind::Other,
                    "connection refused",
                ))
            })
            .await;

        assert_eq!(outcome.attempts.len(), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let retrier = TransportRetrier::new(fast_policy(2));
        let outcome: RetryOutcome<()> = retrier
            .run(&CancellationToken::new(), |attempt| async move {
                Err(ProviderError::transport(
                    TransportFailureKind::TimedOut,
                    format!("attempt {}", attempt),
                ))
            })
            .await;

        match outcome.result {
            Err(ProviderError::Transport { description, .. }) => {
                assert_eq!(description, "attempt 2")
            }
            _ => panic!("Expected transport error"),
        }
        assert_eq!(outcome.attempts.len(), 2);
        assert!(outcome.attempts[1].delay.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let retrier = TransportRetrier::new(fast_policy(3));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome: RetryOutcome<()> = retrier.run(&cancel, |_| async { Ok(()) }).await;

        assert!(matches!(outcome.result, Err(ProviderError::Cancelled)));
        assert!(outcome.attempts.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_backoff() {
        let retrier = TransportRetrier::new(RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(60),
        });
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let outcome: RetryOutcome<()> = retrier
            .run(&cancel, |_| {
                trigger.cancel();
                async {
                    Err(ProviderError::transport(
                        TransportFailureKind::ConnectionLost,
                        "reset",
                    ))
                }
            })
            .await;

        assert!(matches!(outcome.result, Err(ProviderError::Cancelled)));
        assert_eq!(outcome.attempts.len(), 1);
    }

    #[test]
    fn test_policy_json_roundtrip_uses_millis() {
        let json = r#"{"max_attempts":4,"base_delay":250,"max_delay":2000}"#;
        let policy: RetryPolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
        assert_eq!(policy.max_delay, Duration::from_secs(2));
        assert_eq!(serde_json::to_string(&policy).unwrap(), json);
    }
}
