//! Bounded retry around one annotation call.
//!
//! A response that arrived but was unusable is retried after a short wait; a
//! transport failure waits longer. No wait follows the final attempt.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::RetryConfig;

use super::annotation::{AnnotationError, AnnotationOutput};

/// Outcome of running a request under a [`RetryPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempted {
    Done {
        output: AnnotationOutput,
        attempts: u32,
    },
    Failed {
        error: AnnotationError,
        attempts: u32,
    },
}

impl Attempted {
    pub fn attempts(&self) -> u32 {
        match self {
            Attempted::Done { attempts, .. } | Attempted::Failed { attempts, .. } => *attempts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub unusable_delay: Duration,
    pub transient_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, unusable_delay: Duration, transient_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            unusable_delay,
            transient_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.unusable_delay_ms),
            Duration::from_millis(config.transient_delay_ms),
        )
    }

    /// Policy with no waits between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    /// Wait before the next attempt after `error`.
    pub fn delay_for(&self, error: &AnnotationError) -> Duration {
        match error {
            AnnotationError::Unusable(_) => self.unusable_delay,
            _ => self.transient_delay,
        }
    }

    /// Run `request` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `label` identifies the unit of work in log lines.
    pub async fn execute<F, Fut>(&self, label: &str, mut request: F) -> Attempted
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<AnnotationOutput, AnnotationError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match request().await {
                Ok(output) => {
                    return Attempted::Done {
                        output,
                        attempts: attempt,
                    }
                }
                Err(e) => e,
            };

            if !error.is_retryable() || attempt >= self.max_attempts {
                return Attempted::Failed {
                    error,
                    attempts: attempt,
                };
            }

            let wait = self.delay_for(&error);
            warn!(
                "{} failed (attempt {}/{}): {}, retrying in {:?}",
                label, attempt, self.max_attempts, error, wait
            );
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let result = RetryPolicy::immediate(3)
            .execute("row 0", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AnnotationError::Transient("connection refused".to_string()))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            result,
            Attempted::Failed {
                error: AnnotationError::Transient("connection refused".to_string()),
                attempts: 3,
            }
        );
    }

    #[tokio::test]
    async fn test_succeeds_on_second_attempt() {
        let calls = &AtomicU32::new(0);
        let result = RetryPolicy::immediate(3)
            .execute("row 1", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(AnnotationError::Unusable("html".to_string()))
                } else {
                    Ok(AnnotationOutput::Data("text".to_string()))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            result,
            Attempted::Done {
                output: AnnotationOutput::Data("text".to_string()),
                attempts: 2,
            }
        );
    }

    #[tokio::test]
    async fn test_missing_input_is_not_retried() {
        let calls = &AtomicU32::new(0);
        let result = RetryPolicy::immediate(3)
            .execute("row 2", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AnnotationError::MissingInput("no file".to_string()))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_depends_on_failure_kind() {
        let policy = RetryPolicy::new(2, Duration::from_secs(2), Duration::from_secs(5));
        assert_eq!(
            policy.delay_for(&AnnotationError::Unusable(String::new())),
            Duration::from_secs(2)
        );
        assert_eq!(
            policy.delay_for(&AnnotationError::Transient(String::new())),
            Duration::from_secs(5)
        );

        let start = tokio::time::Instant::now();
        policy
            .execute("row 3", || async {
                Err(AnnotationError::Unusable("empty".to_string()))
            })
            .await;
        // One wait between two attempts, none after the last.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(4));
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        assert_eq!(RetryPolicy::immediate(0).max_attempts, 1);
    }
}
