//! # Retry Policy
//!
//! Bounded exponential backoff with an outer deadline, for hardening calls
//! into external data sources. The deadline covers every attempt and every
//! backoff wait: once it passes the call fails with [`RetryError::Timeout`]
//! whatever retry budget is left.

use crate::config::RetryConfig;
use std::fmt::Display;
use std::future::Future;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors produced by [`RetryPolicy::execute`]
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// Every attempt failed; carries the last failure
    #[error("Operation failed after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: E },

    /// The overall deadline passed
    #[error("Operation timed out after {elapsed_ms}ms (budget {timeout_ms}ms, {attempts} attempt(s))")]
    Timeout {
        attempts: u32,
        elapsed_ms: u64,
        timeout_ms: u64,
    },

    /// The caller cancelled while waiting
    #[error("Operation cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
}

impl<E> RetryError<E> {
    /// Attempts started before the call gave up
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. }
            | Self::Timeout { attempts, .. }
            | Self::Cancelled { attempts } => *attempts,
        }
    }
}

enum Interrupted {
    Cancelled,
    TimedOut,
}

/// Retry wrapper around fallible async operations
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Operation label for logging
    label: String,
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(label: impl Into<String>, config: RetryConfig) -> Self {
        let label = label.into();
        info!(
            operation = %label,
            max_attempts = config.max_attempts,
            initial_delay_ms = config.initial_delay_ms,
            max_delay_ms = config.max_delay_ms,
            operation_timeout_ms = config.operation_timeout_ms,
            "🛡️ Retry policy initialized"
        );
        Self { label, config }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `operation` until it succeeds, the attempts run out, the deadline
    /// passes, or `cancel` fires.
    pub async fn execute<F, Fut, T, E>(
        &self,
        mut operation: F,
        cancel: &CancellationToken,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let started = Instant::now();
        let budget = self.config.operation_timeout();
        let mut attempts = 0u32;

        let outcome = {
            let run = self.run_attempts(&mut operation, &mut attempts);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Interrupted::Cancelled),
                result = tokio::time::timeout(budget, run) => result.map_err(|_| Interrupted::TimedOut),
            }
        };

        match outcome {
            Ok(result) => result,
            Err(Interrupted::Cancelled) => {
                debug!(operation = %self.label, attempts, "Retry loop cancelled");
                Err(RetryError::Cancelled { attempts })
            }
            Err(Interrupted::TimedOut) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                warn!(
                    operation = %self.label,
                    attempts,
                    elapsed_ms,
                    timeout_ms = self.config.operation_timeout_ms,
                    "⏱️ Operation exceeded its timeout budget"
                );
                Err(RetryError::Timeout {
                    attempts,
                    elapsed_ms,
                    timeout_ms: self.config.operation_timeout_ms,
                })
            }
        }
    }

    async fn run_attempts<F, Fut, T, E>(
        &self,
        operation: &mut F,
        attempts: &mut u32,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_attempts = self.config.max_attempts.max(1);

        loop {
            *attempts += 1;
            let attempt = *attempts;
            debug!(operation = %self.label, attempt, "Executing operation");

            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(operation = %self.label, attempt, "🟢 Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) if attempt >= max_attempts => {
                    warn!(
                        operation = %self.label,
                        attempts = attempt,
                        error = %error,
                        "🔴 Retry attempts exhausted"
                    );
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: error,
                    });
                }
                Err(error) => {
                    let delay = self.config.delay_for_attempt(attempt + 1);
                    warn!(
                        operation = %self.label,
                        retry_attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retry attempt {} after {}ms",
                        attempt + 1,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn config(max_attempts: u32, initial_ms: u64, max_ms: u64, timeout_ms: u64) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay_ms: initial_ms,
            max_delay_ms: max_ms,
            operation_timeout_ms: timeout_ms,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt_with_backoff() {
        let policy = RetryPolicy::new("flaky", config(3, 100, 1_000, 5_000));
        let calls = Arc::new(Mutex::new(Vec::new()));
        let started = Instant::now();

        let result = policy
            .execute(
                || {
                    let calls = calls.clone();
                    async move {
                        let mut calls = calls.lock();
                        calls.push(Instant::now());
                        if calls.len() < 3 {
                            Err(format!("attempt {} failed", calls.len()))
                        } else {
                            Ok("loaded")
                        }
                    }
                },
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(result.unwrap(), "loaded");

        let calls = calls.lock();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1] - calls[0], Duration::from_millis(100));
        assert_eq!(calls[2] - calls[1], Duration::from_millis(200));
        assert!(started.elapsed() <= Duration::from_millis(5_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_attempts() {
        let policy = RetryPolicy::new("always_fails", config(3, 10, 100, 5_000));
        let counter = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = policy
            .execute(
                || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err::<(), _>("boom")
                    }
                },
                &CancellationToken::new(),
            )
            .await;

        match result {
            Err(RetryError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last, "boom");
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outer_deadline_caps_retries() {
        // backoff alone (1s + 2s + ...) would outlive the 1.5s budget
        let policy = RetryPolicy::new("slow", config(10, 1_000, 10_000, 1_500));
        let started = Instant::now();

        let result: Result<(), _> = policy
            .execute(|| async { Err::<(), _>("down") }, &CancellationToken::new())
            .await;

        match result {
            Err(RetryError::Timeout {
                attempts,
                timeout_ms,
                ..
            }) => {
                assert_eq!(attempts, 2);
                assert_eq!(timeout_ms, 1_500);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(started.elapsed() <= Duration::from_millis(1_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_covers_a_hanging_attempt() {
        let policy = RetryPolicy::new("hangs", config(3, 10, 100, 200));

        let result: Result<(), RetryError<String>> = policy
            .execute(
                || async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                },
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(result, Err(RetryError::Timeout { attempts: 1, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_backoff() {
        let policy = RetryPolicy::new("cancelled", config(5, 1_000, 10_000, 60_000));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let result: Result<(), _> = policy
            .execute(|| async { Err::<(), _>("down") }, &cancel)
            .await;

        assert!(matches!(result, Err(RetryError::Cancelled { attempts: 1 })));
    }

    #[tokio::test]
    async fn test_first_attempt_success_does_not_wait() {
        let policy = RetryPolicy::new("fast", config(3, 1_000, 1_000, 5_000));
        let started = Instant::now();

        let result = policy
            .execute(|| async { Ok::<_, String>(7) }, &CancellationToken::new())
            .await;

        assert_eq!(result.unwrap(), 7);
        assert!(started.elapsed() < Duration::from_millis(500));
    }
}
