//! Bounded retry driver with a fixed delay between attempts

use super::types::RetryOptions;

use std::fmt::Display;
use std::future::Future;
use thiserror::Error;
use tracing::{debug, warn};

/// Failure of a retried operation
#[derive(Error, Debug)]
pub enum RetryError<E> {
    /// Rejected before the operation ran
    #[error("Invalid retry configuration: {0}")]
    InvalidConfiguration(String),

    /// Every attempt failed; `last` is the error of the final attempt, untouched
    #[error("All {attempts} attempts failed: {last}")]
    Exhausted { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    /// Last operation error, if the operation ran at all
    pub fn into_last(self) -> Option<E> {
        match self {
            RetryError::Exhausted { last, .. } => Some(last),
            RetryError::InvalidConfiguration(_) => None,
        }
    }
}

/// Runs an async operation up to `retries` times, stopping at the first success
#[derive(Debug, Clone, Copy)]
pub struct RetryExecutor {
    options: RetryOptions,
}

impl RetryExecutor {
    pub fn new(options: RetryOptions) -> Self {
        Self { options }
    }

    /// Run `operation` with attempt indices `0..retries`.
    ///
    /// The delay is only slept between two attempts, never after the last one.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let retries = self.options.retries;
        if retries == 0 {
            return Err(RetryError::InvalidConfiguration(
                "retries must be at least 1".to_string(),
            ));
        }

        let delay = self.options.delay();
        let mut attempt = 0;
        loop {
            match operation(attempt).await {
                Ok(value) => {
                    debug!("Attempt {}/{} succeeded", attempt + 1, retries);
                    return Ok(value);
                }
                Err(e) => {
                    warn!("Attempt {}/{} failed: {}", attempt + 1, retries, e);
                    attempt += 1;
                    if attempt >= retries {
                        return Err(RetryError::Exhausted {
                            attempts: retries,
                            last: e,
                        });
                    }
                }
            }

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let executor = RetryExecutor::new(RetryOptions::new(3, 0));

        let result = executor
            .run(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err(format!("attempt {} failed", attempt))
                    } else {
                        Ok(attempt * 10)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 20);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let calls = AtomicU32::new(0);
        let executor = RetryExecutor::new(RetryOptions::new(5, 1_000));

        let result: Result<&str, RetryError<String>> = executor
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok("done") }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_only_between_attempts() {
        let calls = AtomicU32::new(0);
        let executor = RetryExecutor::new(RetryOptions::new(3, 50));
        let started = Instant::now();

        let result: Result<(), RetryError<String>> = executor
            .run(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("failure {}", attempt)) }
            })
            .await;

        // two 50ms sleeps: 0 -> 1 and 1 -> 2
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(150));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        match result {
            Err(RetryError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last, "failure 2");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_retries_is_rejected() {
        let calls = AtomicU32::new(0);
        let executor = RetryExecutor::new(RetryOptions::new(0, 0));

        let result: Result<(), RetryError<String>> = executor
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;

        assert!(matches!(result, Err(RetryError::InvalidConfiguration(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_default_runs_once() {
        let calls = AtomicU32::new(0);

        let result: Result<(), RetryError<&str>> = RetryExecutor::default()
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("boom") }
            })
            .await;

        assert_eq!(result.unwrap_err().into_last(), Some("boom"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
