//! Retry policy for resilient provider operations
//!
//! This module implements configurable retry policies with exponential backoff
//! and jitter. A policy is parameterized by the set of [`ErrorKind`]s it treats
//! as transient; every other failure is surfaced on first occurrence.

use crate::providers::error::{ErrorKind, ProviderError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Errors the retry engine can classify
pub trait Retryable {
    /// Classification used to match against the policy's retryable set
    fn kind(&self) -> ErrorKind;

    /// Delay requested by the remote side, if any
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for ProviderError {
    fn kind(&self) -> ErrorKind {
        ProviderError::kind(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        ProviderError::retry_after(self)
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not including the initial attempt)
    pub max_retries: u32,

    /// Initial delay before first retry (milliseconds)
    pub initial_delay_ms: u64,

    /// Maximum delay between retries (milliseconds)
    pub max_delay_ms: u64,

    /// Base for exponential backoff (e.g., 2.0 for doubling)
    pub exponential_base: f64,

    /// Jitter factor (0.0 to 1.0); up to this fraction of the delay is added at random
    pub jitter_factor: f64,

    /// Whether to respect retry-after hints
    pub respect_retry_after: bool,

    /// Error kinds considered transient
    pub retryable: HashSet<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 8,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            exponential_base: 2.0,
            jitter_factor: 0.25,
            respect_retry_after: true,
            retryable: Self::transient_kinds(),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given retry budget and default backoff
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Create a policy with no retries
    pub fn no_retry() -> Self {
        Self::new(0)
    }

    /// Rate limiting, transient server faults and connectivity loss
    pub fn transient_kinds() -> HashSet<ErrorKind> {
        [
            ErrorKind::RateLimit,
            ErrorKind::ServerError,
            ErrorKind::Connection,
            ErrorKind::Timeout,
        ]
        .into_iter()
        .collect()
    }

    /// Replace the retryable set
    pub fn with_retryable(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.retryable = kinds.into_iter().collect();
        self
    }

    /// Set the base delay and cap (milliseconds)
    pub fn with_delays(mut self, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        self.initial_delay_ms = initial_delay_ms;
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Set the jitter factor
    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor;
        self
    }

    /// Whether `error` belongs to the retryable set
    pub fn is_retryable<E: Retryable>(&self, error: &E) -> bool {
        self.retryable.contains(&error.kind())
    }

    /// Calculate the delay before retry number `attempt` (zero-based)
    pub fn calculate_delay<E: Retryable>(&self, attempt: u32, error: &E) -> Duration {
        if self.respect_retry_after {
            if let Some(retry_after) = error.retry_after() {
                return retry_after.min(Duration::from_millis(self.max_delay_ms));
            }
        }

        let base_delay = self.initial_delay_ms as f64 * self.exponential_base.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_delay_ms as f64);

        let delay_with_jitter = if self.jitter_factor > 0.0 {
            let jitter_range = capped_delay * self.jitter_factor;
            capped_delay + rand::thread_rng().gen_range(0.0..=jitter_range)
        } else {
            capped_delay
        };

        Duration::from_millis(delay_with_jitter as u64)
    }

    /// Check if we should retry after `retries_done` retries failed with `error`
    pub fn should_retry<E: Retryable>(&self, error: &E, retries_done: u32) -> bool {
        retries_done < self.max_retries && self.is_retryable(error)
    }
}

/// Why a retried operation ultimately failed
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error; `last` is the final attempt's error
    Exhausted { attempts: u32, last: E },

    /// A non-retryable error stopped the loop
    Fatal { attempts: u32, error: E },

    /// Cancellation was requested before the next attempt
    Cancelled { attempts: u32, last: Option<E> },
}

impl<E> RetryError<E> {
    /// Number of attempts actually issued
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. }
            | Self::Fatal { attempts, .. }
            | Self::Cancelled { attempts, .. } => *attempts,
        }
    }

    /// Error from the last attempt, if one was made
    pub fn into_last_error(self) -> Option<E> {
        match self {
            Self::Exhausted { last, .. } => Some(last),
            Self::Fatal { error, .. } => Some(error),
            Self::Cancelled { last, .. } => last,
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted { attempts, last } => {
                write!(f, "gave up after {} attempts: {}", attempts, last)
            }
            Self::Fatal { attempts, error } => {
                write!(f, "non-retryable error on attempt {}: {}", attempts, error)
            }
            Self::Cancelled { attempts, .. } => write!(f, "cancelled after {} attempts", attempts),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RetryError<E> {}

/// Executor for retry operations
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Create a new retry executor with the given policy
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// The policy this executor applies
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute an operation with retry logic.
    ///
    /// The operation receives the 1-based attempt number.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + fmt::Display,
    {
        self.execute_with_cancel(&CancellationToken::new(), operation)
            .await
    }

    /// Execute an operation with retry logic, aborting backoff waits when `cancel` fires
    pub async fn execute_with_cancel<F, Fut, T, E>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + fmt::Display,
    {
        let mut retries = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled {
                    attempts: retries,
                    last: None,
                });
            }

            let attempts = retries + 1;
            match operation(attempts).await {
                Ok(result) => {
                    if retries > 0 {
                        info!(attempts, "request succeeded after retry");
                    }
                    return Ok(result);
                }
                Err(error) => {
                    if !self.policy.is_retryable(&error) {
                        warn!(attempts, error = %error, "non-retryable error");
                        return Err(RetryError::Fatal { attempts, error });
                    }

                    if !self.policy.should_retry(&error, retries) {
                        error!(attempts, error = %error, "all retry attempts exhausted");
                        return Err(RetryError::Exhausted {
                            attempts,
                            last: error,
                        });
                    }

                    let delay = self.policy.calculate_delay(retries, &error);
                    warn!(
                        attempt = attempts,
                        max_attempts = self.policy.max_retries.saturating_add(1),
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying after failure"
                    );

                    tokio::select! {
                        _ = cancel.cancelled() => {
                            return Err(RetryError::Cancelled {
                                attempts,
                                last: Some(error),
                            });
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    retries += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries).with_delays(1, 5).with_jitter(0.0)
    }

    #[test]
    fn test_retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 8);
        assert_eq!(policy.exponential_base, 2.0);
        assert!(policy.retryable.contains(&ErrorKind::RateLimit));
        assert!(policy.retryable.contains(&ErrorKind::ServerError));
        assert!(policy.retryable.contains(&ErrorKind::Connection));
        assert!(!policy.retryable.contains(&ErrorKind::Authentication));
    }

    #[test]
    fn test_exponential_backoff_calculation() {
        let policy = RetryPolicy {
            respect_retry_after: false,
            ..RetryPolicy::new(5).with_delays(100, 1000).with_jitter(0.0)
        };
        let error = ProviderError::Timeout;

        assert_eq!(policy.calculate_delay(0, &error).as_millis(), 100);
        assert_eq!(policy.calculate_delay(1, &error).as_millis(), 200);
        assert_eq!(policy.calculate_delay(2, &error).as_millis(), 400);
        assert_eq!(policy.calculate_delay(3, &error).as_millis(), 800);
        // Capped
        assert_eq!(policy.calculate_delay(4, &error).as_millis(), 1000);
    }

    #[test]
    fn test_jitter_is_additive() {
        let policy = RetryPolicy::new(3).with_delays(1000, 10_000).with_jitter(0.5);
        let error = ProviderError::Timeout;
        for _ in 0..20 {
            let delay = policy.calculate_delay(0, &error).as_millis();
            assert!((1000..=1500).contains(&delay));
        }
    }

    #[test]
    fn test_retry_after_respected_and_capped() {
        let policy = RetryPolicy::new(3).with_delays(100, 2_000);
        let error = ProviderError::RateLimit {
            retry_after: Some(Duration::from_secs(1)),
        };
        assert_eq!(policy.calculate_delay(0, &error), Duration::from_secs(1));

        let error = ProviderError::RateLimit {
            retry_after: Some(Duration::from_secs(60)),
        };
        assert_eq!(policy.calculate_delay(0, &error), Duration::from_secs(2));
    }

    #[test]
    fn test_should_retry_logic() {
        let policy = RetryPolicy::new(2);
        let timeout = ProviderError::Timeout;
        assert!(policy.should_retry(&timeout, 0));
        assert!(policy.should_retry(&timeout, 1));
        assert!(!policy.should_retry(&timeout, 2));

        assert!(!policy.should_retry(&ProviderError::AuthenticationError, 0));

        let narrow = RetryPolicy::new(2).with_retryable([ErrorKind::RateLimit]);
        assert!(!narrow.should_retry(&timeout, 0));
    }

    #[tokio::test]
    async fn test_attempt_numbers_are_one_based() {
        let executor = RetryExecutor::new(fast_policy(2));
        let mut seen = Vec::new();
        let result: Result<(), _> = executor
            .execute(|attempt| {
                seen.push(attempt);
                async { Err(ProviderError::Timeout) }
            })
            .await;

        assert_eq!(seen, vec![1, 2, 3]);
        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 3, .. })));
    }

    #[tokio::test]
    async fn test_cancel_before_first_attempt() {
        let executor = RetryExecutor::new(fast_policy(2));
        let token = CancellationToken::new();
        token.cancel();

        let mut calls = 0;
        let result: Result<(), RetryError<ProviderError>> = executor
            .execute_with_cancel(&token, |_| {
                calls += 1;
                async { Ok(()) }
            })
            .await;

        assert_eq!(calls, 0);
        assert!(matches!(result, Err(RetryError::Cancelled { attempts: 0, last: None })));
    }

    #[tokio::test]
    async fn test_unbounded_retry_budget_does_not_overflow() {
        let executor = RetryExecutor::new(fast_policy(u32::MAX));
        let mut seen = Vec::new();
        let result = executor
            .execute(|attempt| {
                seen.push(attempt);
                async move {
                    if attempt < 3 {
                        Err(ProviderError::Timeout)
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(seen, vec![1, 2, 3]);
    }
}
