//! How calendar operations are retried

use std::future::Future;
use std::time::Duration;

use crate::error::WriteError;

/// Retry policy for operations against the calendar.
///
/// Only [transient](WriteError::is_transient) failures are retried, up to `max_attempts` attempts in total.
/// The delay before attempt `n + 1` is `initial_backoff * multiplier^(n - 1)`, capped to `max_backoff`.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: u32,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            multiplier: 2,
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn no_retry() -> Self {
        Self { max_attempts: 1, ..Self::default() }
    }

    /// A policy that retries without waiting
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            multiplier: 1,
            max_backoff: Duration::ZERO,
        }
    }

    /// The delay to wait after the failed attempt number `attempt` (starting at 1)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.multiplier.checked_pow(exponent).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Whether a failure on attempt number `attempt` should be followed by another attempt
    pub fn should_retry(&self, error: &WriteError, attempt: u32) -> bool {
        error.is_transient() && attempt < self.max_attempts
    }

    /// Run `operation` until it succeeds, fails permanently, or runs out of attempts.
    ///
    /// `description` is only used for logging.
    pub async fn run<T, F, Fut>(&self, description: &str, mut operation: F) -> Result<T, WriteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, WriteError>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if self.should_retry(&err, attempt) == false {
                        return Err(err);
                    }
                    let delay = self.backoff_for(attempt);
                    log::warn!("{} failed (attempt {}/{}): {}. Retrying in {:?}", description, attempt, self.max_attempts, err, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_backoff_curve() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_for(1), Duration::from_millis(500));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(2000));
        assert_eq!(policy.backoff_for(4), Duration::from_millis(4000));
        assert_eq!(policy.backoff_for(5), Duration::from_secs(5));
        assert_eq!(policy.backoff_for(40), Duration::from_secs(5));
    }

    #[test]
    fn test_classifier() {
        let policy = RetryPolicy::default();
        let transient = WriteError::Transient("503".to_string());
        assert!(policy.should_retry(&transient, 1));
        assert!(policy.should_retry(&transient, 2));
        assert!(policy.should_retry(&transient, 3) == false);
        assert!(policy.should_retry(&WriteError::Permanent("400".to_string()), 1) == false);
        assert!(policy.should_retry(&WriteError::AuthFailure("401".to_string()), 1) == false);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let calls = Cell::new(0);
        let result = RetryPolicy::immediate(3).run("test", || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n < 3 { Err(WriteError::Transient("timeout".to_string())) } else { Ok(n) }
            }
        }).await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let calls = Cell::new(0);
        let result: Result<(), _> = RetryPolicy::immediate(2).run("test", || {
            calls.set(calls.get() + 1);
            async { Err(WriteError::Transient("timeout".to_string())) }
        }).await;
        assert!(result.is_err());
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<(), _> = RetryPolicy::immediate(5).run("test", || {
            calls.set(calls.get() + 1);
            async { Err(WriteError::Permanent("409".to_string())) }
        }).await;
        assert_eq!(result, Err(WriteError::Permanent("409".to_string())));
        assert_eq!(calls.get(), 1);
    }
}
