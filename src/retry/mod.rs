//! Retry policy: exponential backoff with jitter over network-class errors.
//!
//! Grounded in the pack's `retry::RetryExecutor` (strategy enum + generic
//! `execute<T, E, F, Fut>` closure runner), generalized from a
//! fixed `backoff_ms`/`backoff_factor` policy to the network-error-class
//! detection and `min(1000*2^(n-1), 10000)` ±20% jitter formula below.

use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const NETWORK_ERROR_TOKENS: &[&str] = &[
    "econnreset",
    "etimedout",
    "enotfound",
    "econnrefused",
    "networkerror",
    "timeouterror",
    "requesterror",
    "network",
    "timeout",
    "connection",
    "refused",
    "reset",
];

/// True if `message` looks like a network-class error eligible for retry,
/// per the kind/message-substring table below.
pub fn is_retryable_message(message: &str) -> bool {
    let lowered = message.to_lowercase();
    NETWORK_ERROR_TOKENS.iter().any(|tok| lowered.contains(tok))
}

/// `min(1000 * 2^(attempt-1), 10000)` ms, jittered by up to ±20%.
pub fn backoff_duration(attempt: u32) -> Duration {
    let base = 1000u64.saturating_mul(1u64 << attempt.saturating_sub(1).min(16));
    let capped = base.min(10_000);
    let jitter_frac = rand::thread_rng().gen_range(-0.2..=0.2);
    let jittered = (capped as f64) * (1.0 + jitter_frac);
    Duration::from_millis(jittered.max(0.0) as u64)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Runs `operation`, retrying up to `policy.max_attempts` times while the
/// error is network-class (per `classify`) and backing off exponentially
/// between attempts. Non-retryable errors return immediately.
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub async fn execute<T, E, F, Fut>(&self, step_id: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        info!(step_id = %step_id, attempt, "retry succeeded");
                    }
                    return Ok(result);
                }
                Err(e) => {
                    let retryable = is_retryable_message(&e.to_string());
                    if !retryable || attempt >= self.policy.max_attempts {
                        warn!(
                            step_id = %step_id,
                            attempt,
                            retryable,
                            error = %e,
                            "step failed, not retrying further"
                        );
                        return Err(e);
                    }

                    let backoff = backoff_duration(attempt);
                    warn!(
                        step_id = %step_id,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "step failed, retrying after backoff"
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        let b1 = backoff_duration(1).as_millis();
        let b4 = backoff_duration(4).as_millis();
        let b10 = backoff_duration(10).as_millis();
        assert!(b1 <= 1200 && b1 >= 800);
        assert!(b4 <= 9600 && b4 >= 6400);
        assert!(b10 <= 12_000);
    }

    #[test]
    fn classifies_network_error_tokens() {
        assert!(is_retryable_message("ECONNRESET"));
        assert!(is_retryable_message("connection refused"));
        assert!(!is_retryable_message("assertion failed: status mismatch"));
    }

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let executor = RetryExecutor::new(RetryPolicy { max_attempts: 3 });
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<i32, String> = executor
            .execute("step", || {
                let attempts = attempts_clone.clone();
                async move {
                    let current = attempts.fetch_add(1, Ordering::SeqCst);
                    if current < 2 {
                        Err("connection reset".to_string())
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_returns_immediately() {
        let executor = RetryExecutor::new(RetryPolicy { max_attempts: 3 });
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<i32, String> = executor
            .execute("step", || {
                let attempts = attempts_clone.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err("assertion failed".to_string())
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_all_attempts_on_persistent_network_error() {
        let executor = RetryExecutor::new(RetryPolicy { max_attempts: 3 });
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<i32, String> = executor
            .execute("step", || {
                let attempts = attempts_clone.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err("ETIMEDOUT".to_string())
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
