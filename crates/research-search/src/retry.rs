//! Exponential backoff retry shared by both search providers (§4.B) and,
//! via `research-email`, the email capability: "1s→2s→4s→8s, cap 10s, up
//! to N=3 attempts; abort on client errors (4xx except 429)".

use std::future::Future;
use std::time::Duration;

use research_core::error::Retryable;

pub const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY: Duration = Duration::from_secs(1);
const CAP_DELAY: Duration = Duration::from_secs(10);

/// Runs `operation` up to [`MAX_ATTEMPTS`] times, sleeping
/// `min(2^(attempt-1) * 1s, 10s)` between attempts, and returns as soon as
/// `operation` succeeds or returns a non-retryable error. Generic over any
/// crate-local error implementing [`Retryable`] so `research-email` and
/// `research-llm` share this loop instead of reimplementing it.
pub async fn with_backoff<T, E, F, Fut>(mut operation: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= MAX_ATTEMPTS || !err.is_retryable() => return Err(err),
            Err(err) => {
                let delay = backoff_delay(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts = MAX_ATTEMPTS,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after transient search error"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let multiplier = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    let delay = BASE_DELAY.saturating_mul(multiplier as u32);
    delay.min(CAP_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SearchError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn backoff_delay_follows_1_2_4_8_cap_10() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(3), Duration::from_secs(4));
        assert_eq!(backoff_delay(4), Duration::from_secs(8));
        assert_eq!(backoff_delay(5), Duration::from_secs(10));
        assert_eq!(backoff_delay(10), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_without_retry_on_first_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result = with_backoff(|| {
            let calls = calls2.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, SearchError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_immediately_on_non_retryable_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result = with_backoff(|| {
            let calls = calls2.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(SearchError::Client {
                    status: 404,
                    body: "nope".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_max_attempts_on_persistent_retryable_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result = with_backoff(|| {
            let calls = calls2.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(SearchError::Client {
                    status: 429,
                    body: "slow down".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result = with_backoff(|| {
            let calls = calls2.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 2 {
                    Err(SearchError::Response("timeout".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
    }
}
