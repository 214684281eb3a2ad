//! Per-provider self-rate-limiting (§4.B): "minimum inter-request interval
//! per-provider ... subsequent calls block until the floor is satisfied."
//! Also reused by `research-email` for the delivery worker's 2-jobs/1200ms
//! limit (§4.I), parameterized differently.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Gates calls so no two complete less than `floor` apart, as observed by
/// callers of [`acquire`](Self::acquire). A single `Mutex<Instant>` is
/// enough: contention is never more than a handful of concurrent callers
/// per provider.
#[derive(Debug)]
pub struct RateLimiter {
    floor: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(floor: Duration) -> Self {
        Self {
            floor,
            last: Mutex::new(None),
        }
    }

    /// Blocks until at least `floor` has elapsed since the previous
    /// acquisition, then records this acquisition's time.
    pub async fn acquire(&self) {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.floor {
                tokio::time::sleep(self.floor - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn second_acquire_waits_for_floor() {
        let limiter = RateLimiter::new(Duration::from_millis(100));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn first_acquire_does_not_wait() {
        let limiter = RateLimiter::new(Duration::from_secs(5));
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
