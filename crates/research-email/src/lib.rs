//! Email delivery capability (§6.5) and the delivery worker's self-rate
//! limiter (§4.I: "rate-limited to 2 jobs per 1200 ms").

pub mod error;
pub mod http;
pub mod http_sender;
pub mod provider;

pub use error::EmailError;
pub use http_sender::{HttpEmailSender, HttpEmailSenderBuilder};
pub use provider::{EmailSender, SendRequest, SendResponse};
/// Reused directly from `research-search`: the same floor-gated design, just
/// parameterized at 600ms (2 acquisitions per 1200ms) instead of a
/// per-provider floor.
pub use research_search::RateLimiter;

use std::time::Duration;

/// §4.I: "2 jobs per 1200 ms" — spread evenly, one every 600ms.
pub const DELIVERY_RATE_LIMIT_FLOOR: Duration = Duration::from_millis(600);

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn delivery_rate_limiter_enforces_two_per_1200ms() {
        let limiter = RateLimiter::new(DELIVERY_RATE_LIMIT_FLOOR);
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(1200));
    }
}
